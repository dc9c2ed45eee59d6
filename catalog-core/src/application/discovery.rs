use catalog_model::{CategoryID, SeriesID, SeriesType};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use crate::error::Result;
use crate::pagination::PageRequest;
use crate::search::{IndexNames, SearchEngine, SearchRequest, page_count};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesFilters {
    #[serde(default)]
    pub category_id: Option<CategoryID>,
    #[serde(default, rename = "type")]
    pub series_type: Option<SeriesType>,
    #[serde(default)]
    pub language: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpisodeFilters {
    #[serde(default)]
    pub series_id: Option<SeriesID>,
}

/// One page of search results, echoing the normalized request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResults {
    pub query: String,
    pub total: u64,
    pub page: u32,
    pub page_size: u32,
    pub page_count: u64,
    pub results: Vec<Value>,
}

/// Index-backed reads over series and episodes.
#[derive(Clone)]
pub struct DiscoveryService {
    engine: Arc<dyn SearchEngine>,
    names: IndexNames,
}

impl fmt::Debug for DiscoveryService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiscoveryService")
            .field("engine", &self.engine)
            .field("names", &self.names)
            .finish()
    }
}

impl DiscoveryService {
    pub fn new(engine: Arc<dyn SearchEngine>, names: IndexNames) -> Self {
        Self { engine, names }
    }

    pub async fn search_series(
        &self,
        query: &str,
        page: Option<u32>,
        page_size: Option<u32>,
        filters: SeriesFilters,
    ) -> Result<SearchResults> {
        let mut request = Self::request(query, page, page_size);
        if let Some(category_id) = filters.category_id {
            request = request.filter("category_id", category_id.to_string());
        }
        if let Some(series_type) = filters.series_type {
            request = request.filter("type", series_type.as_str());
        }
        if let Some(language) = filters.language.filter(|l| !l.is_empty()) {
            request = request.filter("language", language);
        }
        self.run(self.names.series(), request).await
    }

    pub async fn search_episodes(
        &self,
        query: &str,
        page: Option<u32>,
        page_size: Option<u32>,
        filters: EpisodeFilters,
    ) -> Result<SearchResults> {
        let mut request = Self::request(query, page, page_size);
        if let Some(series_id) = filters.series_id {
            request = request.filter("series_id", series_id.to_string());
        }
        self.run(self.names.episodes(), request).await
    }

    fn request(query: &str, page: Option<u32>, page_size: Option<u32>) -> SearchRequest {
        let page = PageRequest::new(page, page_size);
        SearchRequest::new(query.trim(), page.page, page.page_size)
    }

    async fn run(&self, index: String, request: SearchRequest) -> Result<SearchResults> {
        let hits = self.engine.search(&index, &request).await?;
        debug!(
            index = %index,
            query = %request.query,
            total = hits.total,
            returned = hits.hits.len(),
            "search completed"
        );
        Ok(SearchResults {
            query: request.query,
            total: hits.total,
            page: request.page,
            page_size: request.page_size,
            page_count: page_count(hits.total, request.page_size),
            results: hits.hits,
        })
    }
}
