//! Full-text search index access.
//!
//! The index is a rebuildable projection of the relational store: documents
//! are keyed by entity id so re-indexing overwrites, and deletes are
//! idempotent.

mod memory;
mod opensearch;
mod query;

pub use memory::InMemorySearchEngine;
pub use opensearch::OpenSearchClient;
pub use query::build_search_query;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

use crate::error::Result;

#[async_trait]
pub trait SearchEngine: Send + Sync + fmt::Debug {
    async fn index_exists(&self, index: &str) -> Result<bool>;

    /// Creates `index` with the given settings and mappings body.
    async fn create_index(&self, index: &str, mapping: &Value) -> Result<()>;

    /// Upserts `document` under `id`. The write is visible to the next
    /// search.
    async fn index_document(&self, index: &str, id: &str, document: &Value) -> Result<()>;

    /// Removes the document; a missing document is not an error.
    async fn delete_document(&self, index: &str, id: &str) -> Result<()>;

    async fn search(&self, index: &str, request: &SearchRequest) -> Result<SearchHits>;
}

/// Query, 1-based page and exact-match filters. Filter values are compared
/// against keyword fields as-is.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    #[serde(default)]
    pub query: String,
    pub page: u32,
    pub page_size: u32,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub filters: BTreeMap<String, Value>,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>, page: u32, page_size: u32) -> Self {
        Self {
            query: query.into(),
            page,
            page_size,
            filters: BTreeMap::new(),
        }
    }

    pub fn filter(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.insert(field.into(), value.into());
        self
    }

    /// Offset of the first hit on this page.
    pub fn from(&self) -> u64 {
        u64::from(self.page_size) * u64::from(self.page.saturating_sub(1))
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchHits {
    pub total: u64,
    pub hits: Vec<Value>,
    pub page: u32,
    pub size: u32,
}

/// `ceil(total / page_size)`, never less than one.
pub fn page_count(total: u64, page_size: u32) -> u64 {
    if page_size == 0 {
        return 1;
    }
    total.div_ceil(u64::from(page_size)).max(1)
}

/// Index names derived from the configured prefix.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IndexNames {
    prefix: String,
}

impl IndexNames {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn series(&self) -> String {
        format!("{}-series", self.prefix)
    }

    pub fn episodes(&self) -> String {
        format!("{}-episodes", self.prefix)
    }
}
