//! Pulling episodes from external platforms into the catalog.

mod processor;
mod youtube;

pub use processor::ImportProcessor;
pub use youtube::YouTubeImporter;

use async_trait::async_trait;
use catalog_model::{AssetDraft, EpisodeDraft, EpisodeID};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{CatalogError, Result};

/// What an importer produced for one source URL, before persistence.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportedEpisode {
    /// Provisional id the asset draft points at. The store assigns the
    /// durable id; this one is never persisted.
    pub draft_id: EpisodeID,
    pub episode: EpisodeDraft,
    pub asset: Option<AssetDraft>,
}

/// Fetches episode metadata from one external platform.
#[async_trait]
pub trait Importer: Send + Sync + fmt::Debug {
    async fn fetch_episode(&self, source_url: &str, series_id: &str) -> Result<ImportedEpisode>;
}

/// Case-sensitive `source_type -> importer` table built at startup.
#[derive(Clone, Default)]
pub struct ImporterRegistry {
    importers: HashMap<String, Arc<dyn Importer>>,
}

impl fmt::Debug for ImporterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut sources: Vec<&str> = self.importers.keys().map(String::as_str).collect();
        sources.sort_unstable();
        f.debug_struct("ImporterRegistry")
            .field("sources", &sources)
            .finish()
    }
}

impl ImporterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every importer shipped in this crate.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register("youtube", Arc::new(YouTubeImporter::new()));
        registry
    }

    pub fn register(&mut self, source_type: impl Into<String>, importer: Arc<dyn Importer>) {
        self.importers.insert(source_type.into(), importer);
    }

    pub fn get(&self, source_type: &str) -> Result<Arc<dyn Importer>> {
        self.importers
            .get(source_type)
            .cloned()
            .ok_or_else(|| CatalogError::UnsupportedSource(source_type.to_string()))
    }

    pub fn contains(&self, source_type: &str) -> bool {
        self.importers.contains_key(source_type)
    }
}
