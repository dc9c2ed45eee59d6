use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

use super::mappings::{episode_mapping, series_mapping};
use crate::error::Result;
use crate::search::{IndexNames, SearchEngine};
use crate::tasks::Provisioner;

/// Creates any missing search index with its fixed mapping.
#[derive(Clone, Debug)]
pub struct IndexProvisioner {
    engine: Arc<dyn SearchEngine>,
    names: IndexNames,
}

impl IndexProvisioner {
    pub fn new(engine: Arc<dyn SearchEngine>, names: IndexNames) -> Self {
        Self { engine, names }
    }

    fn indices(&self) -> [(String, Value); 2] {
        [
            (self.names.series(), series_mapping()),
            (self.names.episodes(), episode_mapping()),
        ]
    }

    /// Returns the names of the indices that had to be created.
    pub async fn ensure_indices(&self) -> Result<Vec<String>> {
        let mut created = Vec::new();
        for (index, mapping) in self.indices() {
            if self
                .engine
                .index_exists(&index)
                .await
                .map_err(|err| err.context(format!("checking index {index}")))?
            {
                debug!(index = %index, "search index present");
                continue;
            }
            self.engine
                .create_index(&index, &mapping)
                .await
                .map_err(|err| err.context(format!("creating index {index}")))?;
            info!(index = %index, "created search index");
            created.push(index);
        }
        Ok(created)
    }
}

#[async_trait]
impl Provisioner for IndexProvisioner {
    async fn provision(&self) -> Result<()> {
        self.ensure_indices().await.map(|_| ())
    }
}
