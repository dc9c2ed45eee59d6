use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};

use super::documents::{EpisodeDocument, SeriesDocument};
use crate::error::{CatalogError, Result};
use crate::search::{IndexNames, SearchEngine};
use crate::tasks::{
    DeleteEpisodePayload, DeleteSeriesPayload, IndexEpisodePayload,
    IndexSeriesPayload, TaskHandler, TaskKind, TaskPayload, TaskRouter,
};

/// Handles the four search tasks by projecting payload snapshots into
/// documents. Every operation is an upsert or an idempotent delete keyed by
/// entity id, so redelivery is harmless.
#[derive(Clone, Debug)]
pub struct SearchIndexer {
    engine: Arc<dyn SearchEngine>,
    names: IndexNames,
}

impl SearchIndexer {
    pub fn new(engine: Arc<dyn SearchEngine>, names: IndexNames) -> Self {
        Self { engine, names }
    }

    /// Routes for every indexing kind, all served by this indexer.
    pub fn routes(self: Arc<Self>) -> TaskRouter {
        TaskKind::INDEXING
            .into_iter()
            .fold(TaskRouter::new(), |router, kind| {
                router.with(kind, Arc::clone(&self) as Arc<dyn TaskHandler>)
            })
    }

    pub async fn index_series(&self, payload: IndexSeriesPayload) -> Result<()> {
        let index = self.names.series();
        let id = payload.series.id.to_string();
        let document = SeriesDocument::from(&payload.series).into_json()?;
        self.engine.index_document(&index, &id, &document).await?;
        info!(index = %index, series_id = %id, "indexed series");
        Ok(())
    }

    pub async fn index_episode(&self, payload: IndexEpisodePayload) -> Result<()> {
        let index = self.names.episodes();
        let id = payload.episode.id.to_string();
        let document = EpisodeDocument::new(&payload.episode, &payload.assets).into_json()?;
        self.engine.index_document(&index, &id, &document).await?;
        info!(index = %index, episode_id = %id, assets = payload.assets.len(), "indexed episode");
        Ok(())
    }

    pub async fn delete_series(&self, payload: DeleteSeriesPayload) -> Result<()> {
        self.delete(self.names.series(), &payload.series_id).await
    }

    pub async fn delete_episode(&self, payload: DeleteEpisodePayload) -> Result<()> {
        self.delete(self.names.episodes(), &payload.episode_id).await
    }

    async fn delete(&self, index: String, id: &str) -> Result<()> {
        match self.engine.delete_document(&index, id).await {
            Ok(()) => {
                info!(index = %index, id, "deleted document");
                Ok(())
            }
            Err(err) if err.is_not_found() => {
                debug!(index = %index, id, "document already absent");
                Ok(())
            }
            Err(err) => Err(err),
        }
    }
}

#[async_trait]
impl TaskHandler for SearchIndexer {
    async fn handle(&self, payload: TaskPayload) -> Result<()> {
        match payload {
            TaskPayload::IndexSeries(p) => self.index_series(p).await,
            TaskPayload::IndexEpisode(p) => self.index_episode(p).await,
            TaskPayload::DeleteSeries(p) => self.delete_series(p).await,
            TaskPayload::DeleteEpisode(p) => self.delete_episode(p).await,
            other => Err(CatalogError::InvalidPayload(format!(
                "search indexer cannot handle {}",
                other.kind()
            ))),
        }
    }
}
