use async_trait::async_trait;
use catalog_model::{AssetDraft, Episode, EpisodeAsset};
use std::sync::Arc;
use tracing::{debug, info};

use super::ImporterRegistry;
use crate::error::{CatalogError, Result};
use crate::store::Store;
use crate::tasks::{
    BestEffort, ImportContentPayload, TaskHandler, TaskKind, TaskPayload, TaskQueue,
    TaskRouter,
};

/// Runs `import:content` tasks: fetch through the registered importer,
/// persist the episode and its asset, then queue the episode for indexing.
#[derive(Clone, Debug)]
pub struct ImportProcessor {
    registry: ImporterRegistry,
    store: Arc<dyn Store>,
    queue: TaskQueue,
}

impl ImportProcessor {
    pub fn new(registry: ImporterRegistry, store: Arc<dyn Store>, queue: TaskQueue) -> Self {
        Self {
            registry,
            store,
            queue,
        }
    }

    pub fn routes(self: Arc<Self>) -> TaskRouter {
        TaskRouter::new().with(TaskKind::ImportContent, self)
    }

    pub async fn import(&self, payload: ImportContentPayload) -> Result<Episode> {
        // Resolve first so an unsupported source never touches the store.
        let importer = self.registry.get(&payload.source_type)?;

        let imported = importer
            .fetch_episode(&payload.source_url, &payload.series_id)
            .await
            .map_err(|err| err.context("failed to fetch episode"))?;
        debug!(
            source_type = %payload.source_type,
            draft_id = %imported.draft_id,
            "fetched episode from source"
        );

        let episode = self
            .store
            .create_episode(&imported.episode)
            .await
            .map_err(|err| err.context("failed to create episode"))?;

        let mut assets: Vec<EpisodeAsset> = Vec::new();
        if let Some(asset) = imported.asset {
            let draft = AssetDraft {
                episode_id: episode.id,
                ..asset
            };
            let asset = self
                .store
                .create_asset(&draft)
                .await
                .map_err(|err| err.context("failed to create asset"))?;
            assets.push(asset);
        }

        // The episode row exists now; failing the task here would import it
        // a second time on retry.
        let _ = BestEffort::from_result(
            self.queue.enqueue_index_episode(&episode, &assets).await,
            "enqueue index episode after import",
        );

        info!(
            episode_id = %episode.id,
            series_id = %episode.series_id,
            source_type = %payload.source_type,
            "imported episode"
        );
        Ok(episode)
    }
}

#[async_trait]
impl TaskHandler for ImportProcessor {
    async fn handle(&self, payload: TaskPayload) -> Result<()> {
        match payload {
            TaskPayload::ImportContent(p) => self.import(p).await.map(|_| ()),
            other => Err(CatalogError::InvalidPayload(format!(
                "import processor cannot handle {}",
                other.kind()
            ))),
        }
    }
}
