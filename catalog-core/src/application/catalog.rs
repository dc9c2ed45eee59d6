use catalog_model::{
    AssetDraft, AssetType, Category, CategoryDraft, CategoryID, Episode, EpisodeAsset,
    EpisodeDraft, EpisodeID, EpisodeWithAssets, ImportRequest, Series, SeriesDraft, SeriesID,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::error::{CatalogError, Result};
use crate::pagination::{PageRequest, Paginated, fetch_paginated};
use crate::storage::{ObjectStorage, object_key};
use crate::store::Store;
use crate::tasks::{BestEffort, TaskHandle, TaskQueue};

/// A committed write plus the outcome of the follow-up index task.
///
/// The write stands even when `index_task` failed; the index catches up on
/// the next write to the same entity.
#[derive(Debug)]
pub struct WriteOutcome<T> {
    pub entity: T,
    pub index_task: BestEffort<TaskHandle>,
}

impl<T> WriteOutcome<T> {
    pub fn into_entity(self) -> T {
        self.entity
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadUrl {
    pub upload_url: String,
    pub key: String,
    pub bucket: String,
    pub expires_at: DateTime<Utc>,
}

/// Client report that an object was written to a presigned URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadConfirmation {
    pub asset_type: AssetType,
    pub mime_type: String,
    pub size: i64,
    pub key: String,
}

/// Catalog writes. The store is written first; index and delete tasks are
/// enqueued afterwards on a best-effort basis.
#[derive(Clone)]
pub struct CatalogService {
    store: Arc<dyn Store>,
    queue: TaskQueue,
    storage: Arc<dyn ObjectStorage>,
    presign_expiry: Duration,
}

impl fmt::Debug for CatalogService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CatalogService")
            .field("store", &self.store)
            .field("queue", &self.queue)
            .field("storage", &self.storage)
            .field("presign_expiry", &self.presign_expiry)
            .finish()
    }
}

impl CatalogService {
    pub fn new(
        store: Arc<dyn Store>,
        queue: TaskQueue,
        storage: Arc<dyn ObjectStorage>,
        presign_expiry: Duration,
    ) -> Self {
        Self {
            store,
            queue,
            storage,
            presign_expiry,
        }
    }

    pub async fn create_series(&self, draft: SeriesDraft) -> Result<WriteOutcome<Series>> {
        draft.validate()?;
        let series = self.store.create_series(&draft).await?;
        info!(series_id = %series.id, "series created");
        let index_task = self.index_series(&series).await;
        Ok(WriteOutcome {
            entity: series,
            index_task,
        })
    }

    pub async fn update_series(
        &self,
        id: SeriesID,
        draft: SeriesDraft,
    ) -> Result<WriteOutcome<Series>> {
        draft.validate()?;
        let series = self.store.update_series(id, &draft).await?;
        info!(series_id = %series.id, "series updated");
        let index_task = self.index_series(&series).await;
        Ok(WriteOutcome {
            entity: series,
            index_task,
        })
    }

    pub async fn delete_series(&self, id: SeriesID) -> Result<BestEffort<TaskHandle>> {
        self.store.delete_series(id).await?;
        info!(series_id = %id, "series deleted");
        Ok(BestEffort::from_result(
            self.queue.enqueue_delete_series(id).await,
            "enqueue delete series",
        ))
    }

    pub async fn get_series(&self, id: SeriesID) -> Result<Series> {
        self.store.get_series(id).await
    }

    pub async fn list_series(
        &self,
        page: Option<u32>,
        page_size: Option<u32>,
    ) -> Result<Paginated<Series>> {
        let request = PageRequest::new(page, page_size);
        let (total, rows) = fetch_paginated(
            self.store.count_series(),
            self.store.list_series(request.limit(), request.offset()),
        )
        .await?;
        Ok(Paginated::new(request, total, rows))
    }

    pub async fn create_episode(&self, draft: EpisodeDraft) -> Result<WriteOutcome<Episode>> {
        draft.validate()?;
        let episode = self.store.create_episode(&draft).await?;
        info!(episode_id = %episode.id, series_id = %episode.series_id, "episode created");
        let index_task = self.index_episode(&episode).await;
        Ok(WriteOutcome {
            entity: episode,
            index_task,
        })
    }

    pub async fn update_episode(
        &self,
        id: EpisodeID,
        draft: EpisodeDraft,
    ) -> Result<WriteOutcome<Episode>> {
        draft.validate()?;
        let episode = self.store.update_episode(id, &draft).await?;
        info!(episode_id = %episode.id, "episode updated");
        let index_task = self.index_episode(&episode).await;
        Ok(WriteOutcome {
            entity: episode,
            index_task,
        })
    }

    pub async fn delete_episode(&self, id: EpisodeID) -> Result<BestEffort<TaskHandle>> {
        self.store.delete_episode(id).await?;
        info!(episode_id = %id, "episode deleted");
        Ok(BestEffort::from_result(
            self.queue.enqueue_delete_episode(id).await,
            "enqueue delete episode",
        ))
    }

    pub async fn get_episode(&self, id: EpisodeID) -> Result<EpisodeWithAssets> {
        let episode = self.store.get_episode(id).await?;
        let assets = self.store.list_assets(id).await?;
        Ok(EpisodeWithAssets { episode, assets })
    }

    /// One page of a series' episodes with their assets. An unknown series
    /// yields an empty page.
    pub async fn list_series_episodes(
        &self,
        series_id: SeriesID,
        page: Option<u32>,
        page_size: Option<u32>,
    ) -> Result<Paginated<EpisodeWithAssets>> {
        let request = PageRequest::new(page, page_size);
        let (total, rows) = fetch_paginated(
            self.store.count_episodes_by_series(series_id),
            self.store.list_episodes_with_assets_by_series(
                series_id,
                request.limit(),
                request.offset(),
            ),
        )
        .await?;
        Ok(Paginated::new(request, total, rows))
    }

    /// Attaches an asset and re-indexes the owning episode with its full
    /// asset list.
    pub async fn add_asset(&self, draft: AssetDraft) -> Result<WriteOutcome<EpisodeAsset>> {
        draft.validate()?;
        let asset = self.store.create_asset(&draft).await?;
        info!(asset_id = %asset.id, episode_id = %asset.episode_id, "asset added");

        let index_task = match self.store.get_episode(asset.episode_id).await {
            Ok(episode) => self.index_episode(&episode).await,
            Err(err) => BestEffort::from_result(Err(err), "reload episode for indexing"),
        };
        Ok(WriteOutcome {
            entity: asset,
            index_task,
        })
    }

    pub async fn confirm_upload(
        &self,
        episode_id: EpisodeID,
        upload: UploadConfirmation,
    ) -> Result<WriteOutcome<EpisodeAsset>> {
        self.add_asset(AssetDraft {
            episode_id,
            asset_type: upload.asset_type,
            mime_type: upload.mime_type,
            size_bytes: Some(upload.size),
            url: Some(upload.key),
        })
        .await
    }

    pub async fn create_category(&self, draft: CategoryDraft) -> Result<Category> {
        draft.validate()?;
        let category = self.store.create_category(&draft).await?;
        info!(category_id = %category.id, slug = %category.slug, "category created");
        Ok(category)
    }

    pub async fn get_category(&self, id: CategoryID) -> Result<Category> {
        self.store.get_category(id).await
    }

    pub async fn update_category(&self, id: CategoryID, draft: CategoryDraft) -> Result<Category> {
        draft.validate()?;
        let category = self.store.update_category(id, &draft).await?;
        info!(category_id = %category.id, slug = %category.slug, "category updated");
        Ok(category)
    }

    pub async fn delete_category(&self, id: CategoryID) -> Result<()> {
        self.store.delete_category(id).await?;
        info!(category_id = %id, "category deleted");
        Ok(())
    }

    pub async fn list_categories(
        &self,
        page: Option<u32>,
        page_size: Option<u32>,
    ) -> Result<Paginated<Category>> {
        let request = PageRequest::new(page, page_size);
        let (total, rows) = fetch_paginated(
            self.store.count_categories(),
            self.store.list_categories(request.limit(), request.offset()),
        )
        .await?;
        Ok(Paginated::new(request, total, rows))
    }

    /// Queues an import for an existing series.
    ///
    /// Nothing has been written at this point, so a failed enqueue is
    /// reported to the caller.
    pub async fn request_import(&self, request: ImportRequest) -> Result<TaskHandle> {
        let request = request.validate()?;
        self.store.get_series(request.series_id).await?;
        self.queue.enqueue_import_content(&request).await
    }

    pub async fn upload_url(&self, episode_id: EpisodeID, filename: &str) -> Result<UploadUrl> {
        if filename.trim().is_empty() {
            return Err(CatalogError::InvalidInput("filename is required".into()));
        }
        let episode = self.store.get_episode(episode_id).await?;

        let now = Utc::now();
        let key = object_key(episode.series_id, episode.id, filename, now);
        let url = self
            .storage
            .presigned_put_url(&key, self.presign_expiry)
            .await
            .map_err(|err| {
                warn!(episode_id = %episode_id, error = %err, "failed to presign upload");
                err.context("could not generate upload url")
            })?;

        let expires_at = chrono::Duration::from_std(self.presign_expiry)
            .ok()
            .and_then(|ttl| now.checked_add_signed(ttl))
            .unwrap_or(now);

        info!(episode_id = %episode_id, key = %key, "generated upload url");
        Ok(UploadUrl {
            upload_url: url.to_string(),
            key,
            bucket: self.storage.bucket().to_string(),
            expires_at,
        })
    }

    async fn index_series(&self, series: &Series) -> BestEffort<TaskHandle> {
        BestEffort::from_result(
            self.queue.enqueue_index_series(series).await,
            "enqueue index series",
        )
    }

    async fn index_episode(&self, episode: &Episode) -> BestEffort<TaskHandle> {
        let result = match self.store.list_assets(episode.id).await {
            Ok(assets) => self.queue.enqueue_index_episode(episode, &assets).await,
            Err(err) => Err(err.context("failed to load assets for indexing")),
        };
        BestEffort::from_result(result, "enqueue index episode")
    }
}
