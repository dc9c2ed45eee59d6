use catalog_model::{Episode, EpisodeAsset, EpisodeID, Series, SeriesID, ValidImportRequest};
use std::fmt;
use std::sync::Arc;
use tracing::{error, info, warn};

use super::broker::TaskBroker;
use super::task::{
    DeleteEpisodePayload, DeleteSeriesPayload, ImportContentPayload,
    IndexEpisodePayload, IndexSeriesPayload, TaskHandle, TaskMessage,
    TaskPayload,
};
use crate::error::{CatalogError, Result};

/// Producer side of the task queue.
#[derive(Clone)]
pub struct TaskQueue {
    broker: Arc<dyn TaskBroker>,
}

impl fmt::Debug for TaskQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskQueue")
            .field("broker", &self.broker)
            .finish()
    }
}

impl TaskQueue {
    pub fn new(broker: Arc<dyn TaskBroker>) -> Self {
        Self { broker }
    }

    pub fn broker(&self) -> Arc<dyn TaskBroker> {
        Arc::clone(&self.broker)
    }

    /// Serializes `payload` and stores it with the broker.
    pub async fn enqueue(&self, payload: TaskPayload) -> Result<TaskHandle> {
        let kind = payload.kind();
        let subject = payload.subject();
        let message = TaskMessage::new(&payload).map_err(|err| {
            error!(kind = %kind, subject = %subject, error = %err, "failed to encode task payload");
            err
        })?;
        let handle = TaskHandle::from_message(&message);

        self.broker.push(message).await.map_err(|err| {
            error!(kind = %kind, subject = %subject, error = %err, "failed to enqueue task");
            err
        })?;

        info!(task_id = %handle.id, kind = %kind, subject = %subject, "task enqueued");
        Ok(handle)
    }

    pub async fn enqueue_index_series(&self, series: &Series) -> Result<TaskHandle> {
        self.enqueue(TaskPayload::IndexSeries(IndexSeriesPayload {
            series: series.clone(),
        }))
        .await
    }

    pub async fn enqueue_index_episode(
        &self,
        episode: &Episode,
        assets: &[EpisodeAsset],
    ) -> Result<TaskHandle> {
        self.enqueue(TaskPayload::IndexEpisode(IndexEpisodePayload {
            episode: episode.clone(),
            assets: assets.to_vec(),
        }))
        .await
    }

    pub async fn enqueue_delete_series(&self, series_id: SeriesID) -> Result<TaskHandle> {
        self.enqueue(TaskPayload::DeleteSeries(DeleteSeriesPayload {
            series_id: series_id.to_string(),
        }))
        .await
    }

    pub async fn enqueue_delete_episode(&self, episode_id: EpisodeID) -> Result<TaskHandle> {
        self.enqueue(TaskPayload::DeleteEpisode(DeleteEpisodePayload {
            episode_id: episode_id.to_string(),
        }))
        .await
    }

    pub async fn enqueue_import_content(
        &self,
        request: &ValidImportRequest,
    ) -> Result<TaskHandle> {
        self.enqueue(TaskPayload::ImportContent(ImportContentPayload {
            source_type: request.source_type.as_str().to_string(),
            source_url: request.source_url.clone(),
            series_id: request.series_id.to_string(),
        }))
        .await
    }
}

/// Outcome of a side effect whose failure must not fail the caller.
///
/// Constructing one from a failed result logs the failure at `warn`; the
/// error is kept for callers that want to report it.
#[must_use]
#[derive(Debug)]
pub enum BestEffort<T> {
    Completed(T),
    Failed(CatalogError),
}

impl<T> BestEffort<T> {
    pub fn from_result(result: Result<T>, operation: &str) -> Self {
        match result {
            Ok(value) => BestEffort::Completed(value),
            Err(err) => {
                warn!(operation, error = %err, "best-effort operation failed");
                BestEffort::Failed(err)
            }
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, BestEffort::Completed(_))
    }

    pub fn completed(&self) -> Option<&T> {
        match self {
            BestEffort::Completed(value) => Some(value),
            BestEffort::Failed(_) => None,
        }
    }

    pub fn error(&self) -> Option<&CatalogError> {
        match self {
            BestEffort::Completed(_) => None,
            BestEffort::Failed(err) => Some(err),
        }
    }

    pub fn into_option(self) -> Option<T> {
        match self {
            BestEffort::Completed(value) => Some(value),
            BestEffort::Failed(_) => None,
        }
    }
}
