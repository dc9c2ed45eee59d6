//! Shared fakes for catalog-core integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use catalog_core::error::{CatalogError, Result};
use catalog_core::search::{InMemorySearchEngine, SearchEngine, SearchHits, SearchRequest};
use catalog_core::storage::ObjectStorage;
use catalog_core::store::Store;
use catalog_core::tasks::{
    ClaimRequest, HousekeepingReport, QueueDepth, TaskBroker, TaskLease, TaskMessage,
};
use catalog_model::{
    AssetDraft, AssetID, Category, CategoryDraft, CategoryID, Episode, EpisodeAsset,
    EpisodeDraft, EpisodeID, EpisodeWithAssets, Series, SeriesDraft, SeriesID, SeriesType,
};
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, MutexGuard};
use url::Url;

#[derive(Debug, Default)]
struct StoreState {
    series: HashMap<SeriesID, Series>,
    episodes: HashMap<EpisodeID, Episode>,
    assets: Vec<EpisodeAsset>,
    categories: Vec<Category>,
    calls: Vec<&'static str>,
}

/// In-memory [`Store`] that records every call by method name.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<StoreState>,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every create, update and delete fail with a retryable error.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub async fn calls(&self) -> Vec<&'static str> {
        self.state.lock().await.calls.clone()
    }

    pub async fn episodes(&self) -> Vec<Episode> {
        self.state.lock().await.episodes.values().cloned().collect()
    }

    pub async fn assets(&self) -> Vec<EpisodeAsset> {
        self.state.lock().await.assets.clone()
    }

    pub async fn seed_series(&self, title: &str) -> Series {
        let now = Utc::now();
        let series = Series {
            id: SeriesID::new(),
            title: title.into(),
            description: None,
            category_id: CategoryID::new(),
            language: Some("en".into()),
            series_type: SeriesType::Documentary,
            created_at: now,
            updated_at: now,
        };
        self.state
            .lock()
            .await
            .series
            .insert(series.id, series.clone());
        series
    }

    async fn record(
        &self,
        call: &'static str,
        write: bool,
    ) -> Result<MutexGuard<'_, StoreState>> {
        let mut state = self.state.lock().await;
        state.calls.push(call);
        if write && self.fail_writes.load(Ordering::SeqCst) {
            return Err(CatalogError::Internal("store unavailable".into()));
        }
        Ok(state)
    }
}

fn newest_first<T>(
    mut rows: Vec<T>,
    created: impl Fn(&T) -> DateTime<Utc>,
    limit: u32,
    offset: u64,
) -> Vec<T> {
    rows.sort_by_key(|row| std::cmp::Reverse(created(row)));
    rows.into_iter()
        .skip(offset as usize)
        .take(limit as usize)
        .collect()
}

#[async_trait]
impl Store for MemoryStore {
    async fn get_series(&self, id: SeriesID) -> Result<Series> {
        let state = self.record("get_series", false).await?;
        state
            .series
            .get(&id)
            .cloned()
            .ok_or_else(|| CatalogError::NotFound(format!("series {id}")))
    }

    async fn create_series(&self, draft: &SeriesDraft) -> Result<Series> {
        let mut state = self.record("create_series", true).await?;
        let now = Utc::now();
        let series = Series {
            id: SeriesID::new(),
            title: draft.title.clone(),
            description: draft.description.clone(),
            category_id: draft.category_id,
            language: draft.language.clone(),
            series_type: draft.series_type,
            created_at: now,
            updated_at: now,
        };
        state.series.insert(series.id, series.clone());
        Ok(series)
    }

    async fn update_series(&self, id: SeriesID, draft: &SeriesDraft) -> Result<Series> {
        let mut state = self.record("update_series", true).await?;
        let series = state
            .series
            .get_mut(&id)
            .ok_or_else(|| CatalogError::NotFound(format!("series {id}")))?;
        series.title = draft.title.clone();
        series.description = draft.description.clone();
        series.category_id = draft.category_id;
        series.language = draft.language.clone();
        series.series_type = draft.series_type;
        series.updated_at = Utc::now();
        Ok(series.clone())
    }

    async fn delete_series(&self, id: SeriesID) -> Result<()> {
        let mut state = self.record("delete_series", true).await?;
        state
            .series
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| CatalogError::NotFound(format!("series {id}")))
    }

    async fn count_series(&self) -> Result<u64> {
        let state = self.record("count_series", false).await?;
        Ok(state.series.len() as u64)
    }

    async fn list_series(&self, limit: u32, offset: u64) -> Result<Vec<Series>> {
        let state = self.record("list_series", false).await?;
        let rows = state.series.values().cloned().collect();
        Ok(newest_first(rows, |s: &Series| s.created_at, limit, offset))
    }

    async fn get_episode(&self, id: EpisodeID) -> Result<Episode> {
        let state = self.record("get_episode", false).await?;
        state
            .episodes
            .get(&id)
            .cloned()
            .ok_or_else(|| CatalogError::NotFound(format!("episode {id}")))
    }

    async fn create_episode(&self, draft: &EpisodeDraft) -> Result<Episode> {
        let mut state = self.record("create_episode", true).await?;
        let now = Utc::now();
        let episode = Episode {
            id: EpisodeID::new(),
            series_id: draft.series_id,
            title: draft.title.clone(),
            description: draft.description.clone(),
            duration_seconds: draft.duration_seconds,
            publish_date: draft.publish_date,
            created_at: now,
            updated_at: now,
        };
        state.episodes.insert(episode.id, episode.clone());
        Ok(episode)
    }

    async fn update_episode(&self, id: EpisodeID, draft: &EpisodeDraft) -> Result<Episode> {
        let mut state = self.record("update_episode", true).await?;
        let episode = state
            .episodes
            .get_mut(&id)
            .ok_or_else(|| CatalogError::NotFound(format!("episode {id}")))?;
        episode.title = draft.title.clone();
        episode.description = draft.description.clone();
        episode.duration_seconds = draft.duration_seconds;
        episode.publish_date = draft.publish_date;
        episode.updated_at = Utc::now();
        Ok(episode.clone())
    }

    async fn delete_episode(&self, id: EpisodeID) -> Result<()> {
        let mut state = self.record("delete_episode", true).await?;
        state.assets.retain(|asset| asset.episode_id != id);
        state
            .episodes
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| CatalogError::NotFound(format!("episode {id}")))
    }

    async fn count_episodes_by_series(&self, series_id: SeriesID) -> Result<u64> {
        let state = self.record("count_episodes_by_series", false).await?;
        Ok(state
            .episodes
            .values()
            .filter(|episode| episode.series_id == series_id)
            .count() as u64)
    }

    async fn list_episodes_with_assets_by_series(
        &self,
        series_id: SeriesID,
        limit: u32,
        offset: u64,
    ) -> Result<Vec<EpisodeWithAssets>> {
        let state = self.record("list_episodes_with_assets_by_series", false).await?;
        let rows = state
            .episodes
            .values()
            .filter(|episode| episode.series_id == series_id)
            .cloned()
            .collect();
        Ok(newest_first(rows, |e: &Episode| e.created_at, limit, offset)
            .into_iter()
            .map(|episode| EpisodeWithAssets {
                assets: state
                    .assets
                    .iter()
                    .filter(|asset| asset.episode_id == episode.id)
                    .cloned()
                    .collect(),
                episode,
            })
            .collect())
    }

    async fn list_assets(&self, episode_id: EpisodeID) -> Result<Vec<EpisodeAsset>> {
        let state = self.record("list_assets", false).await?;
        Ok(state
            .assets
            .iter()
            .filter(|asset| asset.episode_id == episode_id)
            .cloned()
            .collect())
    }

    async fn create_asset(&self, draft: &AssetDraft) -> Result<EpisodeAsset> {
        let mut state = self.record("create_asset", true).await?;
        if !state.episodes.contains_key(&draft.episode_id) {
            return Err(CatalogError::NotFound(format!("episode {}", draft.episode_id)));
        }
        let asset = EpisodeAsset {
            id: AssetID::new(),
            episode_id: draft.episode_id,
            asset_type: draft.asset_type,
            mime_type: draft.mime_type.clone(),
            size_bytes: draft.size_bytes,
            url: draft.url.clone(),
            created_at: Utc::now(),
        };
        state.assets.push(asset.clone());
        Ok(asset)
    }

    async fn get_category(&self, id: CategoryID) -> Result<Category> {
        let state = self.record("get_category", false).await?;
        state
            .categories
            .iter()
            .find(|category| category.id == id)
            .cloned()
            .ok_or_else(|| CatalogError::NotFound(format!("category {id}")))
    }

    async fn create_category(&self, draft: &CategoryDraft) -> Result<Category> {
        let mut state = self.record("create_category", true).await?;
        let now = Utc::now();
        let category = Category {
            id: CategoryID::new(),
            name: draft.name.clone(),
            slug: draft.slug(),
            created_at: now,
            updated_at: now,
        };
        state.categories.push(category.clone());
        Ok(category)
    }

    async fn update_category(&self, id: CategoryID, draft: &CategoryDraft) -> Result<Category> {
        let mut state = self.record("update_category", true).await?;
        let category = state
            .categories
            .iter_mut()
            .find(|category| category.id == id)
            .ok_or_else(|| CatalogError::NotFound(format!("category {id}")))?;
        category.name = draft.name.clone();
        category.slug = draft.slug();
        category.updated_at = Utc::now();
        Ok(category.clone())
    }

    async fn delete_category(&self, id: CategoryID) -> Result<()> {
        let mut state = self.record("delete_category", true).await?;
        if state.series.values().any(|series| series.category_id == id) {
            return Err(CatalogError::InvalidInput(format!(
                "category {id} is still in use"
            )));
        }
        let before = state.categories.len();
        state.categories.retain(|category| category.id != id);
        if state.categories.len() == before {
            return Err(CatalogError::NotFound(format!("category {id}")));
        }
        Ok(())
    }

    async fn count_categories(&self) -> Result<u64> {
        let state = self.record("count_categories", false).await?;
        Ok(state.categories.len() as u64)
    }

    async fn list_categories(&self, limit: u32, offset: u64) -> Result<Vec<Category>> {
        let state = self.record("list_categories", false).await?;
        let mut rows = state.categories.clone();
        rows.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(rows
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect())
    }
}

/// [`InMemorySearchEngine`] that also records `index_document` ids and can
/// be switched into failing mode.
#[derive(Debug, Default)]
pub struct RecordingSearch {
    pub inner: InMemorySearchEngine,
    indexed: Mutex<Vec<(String, String)>>,
    unavailable: AtomicBool,
    missing_on_delete: AtomicBool,
}

impl RecordingSearch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Answers every delete the way OpenSearch does for an absent document.
    pub fn set_missing_on_delete(&self, missing: bool) {
        self.missing_on_delete.store(missing, Ordering::SeqCst);
    }

    pub async fn indexed(&self) -> Vec<(String, String)> {
        self.indexed.lock().await.clone()
    }

    fn check(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(CatalogError::Search("engine unavailable".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl SearchEngine for RecordingSearch {
    async fn index_exists(&self, index: &str) -> Result<bool> {
        self.check()?;
        self.inner.index_exists(index).await
    }

    async fn create_index(&self, index: &str, mapping: &Value) -> Result<()> {
        self.check()?;
        self.inner.create_index(index, mapping).await
    }

    async fn index_document(&self, index: &str, id: &str, document: &Value) -> Result<()> {
        self.check()?;
        self.indexed
            .lock()
            .await
            .push((index.to_string(), id.to_string()));
        self.inner.index_document(index, id, document).await
    }

    async fn delete_document(&self, index: &str, id: &str) -> Result<()> {
        self.check()?;
        if self.missing_on_delete.load(Ordering::SeqCst) {
            return Err(CatalogError::HttpStatus {
                status: reqwest::StatusCode::NOT_FOUND,
                url: format!("http://search.test/{index}/_doc/{id}"),
                body: r#"{"result":"not_found"}"#.into(),
            });
        }
        self.inner.delete_document(index, id).await
    }

    async fn search(&self, index: &str, request: &SearchRequest) -> Result<SearchHits> {
        self.check()?;
        self.inner.search(index, request).await
    }
}

/// Broker whose every operation fails, as when Redis is unreachable.
#[derive(Debug, Default)]
pub struct DownBroker;

fn down<T>() -> Result<T> {
    Err(CatalogError::Broker("connection refused".into()))
}

#[async_trait]
impl TaskBroker for DownBroker {
    async fn push(&self, _message: TaskMessage) -> Result<()> {
        down()
    }

    async fn claim(&self, _request: &ClaimRequest) -> Result<Option<TaskLease>> {
        down()
    }

    async fn ack(&self, _lease: &TaskLease) -> Result<bool> {
        down()
    }

    async fn retry(&self, _lease: &TaskLease, _delay: Duration, _error: &str) -> Result<bool> {
        down()
    }

    async fn dead_letter(&self, _lease: &TaskLease, _error: &str) -> Result<bool> {
        down()
    }

    async fn housekeep(&self, _now: DateTime<Utc>) -> Result<HousekeepingReport> {
        down()
    }

    async fn depth(&self) -> Result<QueueDepth> {
        down()
    }

    async fn dead_letters(&self, _limit: usize) -> Result<Vec<TaskMessage>> {
        down()
    }

    async fn ping(&self) -> Result<()> {
        down()
    }
}

/// Object storage that signs nothing and returns a fixed URL shape.
#[derive(Debug)]
pub struct FakeStorage {
    pub bucket: String,
}

impl Default for FakeStorage {
    fn default() -> Self {
        Self {
            bucket: "episodes".into(),
        }
    }
}

#[async_trait]
impl ObjectStorage for FakeStorage {
    async fn ensure_bucket(&self) -> Result<()> {
        Ok(())
    }

    async fn presigned_put_url(&self, key: &str, expiry: Duration) -> Result<Url> {
        Url::parse(&format!(
            "http://storage.test/{}/{key}?X-Amz-Expires={}",
            self.bucket,
            expiry.as_secs()
        ))
        .map_err(|err| CatalogError::Internal(err.to_string()))
    }

    fn bucket(&self) -> &str {
        &self.bucket
    }
}

/// Polls `condition` until it returns true or `timeout` elapses.
pub async fn wait_until<F, Fut>(timeout: Duration, mut condition: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if condition().await {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
