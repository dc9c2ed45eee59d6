//! Relational store owning canonical catalog state.

#[cfg(feature = "database")]
mod postgres;

#[cfg(feature = "database")]
pub use postgres::PostgresStore;

use async_trait::async_trait;
use catalog_model::{
    AssetDraft, Category, CategoryDraft, CategoryID, Episode, EpisodeAsset, EpisodeDraft,
    EpisodeID, EpisodeWithAssets, Series, SeriesDraft, SeriesID,
};
use std::fmt;

use crate::error::Result;

/// Entity persistence. Lookups, updates and deletes of a missing row fail
/// with [`CatalogError::NotFound`](crate::error::CatalogError::NotFound).
#[async_trait]
pub trait Store: Send + Sync + fmt::Debug {
    async fn get_series(&self, id: SeriesID) -> Result<Series>;
    async fn create_series(&self, draft: &SeriesDraft) -> Result<Series>;
    async fn update_series(&self, id: SeriesID, draft: &SeriesDraft) -> Result<Series>;
    async fn delete_series(&self, id: SeriesID) -> Result<()>;
    async fn count_series(&self) -> Result<u64>;
    /// Newest first.
    async fn list_series(&self, limit: u32, offset: u64) -> Result<Vec<Series>>;

    async fn get_episode(&self, id: EpisodeID) -> Result<Episode>;
    /// Persists a new episode under a store-assigned id.
    async fn create_episode(&self, draft: &EpisodeDraft) -> Result<Episode>;
    async fn update_episode(&self, id: EpisodeID, draft: &EpisodeDraft) -> Result<Episode>;
    async fn delete_episode(&self, id: EpisodeID) -> Result<()>;
    async fn count_episodes_by_series(&self, series_id: SeriesID) -> Result<u64>;
    /// Episodes of one series, newest first, each with its assets.
    async fn list_episodes_with_assets_by_series(
        &self,
        series_id: SeriesID,
        limit: u32,
        offset: u64,
    ) -> Result<Vec<EpisodeWithAssets>>;

    async fn list_assets(&self, episode_id: EpisodeID) -> Result<Vec<EpisodeAsset>>;
    async fn create_asset(&self, draft: &AssetDraft) -> Result<EpisodeAsset>;

    async fn get_category(&self, id: CategoryID) -> Result<Category>;
    async fn create_category(&self, draft: &CategoryDraft) -> Result<Category>;
    /// Renames the category and regenerates its slug.
    async fn update_category(&self, id: CategoryID, draft: &CategoryDraft) -> Result<Category>;
    /// Fails with `InvalidInput` while a series still references the category.
    async fn delete_category(&self, id: CategoryID) -> Result<()>;
    async fn count_categories(&self) -> Result<u64>;
    /// Alphabetical by name.
    async fn list_categories(&self, limit: u32, offset: u64) -> Result<Vec<Category>>;
}
