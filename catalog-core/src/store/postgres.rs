use async_trait::async_trait;
use catalog_config::DatabaseConfig;
use catalog_model::{
    AssetDraft, AssetID, Category, CategoryDraft, CategoryID, Episode,
    EpisodeAsset, EpisodeDraft, EpisodeID, EpisodeWithAssets, Series, SeriesDraft,
    SeriesID,
};
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info};
use uuid::Uuid;

use super::Store;
use crate::error::{CatalogError, Result};

const SERIES_COLUMNS: &str =
    "id, title, description, category_id, language, series_type, created_at, updated_at";
const EPISODE_COLUMNS: &str = "id, series_id, title, description, duration_seconds, publish_date, created_at, updated_at";
const ASSET_COLUMNS: &str =
    "id, episode_id, asset_type, mime_type, size_bytes, url, created_at";
const CATEGORY_COLUMNS: &str = "id, name, slug, created_at, updated_at";

const FOREIGN_KEY_VIOLATION: &str = "23503";

/// [`Store`] over a Postgres connection pool.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl fmt::Debug for PostgresStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostgresStore")
            .field("pool_size", &self.pool.size())
            .field("idle", &self.pool.num_idle())
            .finish()
    }
}

fn column<'r, T>(row: &'r PgRow, name: &str) -> Result<T>
where
    T: sqlx::Decode<'r, sqlx::Postgres> + sqlx::Type<sqlx::Postgres>,
{
    row.try_get(name)
        .map_err(|e| CatalogError::Internal(format!("Failed to read {name}: {e}")))
}

fn enum_column<T>(row: &PgRow, name: &str) -> Result<T>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    let raw: String = column(row, name)?;
    raw.parse()
        .map_err(|e| CatalogError::Internal(format!("Invalid {name} {raw:?}: {e}")))
}

fn to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn to_count(value: i64) -> u64 {
    u64::try_from(value).unwrap_or_default()
}

fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .and_then(|db| db.code())
        .is_some_and(|code| code == FOREIGN_KEY_VIOLATION)
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let url = config.url.as_deref().ok_or_else(|| {
            CatalogError::InvalidInput("DATABASE_URL is required".into())
        })?;
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(url)
            .await?;
        info!(max_connections = config.max_connections, "connected to postgres");
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Applies the embedded schema migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| CatalogError::Internal(format!("Migration failed: {e}")))?;
        debug!("database migrations applied");
        Ok(())
    }

    fn map_series(row: &PgRow) -> Result<Series> {
        Ok(Series {
            id: SeriesID::from(column::<Uuid>(row, "id")?),
            title: column(row, "title")?,
            description: column(row, "description")?,
            category_id: CategoryID::from(column::<Uuid>(row, "category_id")?),
            language: column(row, "language")?,
            series_type: enum_column(row, "series_type")?,
            created_at: column(row, "created_at")?,
            updated_at: column(row, "updated_at")?,
        })
    }

    fn map_episode(row: &PgRow) -> Result<Episode> {
        Ok(Episode {
            id: EpisodeID::from(column::<Uuid>(row, "id")?),
            series_id: SeriesID::from(column::<Uuid>(row, "series_id")?),
            title: column(row, "title")?,
            description: column(row, "description")?,
            duration_seconds: column(row, "duration_seconds")?,
            publish_date: column::<Option<DateTime<Utc>>>(row, "publish_date")?,
            created_at: column(row, "created_at")?,
            updated_at: column(row, "updated_at")?,
        })
    }

    fn map_asset(row: &PgRow) -> Result<EpisodeAsset> {
        Ok(EpisodeAsset {
            id: AssetID::from(column::<Uuid>(row, "id")?),
            episode_id: EpisodeID::from(column::<Uuid>(row, "episode_id")?),
            asset_type: enum_column(row, "asset_type")?,
            mime_type: column(row, "mime_type")?,
            size_bytes: column(row, "size_bytes")?,
            url: column(row, "url")?,
            created_at: column(row, "created_at")?,
        })
    }

    fn map_category(row: &PgRow) -> Result<Category> {
        Ok(Category {
            id: CategoryID::from(column::<Uuid>(row, "id")?),
            name: column(row, "name")?,
            slug: column(row, "slug")?,
            created_at: column(row, "created_at")?,
            updated_at: column(row, "updated_at")?,
        })
    }
}

#[async_trait]
impl Store for PostgresStore {
    async fn get_series(&self, id: SeriesID) -> Result<Series> {
        let row = sqlx::query(&format!("SELECT {SERIES_COLUMNS} FROM series WHERE id = $1"))
            .bind(id.to_uuid())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| CatalogError::NotFound(format!("series {id}")))?;
        Self::map_series(&row)
    }

    async fn create_series(&self, draft: &SeriesDraft) -> Result<Series> {
        let row = sqlx::query(&format!(
            "INSERT INTO series (id, title, description, category_id, language, series_type) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {SERIES_COLUMNS}"
        ))
        .bind(SeriesID::new().to_uuid())
        .bind(&draft.title)
        .bind(&draft.description)
        .bind(draft.category_id.to_uuid())
        .bind(&draft.language)
        .bind(draft.series_type.as_str())
        .fetch_one(&self.pool)
        .await?;
        Self::map_series(&row)
    }

    async fn update_series(&self, id: SeriesID, draft: &SeriesDraft) -> Result<Series> {
        let row = sqlx::query(&format!(
            "UPDATE series SET title = $2, description = $3, category_id = $4, language = $5, \
             series_type = $6, updated_at = NOW() WHERE id = $1 RETURNING {SERIES_COLUMNS}"
        ))
        .bind(id.to_uuid())
        .bind(&draft.title)
        .bind(&draft.description)
        .bind(draft.category_id.to_uuid())
        .bind(&draft.language)
        .bind(draft.series_type.as_str())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| CatalogError::NotFound(format!("series {id}")))?;
        Self::map_series(&row)
    }

    async fn delete_series(&self, id: SeriesID) -> Result<()> {
        let result = sqlx::query("DELETE FROM series WHERE id = $1")
            .bind(id.to_uuid())
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(CatalogError::NotFound(format!("series {id}")));
        }
        Ok(())
    }

    async fn count_series(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM series")
            .fetch_one(&self.pool)
            .await?;
        Ok(to_count(count))
    }

    async fn list_series(&self, limit: u32, offset: u64) -> Result<Vec<Series>> {
        let rows = sqlx::query(&format!(
            "SELECT {SERIES_COLUMNS} FROM series ORDER BY created_at DESC, id LIMIT $1 OFFSET $2"
        ))
        .bind(i64::from(limit))
        .bind(to_i64(offset))
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(Self::map_series).collect()
    }

    async fn get_episode(&self, id: EpisodeID) -> Result<Episode> {
        let row = sqlx::query(&format!("SELECT {EPISODE_COLUMNS} FROM episodes WHERE id = $1"))
            .bind(id.to_uuid())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| CatalogError::NotFound(format!("episode {id}")))?;
        Self::map_episode(&row)
    }

    async fn create_episode(&self, draft: &EpisodeDraft) -> Result<Episode> {
        let row = sqlx::query(&format!(
            "INSERT INTO episodes (id, series_id, title, description, duration_seconds, publish_date) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {EPISODE_COLUMNS}"
        ))
        .bind(EpisodeID::new().to_uuid())
        .bind(draft.series_id.to_uuid())
        .bind(&draft.title)
        .bind(&draft.description)
        .bind(draft.duration_seconds)
        .bind(draft.publish_date)
        .fetch_one(&self.pool)
        .await?;
        Self::map_episode(&row)
    }

    async fn update_episode(&self, id: EpisodeID, draft: &EpisodeDraft) -> Result<Episode> {
        let row = sqlx::query(&format!(
            "UPDATE episodes SET series_id = $2, title = $3, description = $4, \
             duration_seconds = $5, publish_date = $6, updated_at = NOW() \
             WHERE id = $1 RETURNING {EPISODE_COLUMNS}"
        ))
        .bind(id.to_uuid())
        .bind(draft.series_id.to_uuid())
        .bind(&draft.title)
        .bind(&draft.description)
        .bind(draft.duration_seconds)
        .bind(draft.publish_date)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| CatalogError::NotFound(format!("episode {id}")))?;
        Self::map_episode(&row)
    }

    async fn delete_episode(&self, id: EpisodeID) -> Result<()> {
        let result = sqlx::query("DELETE FROM episodes WHERE id = $1")
            .bind(id.to_uuid())
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(CatalogError::NotFound(format!("episode {id}")));
        }
        Ok(())
    }

    async fn count_episodes_by_series(&self, series_id: SeriesID) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM episodes WHERE series_id = $1")
            .bind(series_id.to_uuid())
            .fetch_one(&self.pool)
            .await?;
        Ok(to_count(count))
    }

    async fn list_episodes_with_assets_by_series(
        &self,
        series_id: SeriesID,
        limit: u32,
        offset: u64,
    ) -> Result<Vec<EpisodeWithAssets>> {
        let rows = sqlx::query(&format!(
            "SELECT {EPISODE_COLUMNS} FROM episodes WHERE series_id = $1 \
             ORDER BY created_at DESC, id LIMIT $2 OFFSET $3"
        ))
        .bind(series_id.to_uuid())
        .bind(i64::from(limit))
        .bind(to_i64(offset))
        .fetch_all(&self.pool)
        .await?;
        let episodes = rows
            .iter()
            .map(Self::map_episode)
            .collect::<Result<Vec<_>>>()?;
        if episodes.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<Uuid> = episodes.iter().map(|episode| episode.id.to_uuid()).collect();
        let asset_rows = sqlx::query(&format!(
            "SELECT {ASSET_COLUMNS} FROM episode_assets WHERE episode_id = ANY($1) \
             ORDER BY created_at, id"
        ))
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let mut assets: HashMap<EpisodeID, Vec<EpisodeAsset>> = HashMap::new();
        for row in &asset_rows {
            let asset = Self::map_asset(row)?;
            assets.entry(asset.episode_id).or_default().push(asset);
        }

        Ok(episodes
            .into_iter()
            .map(|episode| EpisodeWithAssets {
                assets: assets.remove(&episode.id).unwrap_or_default(),
                episode,
            })
            .collect())
    }

    async fn list_assets(&self, episode_id: EpisodeID) -> Result<Vec<EpisodeAsset>> {
        let rows = sqlx::query(&format!(
            "SELECT {ASSET_COLUMNS} FROM episode_assets WHERE episode_id = $1 ORDER BY created_at, id"
        ))
        .bind(episode_id.to_uuid())
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(Self::map_asset).collect()
    }

    async fn create_asset(&self, draft: &AssetDraft) -> Result<EpisodeAsset> {
        let row = sqlx::query(&format!(
            "INSERT INTO episode_assets (id, episode_id, asset_type, mime_type, size_bytes, url) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {ASSET_COLUMNS}"
        ))
        .bind(AssetID::new().to_uuid())
        .bind(draft.episode_id.to_uuid())
        .bind(draft.asset_type.as_str())
        .bind(&draft.mime_type)
        .bind(draft.size_bytes)
        .bind(&draft.url)
        .fetch_one(&self.pool)
        .await?;
        Self::map_asset(&row)
    }

    async fn get_category(&self, id: CategoryID) -> Result<Category> {
        let row = sqlx::query(&format!("SELECT {CATEGORY_COLUMNS} FROM categories WHERE id = $1"))
            .bind(id.to_uuid())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| CatalogError::NotFound(format!("category {id}")))?;
        Self::map_category(&row)
    }

    async fn create_category(&self, draft: &CategoryDraft) -> Result<Category> {
        let row = sqlx::query(&format!(
            "INSERT INTO categories (id, name, slug) VALUES ($1, $2, $3) \
             RETURNING {CATEGORY_COLUMNS}"
        ))
        .bind(CategoryID::new().to_uuid())
        .bind(&draft.name)
        .bind(draft.slug())
        .fetch_one(&self.pool)
        .await?;
        Self::map_category(&row)
    }

    async fn update_category(&self, id: CategoryID, draft: &CategoryDraft) -> Result<Category> {
        let row = sqlx::query(&format!(
            "UPDATE categories SET name = $2, slug = $3, updated_at = NOW() \
             WHERE id = $1 RETURNING {CATEGORY_COLUMNS}"
        ))
        .bind(id.to_uuid())
        .bind(&draft.name)
        .bind(draft.slug())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| CatalogError::NotFound(format!("category {id}")))?;
        Self::map_category(&row)
    }

    async fn delete_category(&self, id: CategoryID) -> Result<()> {
        let result = sqlx::query("DELETE FROM categories WHERE id = $1")
            .bind(id.to_uuid())
            .execute(&self.pool)
            .await
            .map_err(|err| {
                if is_foreign_key_violation(&err) {
                    CatalogError::InvalidInput(format!("category {id} is still in use"))
                } else {
                    CatalogError::from(err)
                }
            })?;
        if result.rows_affected() == 0 {
            return Err(CatalogError::NotFound(format!("category {id}")));
        }
        Ok(())
    }

    async fn count_categories(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM categories")
            .fetch_one(&self.pool)
            .await?;
        Ok(to_count(count))
    }

    async fn list_categories(&self, limit: u32, offset: u64) -> Result<Vec<Category>> {
        let rows = sqlx::query(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM categories ORDER BY name, id LIMIT $1 OFFSET $2"
        ))
        .bind(i64::from(limit))
        .bind(to_i64(offset))
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(Self::map_category).collect()
    }
}
