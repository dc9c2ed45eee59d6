use catalog_model::{Episode, EpisodeAsset, Series};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SeriesDocument {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub category_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(rename = "type")]
    pub series_type: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Filled in by `into_json`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub indexed_at: Option<DateTime<Utc>>,
}

impl From<&Series> for SeriesDocument {
    fn from(series: &Series) -> Self {
        Self {
            id: series.id.to_string(),
            title: series.title.clone(),
            description: series.description.clone(),
            category_id: series.category_id.to_string(),
            language: series.language.clone(),
            series_type: series.series_type.as_str().to_string(),
            created_at: series.created_at,
            updated_at: series.updated_at,
            indexed_at: None,
        }
    }
}

impl SeriesDocument {
    /// JSON body stamped with the current time as `indexed_at`.
    pub fn into_json(mut self) -> Result<Value> {
        self.indexed_at = Some(Utc::now());
        Ok(serde_json::to_value(self)?)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AssetDocument {
    pub id: String,
    pub asset_type: String,
    pub mime_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl From<&EpisodeAsset> for AssetDocument {
    fn from(asset: &EpisodeAsset) -> Self {
        Self {
            id: asset.id.to_string(),
            asset_type: asset.asset_type.as_str().to_string(),
            mime_type: asset.mime_type.clone(),
            size_bytes: asset.size_bytes,
            url: asset.url.clone(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EpisodeDocument {
    pub id: String,
    pub series_id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publish_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub indexed_at: Option<DateTime<Utc>>,
    pub assets: Vec<AssetDocument>,
}

impl EpisodeDocument {
    pub fn new(episode: &Episode, assets: &[EpisodeAsset]) -> Self {
        Self {
            id: episode.id.to_string(),
            series_id: episode.series_id.to_string(),
            title: episode.title.clone(),
            description: episode.description.clone(),
            duration_seconds: episode.duration_seconds,
            publish_date: episode.publish_date,
            created_at: episode.created_at,
            updated_at: episode.updated_at,
            indexed_at: None,
            assets: assets.iter().map(AssetDocument::from).collect(),
        }
    }

    /// JSON body stamped with the current time as `indexed_at`.
    pub fn into_json(mut self) -> Result<Value> {
        self.indexed_at = Some(Utc::now());
        Ok(serde_json::to_value(self)?)
    }
}
