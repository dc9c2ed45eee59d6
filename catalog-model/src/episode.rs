use crate::error::ModelError;
use crate::ids::{AssetID, EpisodeID, SeriesID};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A persisted episode row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Episode {
    pub id: EpisodeID,
    pub series_id: SeriesID,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publish_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields supplied when creating or replacing an episode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpisodeDraft {
    pub series_id: SeriesID,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub duration_seconds: Option<i32>,
    #[serde(default)]
    pub publish_date: Option<DateTime<Utc>>,
}

impl EpisodeDraft {
    pub fn new(series_id: SeriesID, title: impl Into<String>) -> Self {
        Self {
            series_id,
            title: title.into(),
            description: None,
            duration_seconds: None,
            publish_date: None,
        }
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        let title_len = self.title.chars().count();
        if title_len == 0 || title_len > 255 {
            return Err(ModelError::Validation(
                "title must be between 1 and 255 characters".into(),
            ));
        }
        if matches!(self.duration_seconds, Some(d) if d < 0) {
            return Err(ModelError::Validation(
                "duration_seconds must not be negative".into(),
            ));
        }
        Ok(())
    }
}

/// Kind of media attached to an episode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetType {
    Audio,
    Video,
    Thumbnail,
}

impl AssetType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetType::Audio => "audio",
            AssetType::Video => "video",
            AssetType::Thumbnail => "thumbnail",
        }
    }
}

impl fmt::Display for AssetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AssetType {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "audio" => Ok(AssetType::Audio),
            "video" => Ok(AssetType::Video),
            "thumbnail" => Ok(AssetType::Thumbnail),
            other => Err(ModelError::InvalidEnum {
                kind: "asset type",
                value: other.to_string(),
            }),
        }
    }
}

/// A persisted media asset belonging to an episode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpisodeAsset {
    pub id: AssetID,
    pub episode_id: EpisodeID,
    pub asset_type: AssetType,
    pub mime_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// An episode together with its assets, oldest asset first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpisodeWithAssets {
    #[serde(flatten)]
    pub episode: Episode,
    #[serde(default)]
    pub assets: Vec<EpisodeAsset>,
}

/// Fields supplied when attaching an asset to an episode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetDraft {
    pub episode_id: EpisodeID,
    pub asset_type: AssetType,
    pub mime_type: String,
    #[serde(default)]
    pub size_bytes: Option<i64>,
    #[serde(default)]
    pub url: Option<String>,
}

impl AssetDraft {
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.mime_type.trim().is_empty() {
            return Err(ModelError::Validation("mime_type is required".into()));
        }
        if matches!(self.size_bytes, Some(s) if s < 0) {
            return Err(ModelError::Validation(
                "size_bytes must not be negative".into(),
            ));
        }
        Ok(())
    }
}
