use crate::error::ModelError;
use crate::ids::{CategoryID, SeriesID};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Editorial format of a series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeriesType {
    Documentary,
    Podcast,
}

impl SeriesType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SeriesType::Documentary => "documentary",
            SeriesType::Podcast => "podcast",
        }
    }
}

impl fmt::Display for SeriesType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SeriesType {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "documentary" => Ok(SeriesType::Documentary),
            "podcast" => Ok(SeriesType::Podcast),
            other => Err(ModelError::InvalidEnum {
                kind: "series type",
                value: other.to_string(),
            }),
        }
    }
}

/// A persisted series row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series {
    pub id: SeriesID,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub category_id: CategoryID,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(rename = "type")]
    pub series_type: SeriesType,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields supplied when creating or replacing a series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesDraft {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub category_id: CategoryID,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(rename = "type")]
    pub series_type: SeriesType,
}

impl SeriesDraft {
    pub fn validate(&self) -> Result<(), ModelError> {
        let title_len = self.title.chars().count();
        if title_len == 0 || title_len > 255 {
            return Err(ModelError::Validation(
                "title must be between 1 and 255 characters".into(),
            ));
        }
        if let Some(description) = &self.description
            && description.chars().count() > 1000
        {
            return Err(ModelError::Validation(
                "description must be at most 1000 characters".into(),
            ));
        }
        if let Some(language) = &self.language {
            let len = language.chars().count();
            if !(2..=10).contains(&len) {
                return Err(ModelError::Validation(
                    "language must be between 2 and 10 characters".into(),
                ));
            }
        }
        Ok(())
    }
}
