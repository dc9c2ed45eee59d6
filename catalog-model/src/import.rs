use crate::error::ModelError;
use crate::ids::SeriesID;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// External platforms an import request may name.
///
/// Accepting a source here does not imply an importer exists for it; the
/// importer registry decides that when the task runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    Youtube,
    Spotify,
    Rss,
    Vimeo,
}

impl SourceType {
    pub const ALL: [SourceType; 4] = [
        SourceType::Youtube,
        SourceType::Spotify,
        SourceType::Rss,
        SourceType::Vimeo,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::Youtube => "youtube",
            SourceType::Spotify => "spotify",
            SourceType::Rss => "rss",
            SourceType::Vimeo => "vimeo",
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceType {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SourceType::ALL
            .into_iter()
            .find(|candidate| candidate.as_str() == s)
            .ok_or_else(|| ModelError::InvalidEnum {
                kind: "source type",
                value: s.to_string(),
            })
    }
}

/// Inbound request to pull an episode from an external source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportRequest {
    pub source_type: String,
    pub source_url: String,
    pub series_id: String,
}

/// An [`ImportRequest`] whose fields have been checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidImportRequest {
    pub source_type: SourceType,
    pub source_url: String,
    pub series_id: SeriesID,
}

impl ImportRequest {
    pub fn validate(&self) -> Result<ValidImportRequest, ModelError> {
        let source_type = self.source_type.parse::<SourceType>()?;
        if self.source_url.trim().is_empty() {
            return Err(ModelError::Validation("source_url is required".into()));
        }
        let series_id = SeriesID::parse_str(&self.series_id)?;
        Ok(ValidImportRequest {
            source_type,
            source_url: self.source_url.clone(),
            series_id,
        })
    }
}
