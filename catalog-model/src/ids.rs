use crate::error::ModelError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

macro_rules! catalog_id {
    ($(#[$meta:meta])* $name:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash,
            Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl $name {
            pub fn new() -> Self {
                $name(Uuid::now_v7())
            }

            /// Parses the canonical hyphenated form, rejecting empty input.
            pub fn parse_str(raw: &str) -> Result<Self, ModelError> {
                let trimmed = raw.trim();
                Uuid::parse_str(trimmed).map($name).map_err(|_| {
                    ModelError::InvalidId {
                        kind: $kind,
                        value: raw.to_string(),
                    }
                })
            }

            pub fn as_str(&self) -> String {
                self.0.to_string()
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }

            pub fn to_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                $name(id)
            }
        }

        impl AsRef<Uuid> for $name {
            fn as_ref(&self) -> &Uuid {
                &self.0
            }
        }

        impl FromStr for $name {
            type Err = ModelError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse_str(s)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

catalog_id!(
    /// Strongly typed ID for a series.
    SeriesID,
    "series"
);
catalog_id!(
    /// Strongly typed ID for an episode.
    EpisodeID,
    "episode"
);
catalog_id!(
    /// Strongly typed ID for an episode asset.
    AssetID,
    "asset"
);
catalog_id!(
    /// Strongly typed ID for a category.
    CategoryID,
    "category"
);
