//! Core data model definitions shared across catalog crates.
#![allow(missing_docs)]

pub mod category;
pub mod episode;
pub mod error;
pub mod ids;
pub mod import;
pub mod series;

pub use category::{Category, CategoryDraft, slugify};
pub use episode::{
    AssetDraft, AssetType, Episode, EpisodeAsset, EpisodeDraft, EpisodeWithAssets,
};
pub use error::{ModelError, Result as ModelResult};
pub use ids::{AssetID, CategoryID, EpisodeID, SeriesID};
pub use import::{ImportRequest, SourceType, ValidImportRequest};
pub use series::{Series, SeriesDraft, SeriesType};
