//! Projection of catalog entities into the search index.

mod documents;
mod handlers;
mod mappings;
mod provision;

pub use documents::{AssetDocument, EpisodeDocument, SeriesDocument};
pub use handlers::SearchIndexer;
pub use mappings::{episode_mapping, series_mapping};
pub use provision::IndexProvisioner;
