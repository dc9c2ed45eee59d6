//! Entry points the API layer calls: writes that keep the search index in
//! step, and index-backed reads.

mod catalog;
mod discovery;

pub use catalog::{CatalogService, UploadConfirmation, UploadUrl, WriteOutcome};
pub use discovery::{DiscoveryService, EpisodeFilters, SearchResults, SeriesFilters};
