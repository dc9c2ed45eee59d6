//! Shared configuration library for the catalog workers.
//!
//! Configuration is layered: a `.env` file (via `dotenvy`), the process
//! environment and an optional `catalog.toml`. Environment values win over
//! file values, which win over built-in defaults.
#![allow(missing_docs)]

pub mod loader;
pub mod models;
pub mod validation;

pub use loader::{
    ConfigLoad, ConfigLoader, ConfigLoaderOptions, error::ConfigLoadError,
};
pub use models::{
    BackoffKind, Config, ConfigMetadata, DatabaseConfig, QueueConfig,
    RedisConfig, SearchConfig, StorageConfig,
};
pub use validation::{ConfigWarning, ConfigWarnings};
