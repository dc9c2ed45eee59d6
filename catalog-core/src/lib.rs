//! # Catalog Core
//!
//! Background processing and search synchronization for a catalog of series,
//! episodes and categories.
//!
//! ## Overview
//!
//! - **Task queue**: typed payloads, a broker abstraction (Redis or in-memory),
//!   retry and dead-lettering, and a supervised worker pool
//! - **Search indexing**: document projections, index provisioning and the
//!   handlers that keep the search index in step with the store
//! - **Imports**: a registry of source importers and the task that persists
//!   what they fetch
//! - **Application services**: catalog writes with best-effort index
//!   enqueueing, and index-backed discovery
//!
//! ## Feature Flags
//!
//! - `database`: PostgreSQL store over SQLx (default)
//! - `redis-broker`: Redis-backed task broker (default)
//!
//! ## Architecture
//!
//! - [`tasks`]: producer queue, brokers, dispatcher and worker runtime
//! - [`search`]: search engine client and query building
//! - [`indexing`]: documents, mappings and index task handlers
//! - [`import`]: importers and the import task processor
//! - [`store`]: relational persistence
//! - [`storage`]: presigned object uploads
//! - [`application`]: services called by the API layer
//!
//! ## Example
//!
//! ```no_run
//! use catalog_core::{
//!     indexing::SearchIndexer,
//!     search::{IndexNames, InMemorySearchEngine},
//!     tasks::{InMemoryBroker, RetryPolicy, TaskDispatcher, WorkerRuntime, WorkerRuntimeConfig},
//! };
//! use std::sync::Arc;
//!
//! # async fn run() -> catalog_core::Result<()> {
//! let engine = Arc::new(InMemorySearchEngine::new());
//! let indexer = Arc::new(SearchIndexer::new(engine, IndexNames::new("catalog")));
//! let dispatcher = TaskDispatcher::new(indexer.routes(), RetryPolicy::default());
//!
//! let runtime = WorkerRuntime::new(
//!     WorkerRuntimeConfig::default(),
//!     Arc::new(InMemoryBroker::new()),
//!     dispatcher,
//! );
//! runtime.start().await?;
//! runtime.shutdown().await?;
//! # Ok(())
//! # }
//! ```

#![allow(missing_docs)]

pub mod application;
pub mod error;
pub mod import;
pub mod indexing;
pub mod pagination;
pub mod search;
pub mod storage;
pub mod store;
pub mod tasks;

pub use error::{CatalogError, Result};
