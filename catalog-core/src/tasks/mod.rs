//! Background task plumbing: envelopes, brokers, the producer-side queue and
//! the worker runtime that drains it.

pub mod broker;
pub mod dispatcher;
pub mod queue;
pub mod retry;
pub mod runtime;
pub mod task;

pub use broker::{
    ClaimRequest, HousekeepingReport, InMemoryBroker, LeaseId, QueueDepth,
    TaskBroker, TaskLease,
};
#[cfg(feature = "redis-broker")]
pub use broker::RedisBroker;
pub use dispatcher::{DispatchStatus, TaskDispatcher, TaskHandler, TaskRouter};
pub use queue::{BestEffort, TaskQueue};
pub use retry::{RetryDelayFn, RetryPolicy};
pub use runtime::{Provisioner, WorkerRuntime, WorkerRuntimeConfig};
pub use task::{
    DeleteEpisodePayload, DeleteSeriesPayload, ImportContentPayload,
    IndexEpisodePayload, IndexSeriesPayload, TaskHandle, TaskId, TaskKind,
    TaskMessage, TaskPayload,
};
