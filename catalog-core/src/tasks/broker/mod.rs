//! Durable task storage between producers and workers.
//!
//! A broker keeps one pending list per [`TaskKind`], a set of leased tasks
//! ordered by lease expiry, a schedule of delayed retries and a dead-letter
//! list. Delivery is at-least-once: a lease that expires before the worker
//! acknowledges it is handed out again.

mod memory;
#[cfg(feature = "redis-broker")]
mod redis;

pub use memory::InMemoryBroker;
#[cfg(feature = "redis-broker")]
pub use redis::RedisBroker;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

use super::task::{TaskKind, TaskMessage};
use crate::error::Result;

/// Dead letters kept before the oldest ones are discarded.
pub const DEFAULT_DEAD_LETTER_LIMIT: usize = 1000;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct LeaseId(pub Uuid);

impl Default for LeaseId {
    fn default() -> Self {
        Self::new()
    }
}

impl LeaseId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl fmt::Display for LeaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lease metadata returned when a worker claims a task.
#[derive(Clone, Debug)]
pub struct TaskLease {
    pub lease_id: LeaseId,
    pub message: TaskMessage,
    pub worker_id: String,
    pub expires_at: DateTime<Utc>,
}

impl TaskLease {
    pub fn new(message: TaskMessage, worker_id: String, ttl: Duration) -> Self {
        Self {
            lease_id: LeaseId::new(),
            expires_at: deadline(Utc::now(), ttl),
            worker_id,
            message,
        }
    }
}

/// Request to claim the next task of any of the given kinds. Kinds are
/// tried in order.
#[derive(Clone, Debug)]
pub struct ClaimRequest {
    pub kinds: Vec<TaskKind>,
    pub worker_id: String,
    pub lease_ttl: Duration,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HousekeepingReport {
    /// Delayed retries moved back to their pending list.
    pub promoted: usize,
    /// Expired leases returned to their pending list.
    pub reclaimed: usize,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct QueueDepth {
    pub pending: usize,
    pub active: usize,
    pub scheduled: usize,
    pub dead: usize,
}

#[async_trait]
pub trait TaskBroker: Send + Sync + fmt::Debug {
    /// Stores a new task at the tail of its kind's pending list.
    async fn push(&self, message: TaskMessage) -> Result<()>;

    /// Leases the oldest pending task among `request.kinds`.
    async fn claim(&self, request: &ClaimRequest) -> Result<Option<TaskLease>>;

    /// Removes a successfully processed task. A lease that has already
    /// expired and been reclaimed is ignored and reported as `false`.
    async fn ack(&self, lease: &TaskLease) -> Result<bool>;

    /// Schedules the task for another attempt after `delay`, recording the
    /// error and incrementing its attempt counter.
    async fn retry(
        &self,
        lease: &TaskLease,
        delay: Duration,
        error: &str,
    ) -> Result<bool>;

    /// Moves the task to the dead-letter list. Once the list is over its
    /// limit the oldest entries are dropped together with their payloads.
    async fn dead_letter(&self, lease: &TaskLease, error: &str) -> Result<bool>;

    /// Promotes due retries and reclaims expired leases.
    async fn housekeep(&self, now: DateTime<Utc>) -> Result<HousekeepingReport>;

    async fn depth(&self) -> Result<QueueDepth>;

    /// Dead-lettered messages, most recent first.
    async fn dead_letters(&self, limit: usize) -> Result<Vec<TaskMessage>>;

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

/// `now + delay`, saturating at the latest representable instant.
pub(crate) fn deadline(now: DateTime<Utc>, delay: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(delay)
        .ok()
        .and_then(|delta| now.checked_add_signed(delta))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Copy of `message` with one more failed attempt and the latest error.
pub(crate) fn record_failure(message: &TaskMessage, error: &str) -> TaskMessage {
    let mut next = message.clone();
    next.attempts = next.attempts.saturating_add(1);
    next.last_error = Some(error.to_string());
    next
}
