use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::retry::RetryPolicy;
use super::task::{TaskKind, TaskMessage, TaskPayload};
use crate::error::Result;

/// Outcome of dispatcher execution for a single task.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum DispatchStatus {
    Success,
    Retry { error: String, delay: Duration },
    DeadLetter { error: String },
}

/// Executes one decoded task. Implementations must be idempotent: the broker
/// may deliver the same task more than once.
#[async_trait]
pub trait TaskHandler: Send + Sync {
    async fn handle(&self, payload: TaskPayload) -> Result<()>;
}

/// Explicit `TaskKind -> handler` table. A worker only claims the kinds it
/// has handlers for.
#[derive(Clone, Default)]
pub struct TaskRouter {
    handlers: HashMap<TaskKind, Arc<dyn TaskHandler>>,
}

impl fmt::Debug for TaskRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskRouter")
            .field("kinds", &self.kinds())
            .finish()
    }
}

impl TaskRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for `kind`, replacing any previous handler.
    pub fn register(&mut self, kind: TaskKind, handler: Arc<dyn TaskHandler>) {
        self.handlers.insert(kind, handler);
    }

    pub fn with(mut self, kind: TaskKind, handler: Arc<dyn TaskHandler>) -> Self {
        self.register(kind, handler);
        self
    }

    /// Merges every route of `other` into this router.
    pub fn merge(mut self, other: TaskRouter) -> Self {
        self.handlers.extend(other.handlers);
        self
    }

    pub fn route(&self, kind: TaskKind) -> Option<Arc<dyn TaskHandler>> {
        self.handlers.get(&kind).cloned()
    }

    /// Routed kinds in their canonical order.
    pub fn kinds(&self) -> Vec<TaskKind> {
        TaskKind::ALL
            .into_iter()
            .filter(|kind| self.handlers.contains_key(kind))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

/// Decodes leased messages, runs the routed handler and classifies the
/// result against the retry policy.
#[derive(Clone, Debug)]
pub struct TaskDispatcher {
    router: TaskRouter,
    policy: RetryPolicy,
}

impl TaskDispatcher {
    pub fn new(router: TaskRouter, policy: RetryPolicy) -> Self {
        Self { router, policy }
    }

    pub fn router(&self) -> &TaskRouter {
        &self.router
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub async fn dispatch(&self, message: &TaskMessage) -> DispatchStatus {
        let payload = match message.decode() {
            Ok(payload) => payload,
            Err(err) => {
                return DispatchStatus::DeadLetter {
                    error: err.context(message.kind.as_str()).to_string(),
                };
            }
        };

        let Some(handler) = self.router.route(message.kind) else {
            return DispatchStatus::DeadLetter {
                error: format!("no handler registered for {}", message.kind),
            };
        };

        let subject = payload.subject();
        debug!(task_id = %message.id, kind = %message.kind, subject = %subject, attempt = message.attempts + 1, "dispatching task");

        match handler.handle(payload).await {
            Ok(()) => DispatchStatus::Success,
            Err(err) => {
                let err = err.context(format!("{} {subject}", message.kind));
                if !err.is_retryable() || !self.policy.allows_retry(message.attempts) {
                    DispatchStatus::DeadLetter {
                        error: err.to_string(),
                    }
                } else {
                    DispatchStatus::Retry {
                        error: err.to_string(),
                        delay: self.policy.delay_for(message.attempts + 1),
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CatalogError;
    use crate::tasks::task::DeleteSeriesPayload;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Flaky {
        calls: AtomicUsize,
        error: fn() -> CatalogError,
    }

    #[async_trait]
    impl TaskHandler for Flaky {
        async fn handle(&self, _payload: TaskPayload) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err((self.error)())
        }
    }

    fn delete_series() -> TaskMessage {
        TaskMessage::new(&TaskPayload::DeleteSeries(DeleteSeriesPayload {
            series_id: "s-1".into(),
        }))
        .unwrap()
    }

    fn dispatcher(error: fn() -> CatalogError, max_retry: u32) -> TaskDispatcher {
        let handler = Arc::new(Flaky {
            calls: AtomicUsize::new(0),
            error,
        });
        TaskDispatcher::new(
            TaskRouter::new().with(TaskKind::DeleteSeries, handler),
            RetryPolicy::fixed(max_retry, Duration::from_secs(5)),
        )
    }

    #[tokio::test]
    async fn transient_error_retries_until_ceiling() {
        let dispatcher = dispatcher(|| CatalogError::Search("unavailable".into()), 2);
        let mut message = delete_series();

        let status = dispatcher.dispatch(&message).await;
        assert_eq!(
            status,
            DispatchStatus::Retry {
                error: "search:delete_series s-1: Search error: unavailable".into(),
                delay: Duration::from_secs(5),
            }
        );

        message.attempts = 2;
        assert!(matches!(
            dispatcher.dispatch(&message).await,
            DispatchStatus::DeadLetter { .. }
        ));
    }

    #[tokio::test]
    async fn permanent_error_is_dead_lettered_immediately() {
        let dispatcher =
            dispatcher(|| CatalogError::UnsupportedSource("vimeo".into()), 5);
        let status = dispatcher.dispatch(&delete_series()).await;
        assert!(matches!(status, DispatchStatus::DeadLetter { .. }));
    }

    #[tokio::test]
    async fn unrouted_and_malformed_messages_are_dead_lettered() {
        let dispatcher = TaskDispatcher::new(TaskRouter::new(), RetryPolicy::default());
        assert!(matches!(
            dispatcher.dispatch(&delete_series()).await,
            DispatchStatus::DeadLetter { .. }
        ));

        let mut garbled = delete_series();
        garbled.payload = "{".into();
        let status = dispatcher.dispatch(&garbled).await;
        let DispatchStatus::DeadLetter { error } = status else {
            panic!("expected dead letter, got {status:?}");
        };
        assert!(error.starts_with("search:delete_series: Invalid task payload"));
    }

    #[test]
    fn router_lists_kinds_in_canonical_order() {
        let handler: Arc<dyn TaskHandler> = Arc::new(Flaky {
            calls: AtomicUsize::new(0),
            error: || CatalogError::Internal("unused".into()),
        });
        let router = TaskRouter::new()
            .with(TaskKind::ImportContent, Arc::clone(&handler))
            .with(TaskKind::IndexSeries, handler);
        assert_eq!(
            router.kinds(),
            vec![TaskKind::IndexSeries, TaskKind::ImportContent]
        );
    }
}
