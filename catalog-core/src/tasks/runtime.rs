use async_trait::async_trait;
use catalog_config::QueueConfig;
use chrono::Utc;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use super::broker::{ClaimRequest, TaskBroker, TaskLease};
use super::dispatcher::{DispatchStatus, TaskDispatcher};
use super::task::TaskKind;
use crate::error::{CatalogError, Result};

/// Pause after a broker error before the worker tries to claim again.
const CLAIM_ERROR_BACKOFF: Duration = Duration::from_millis(250);

/// One-time setup that must succeed before any task is claimed.
#[async_trait]
pub trait Provisioner: Send + Sync + fmt::Debug {
    async fn provision(&self) -> Result<()>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WorkerRuntimeConfig {
    pub concurrency: usize,
    pub lease_ttl: Duration,
    pub poll_interval: Duration,
    pub housekeeping_interval: Duration,
    pub shutdown_timeout: Duration,
}

impl Default for WorkerRuntimeConfig {
    fn default() -> Self {
        Self::from(&QueueConfig::default())
    }
}

impl From<&QueueConfig> for WorkerRuntimeConfig {
    fn from(config: &QueueConfig) -> Self {
        Self {
            concurrency: config.concurrency.max(1),
            lease_ttl: config.lease_ttl,
            poll_interval: config.poll_interval,
            housekeeping_interval: config.housekeeping_interval,
            shutdown_timeout: config.shutdown_timeout,
        }
    }
}

/// Supervises the worker pool and the housekeeping loop inside a single
/// process.
pub struct WorkerRuntime {
    config: WorkerRuntimeConfig,
    broker: Arc<dyn TaskBroker>,
    dispatcher: Arc<TaskDispatcher>,
    provisioners: Vec<Arc<dyn Provisioner>>,
    shutdown_token: CancellationToken,
    worker_handles: Mutex<Vec<JoinHandle<()>>>,
    started: AtomicBool,
}

impl fmt::Debug for WorkerRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let worker_handle_count = self
            .worker_handles
            .try_lock()
            .map(|handles| handles.len())
            .unwrap_or_default();

        f.debug_struct("WorkerRuntime")
            .field("config", &self.config)
            .field("broker", &self.broker)
            .field("kinds", &self.dispatcher.router().kinds())
            .field("provisioners", &self.provisioners.len())
            .field("worker_handle_count", &worker_handle_count)
            .field("started", &self.started.load(Ordering::Relaxed))
            .field("shutdown_cancelled", &self.shutdown_token.is_cancelled())
            .finish()
    }
}

impl WorkerRuntime {
    pub fn new(
        config: WorkerRuntimeConfig,
        broker: Arc<dyn TaskBroker>,
        dispatcher: TaskDispatcher,
    ) -> Self {
        Self {
            config,
            broker,
            dispatcher: Arc::new(dispatcher),
            provisioners: Vec::new(),
            shutdown_token: CancellationToken::new(),
            worker_handles: Mutex::new(Vec::new()),
            started: AtomicBool::new(false),
        }
    }

    pub fn with_provisioner(mut self, provisioner: Arc<dyn Provisioner>) -> Self {
        self.provisioners.push(provisioner);
        self
    }

    pub fn config(&self) -> &WorkerRuntimeConfig {
        &self.config
    }

    /// Token that stops the pool when cancelled. Cancelling it directly
    /// skips the grace period; prefer [`WorkerRuntime::shutdown`].
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }

    /// Runs provisioning, then spawns the workers and the housekeeper.
    /// A runtime starts at most once; a failed provisioning run may be
    /// retried.
    pub async fn start(&self) -> Result<()> {
        let kinds = self.dispatcher.router().kinds();
        if kinds.is_empty() {
            return Err(CatalogError::InvalidInput(
                "worker runtime started without any task handlers".into(),
            ));
        }
        if self
            .started
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(CatalogError::InvalidInput(
                "worker runtime is already started".into(),
            ));
        }

        for provisioner in &self.provisioners {
            if let Err(err) = provisioner.provision().await {
                error!(provisioner = ?provisioner, error = %err, "provisioning failed");
                self.started.store(false, Ordering::Release);
                return Err(err.context("provisioning failed"));
            }
        }

        let kind_names: Vec<&str> = kinds.iter().map(|kind| kind.as_str()).collect();
        info!(
            concurrency = self.config.concurrency,
            kinds = ?kind_names,
            "starting task workers"
        );

        let mut handles = self.worker_handles.lock().await;
        handles.push(self.spawn_housekeeper());

        let worker_group = format!("worker-{}", std::process::id());
        for i in 0..self.config.concurrency {
            let mut kinds = kinds.clone();
            // Stagger the claim order so no kind is always tried last.
            let len = kinds.len();
            kinds.rotate_left(i % len);
            let worker = Worker {
                id: format!("{worker_group}-w{i}"),
                kinds,
                config: self.config,
                broker: Arc::clone(&self.broker),
                dispatcher: Arc::clone(&self.dispatcher),
                shutdown: self.shutdown_token.clone(),
            };
            handles.push(tokio::spawn(worker.run()));
        }

        Ok(())
    }

    fn spawn_housekeeper(&self) -> JoinHandle<()> {
        let broker = Arc::clone(&self.broker);
        let interval = self.config.housekeeping_interval;
        let shutdown = self.shutdown_token.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        debug!("housekeeper shutting down");
                        break;
                    }
                    _ = tokio::time::sleep(interval) => {
                        match broker.housekeep(Utc::now()).await {
                            Ok(report) if report.promoted > 0 || report.reclaimed > 0 => {
                                debug!(
                                    promoted = report.promoted,
                                    reclaimed = report.reclaimed,
                                    "housekeeping moved tasks back to pending"
                                );
                            }
                            Ok(_) => {}
                            Err(err) => warn!(error = %err, "housekeeping pass failed"),
                        }
                    }
                }
            }
        })
    }

    /// Stops claiming and waits up to the configured grace period for
    /// in-flight tasks. Workers still running after that are aborted; their
    /// leases expire and the tasks are redelivered.
    pub async fn shutdown(&self) -> Result<()> {
        info!("initiating graceful shutdown of task workers");
        self.shutdown_token.cancel();

        let handles = {
            let mut guard = self.worker_handles.lock().await;
            std::mem::take(&mut *guard)
        };

        let deadline = tokio::time::Instant::now() + self.config.shutdown_timeout;
        let mut timed_out = 0usize;
        for mut handle in handles {
            match tokio::time::timeout_at(deadline, &mut handle).await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => warn!(error = %err, "worker task failed"),
                Err(_) => {
                    handle.abort();
                    timed_out += 1;
                }
            }
        }

        if timed_out > 0 {
            warn!(
                workers = timed_out,
                "workers did not finish within the shutdown grace period"
            );
        }
        info!("task workers stopped");
        Ok(())
    }
}

struct Worker {
    id: String,
    kinds: Vec<TaskKind>,
    config: WorkerRuntimeConfig,
    broker: Arc<dyn TaskBroker>,
    dispatcher: Arc<TaskDispatcher>,
    shutdown: CancellationToken,
}

impl Worker {
    async fn run(self) {
        loop {
            if self.shutdown.is_cancelled() {
                debug!(worker = %self.id, "worker shutting down");
                break;
            }

            let request = ClaimRequest {
                kinds: self.kinds.clone(),
                worker_id: self.id.clone(),
                lease_ttl: self.config.lease_ttl,
            };

            match self.broker.claim(&request).await {
                Ok(Some(lease)) => self.process(lease).await,
                Ok(None) => {
                    trace!(worker = %self.id, "no task ready");
                    self.idle(self.config.poll_interval).await;
                }
                Err(err) => {
                    error!(worker = %self.id, error = %err, "failed to claim task");
                    self.idle(CLAIM_ERROR_BACKOFF).await;
                }
            }
        }
    }

    async fn idle(&self, period: Duration) {
        tokio::select! {
            _ = self.shutdown.cancelled() => {}
            _ = tokio::time::sleep(period) => {}
        }
    }

    async fn process(&self, lease: TaskLease) {
        let message = &lease.message;
        let attempt = message.attempts + 1;

        match self.dispatcher.dispatch(message).await {
            DispatchStatus::Success => match self.broker.ack(&lease).await {
                Ok(true) => {
                    debug!(task_id = %message.id, kind = %message.kind, attempt, "task completed");
                }
                Ok(false) => {
                    warn!(
                        task_id = %message.id,
                        kind = %message.kind,
                        "task completed after its lease expired; it may run again"
                    );
                }
                Err(err) => {
                    error!(task_id = %message.id, kind = %message.kind, error = %err, "failed to acknowledge task");
                }
            },
            DispatchStatus::Retry { error, delay } => {
                warn!(
                    task_id = %message.id,
                    kind = %message.kind,
                    attempt,
                    retry_in = ?delay,
                    error = %error,
                    "task failed; scheduling retry"
                );
                if let Err(err) = self.broker.retry(&lease, delay, &error).await {
                    error!(task_id = %message.id, kind = %message.kind, error = %err, "failed to schedule retry");
                }
            }
            DispatchStatus::DeadLetter { error } => {
                error!(
                    task_id = %message.id,
                    kind = %message.kind,
                    attempt,
                    error = %error,
                    "task dead-lettered"
                );
                if let Err(err) = self.broker.dead_letter(&lease, &error).await {
                    error!(task_id = %message.id, kind = %message.kind, error = %err, "failed to dead-letter task");
                }
            }
        }
    }
}
