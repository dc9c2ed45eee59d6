use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::fmt;
use std::time::Duration;
use tokio::sync::Mutex;

use super::{
    ClaimRequest, HousekeepingReport, LeaseId, QueueDepth, TaskBroker,
    TaskLease, DEFAULT_DEAD_LETTER_LIMIT, deadline, record_failure,
};
use crate::error::Result;
use crate::tasks::task::{TaskId, TaskKind, TaskMessage};

#[derive(Default)]
struct BrokerState {
    pending: HashMap<TaskKind, VecDeque<TaskId>>,
    messages: HashMap<TaskId, TaskMessage>,
    leases: HashMap<TaskId, (LeaseId, DateTime<Utc>)>,
    scheduled: BTreeSet<(DateTime<Utc>, TaskId)>,
    dead: VecDeque<TaskId>,
}

impl BrokerState {
    /// Releases the lease if `lease` still owns it.
    fn release(&mut self, lease: &TaskLease) -> bool {
        let id = lease.message.id;
        match self.leases.get(&id) {
            Some((lease_id, _)) if *lease_id == lease.lease_id => {
                self.leases.remove(&id);
                true
            }
            _ => false,
        }
    }
}

/// Process-local broker with the same delivery semantics as the Redis one.
///
/// Used by tests and by single-process development setups; nothing survives
/// a restart.
pub struct InMemoryBroker {
    state: Mutex<BrokerState>,
    dead_letter_limit: usize,
}

impl Default for InMemoryBroker {
    fn default() -> Self {
        Self {
            state: Mutex::default(),
            dead_letter_limit: DEFAULT_DEAD_LETTER_LIMIT,
        }
    }
}

impl fmt::Debug for InMemoryBroker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("InMemoryBroker");
        if let Ok(state) = self.state.try_lock() {
            debug
                .field("messages", &state.messages.len())
                .field("leased", &state.leases.len())
                .field("dead", &state.dead.len());
        }
        debug
            .field("dead_letter_limit", &self.dead_letter_limit)
            .finish()
    }
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dead_letter_limit(mut self, limit: usize) -> Self {
        self.dead_letter_limit = limit;
        self
    }

    /// Pending messages of one kind in claim order.
    pub async fn pending(&self, kind: TaskKind) -> Vec<TaskMessage> {
        let state = self.state.lock().await;
        state
            .pending
            .get(&kind)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| state.messages.get(id).cloned())
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[async_trait]
impl TaskBroker for InMemoryBroker {
    async fn push(&self, message: TaskMessage) -> Result<()> {
        let mut state = self.state.lock().await;
        state
            .pending
            .entry(message.kind)
            .or_default()
            .push_back(message.id);
        state.messages.insert(message.id, message);
        Ok(())
    }

    async fn claim(&self, request: &ClaimRequest) -> Result<Option<TaskLease>> {
        let mut state = self.state.lock().await;
        for kind in &request.kinds {
            while let Some(id) = state
                .pending
                .get_mut(kind)
                .and_then(|queue| queue.pop_front())
            {
                let Some(message) = state.messages.get(&id).cloned() else {
                    continue;
                };
                let lease = TaskLease::new(
                    message,
                    request.worker_id.clone(),
                    request.lease_ttl,
                );
                state.leases.insert(id, (lease.lease_id, lease.expires_at));
                return Ok(Some(lease));
            }
        }
        Ok(None)
    }

    async fn ack(&self, lease: &TaskLease) -> Result<bool> {
        let mut state = self.state.lock().await;
        if !state.release(lease) {
            return Ok(false);
        }
        state.messages.remove(&lease.message.id);
        Ok(true)
    }

    async fn retry(
        &self,
        lease: &TaskLease,
        delay: Duration,
        error: &str,
    ) -> Result<bool> {
        let mut state = self.state.lock().await;
        if !state.release(lease) {
            return Ok(false);
        }
        let id = lease.message.id;
        state.messages.insert(id, record_failure(&lease.message, error));
        state.scheduled.insert((deadline(Utc::now(), delay), id));
        Ok(true)
    }

    async fn dead_letter(&self, lease: &TaskLease, error: &str) -> Result<bool> {
        let mut state = self.state.lock().await;
        if !state.release(lease) {
            return Ok(false);
        }
        let id = lease.message.id;
        state.messages.insert(id, record_failure(&lease.message, error));
        state.dead.push_front(id);
        while state.dead.len() > self.dead_letter_limit {
            if let Some(evicted) = state.dead.pop_back() {
                state.messages.remove(&evicted);
            }
        }
        Ok(true)
    }

    async fn housekeep(&self, now: DateTime<Utc>) -> Result<HousekeepingReport> {
        let mut state = self.state.lock().await;
        let mut report = HousekeepingReport::default();

        let due: Vec<(DateTime<Utc>, TaskId)> = state
            .scheduled
            .iter()
            .take_while(|(at, _)| *at <= now)
            .copied()
            .collect();
        for entry in due {
            state.scheduled.remove(&entry);
            let Some(kind) = state.messages.get(&entry.1).map(|m| m.kind) else {
                continue;
            };
            state.pending.entry(kind).or_default().push_back(entry.1);
            report.promoted += 1;
        }

        let expired: Vec<TaskId> = state
            .leases
            .iter()
            .filter(|(_, (_, expires_at))| *expires_at <= now)
            .map(|(id, _)| *id)
            .collect();
        for id in expired {
            state.leases.remove(&id);
            let Some(kind) = state.messages.get(&id).map(|m| m.kind) else {
                continue;
            };
            state.pending.entry(kind).or_default().push_front(id);
            report.reclaimed += 1;
        }

        Ok(report)
    }

    async fn depth(&self) -> Result<QueueDepth> {
        let state = self.state.lock().await;
        Ok(QueueDepth {
            pending: state.pending.values().map(VecDeque::len).sum(),
            active: state.leases.len(),
            scheduled: state.scheduled.len(),
            dead: state.dead.len(),
        })
    }

    async fn dead_letters(&self, limit: usize) -> Result<Vec<TaskMessage>> {
        let state = self.state.lock().await;
        Ok(state
            .dead
            .iter()
            .take(limit)
            .filter_map(|id| state.messages.get(id).cloned())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::task::{DeleteSeriesPayload, TaskPayload};

    fn message(series_id: &str) -> TaskMessage {
        TaskMessage::new(&TaskPayload::DeleteSeries(DeleteSeriesPayload {
            series_id: series_id.into(),
        }))
        .unwrap()
    }

    fn claim_request(ttl: Duration) -> ClaimRequest {
        ClaimRequest {
            kinds: vec![TaskKind::DeleteSeries],
            worker_id: "w-1".into(),
            lease_ttl: ttl,
        }
    }

    #[tokio::test]
    async fn claims_in_fifo_order_and_only_requested_kinds() {
        let broker = InMemoryBroker::new();
        broker.push(message("a")).await.unwrap();
        broker.push(message("b")).await.unwrap();

        let other = ClaimRequest {
            kinds: vec![TaskKind::ImportContent],
            worker_id: "w-2".into(),
            lease_ttl: Duration::from_secs(30),
        };
        assert!(broker.claim(&other).await.unwrap().is_none());

        let first = broker
            .claim(&claim_request(Duration::from_secs(30)))
            .await
            .unwrap()
            .expect("first task");
        assert_eq!(first.message.payload, r#"{"series_id":"a"}"#);
        assert!(broker.ack(&first).await.unwrap());

        let depth = broker.depth().await.unwrap();
        assert_eq!(depth.pending, 1);
        assert_eq!(depth.active, 0);
    }

    #[tokio::test]
    async fn retry_waits_for_housekeeping_and_counts_attempts() {
        let broker = InMemoryBroker::new();
        broker.push(message("a")).await.unwrap();
        let request = claim_request(Duration::from_secs(30));

        let lease = broker.claim(&request).await.unwrap().unwrap();
        assert!(broker.retry(&lease, Duration::ZERO, "boom").await.unwrap());
        assert!(broker.claim(&request).await.unwrap().is_none());

        let report = broker.housekeep(Utc::now()).await.unwrap();
        assert_eq!(report.promoted, 1);

        let again = broker.claim(&request).await.unwrap().unwrap();
        assert_eq!(again.message.attempts, 1);
        assert_eq!(again.message.last_error.as_deref(), Some("boom"));
    }

    #[tokio::test]
    async fn expired_lease_is_redelivered_and_stale_ack_ignored() {
        let broker = InMemoryBroker::new();
        broker.push(message("a")).await.unwrap();
        let request = claim_request(Duration::from_millis(1));

        let stale = broker.claim(&request).await.unwrap().unwrap();
        let later = Utc::now() + chrono::Duration::seconds(1);
        let report = broker.housekeep(later).await.unwrap();
        assert_eq!(report.reclaimed, 1);

        let fresh = broker.claim(&request).await.unwrap().unwrap();
        assert_eq!(fresh.message.id, stale.message.id);
        assert_eq!(fresh.message.attempts, 0);
        assert!(!broker.ack(&stale).await.unwrap());
        assert!(broker.ack(&fresh).await.unwrap());
    }

    #[tokio::test]
    async fn dead_letters_are_listed_most_recent_first() {
        let broker = InMemoryBroker::new();
        let request = claim_request(Duration::from_secs(30));
        for id in ["a", "b"] {
            broker.push(message(id)).await.unwrap();
            let lease = broker.claim(&request).await.unwrap().unwrap();
            broker.dead_letter(&lease, "fatal").await.unwrap();
        }

        let dead = broker.dead_letters(10).await.unwrap();
        assert_eq!(dead.len(), 2);
        assert_eq!(dead[0].payload, r#"{"series_id":"b"}"#);
        assert_eq!(broker.depth().await.unwrap().dead, 2);
    }

    #[tokio::test]
    async fn dead_letter_list_is_capped_and_drops_the_oldest() {
        let cap = 3;
        let broker = InMemoryBroker::new().with_dead_letter_limit(cap);
        let request = claim_request(Duration::from_secs(30));
        let mut first_id = None;
        for n in 0..=cap {
            broker.push(message(&n.to_string())).await.unwrap();
            let lease = broker.claim(&request).await.unwrap().unwrap();
            first_id.get_or_insert(lease.message.id);
            assert!(broker.dead_letter(&lease, "fatal").await.unwrap());
        }

        let dead = broker.dead_letters(10).await.unwrap();
        assert_eq!(dead.len(), cap);
        assert_eq!(dead[0].payload, r#"{"series_id":"3"}"#);
        assert!(dead.iter().all(|m| m.payload != r#"{"series_id":"0"}"#));
        assert_eq!(broker.depth().await.unwrap().dead, cap);

        let first_id = first_id.unwrap();
        let state = broker.state.lock().await;
        assert!(!state.messages.contains_key(&first_id));
        assert_eq!(state.messages.len(), cap);
    }
}
