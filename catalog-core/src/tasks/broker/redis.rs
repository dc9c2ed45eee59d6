use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::aio::ConnectionManager;
use std::fmt;
use std::time::Duration;
use tracing::{info, warn};

use super::{
    ClaimRequest, DEFAULT_DEAD_LETTER_LIMIT, HousekeepingReport, LeaseId, QueueDepth,
    TaskBroker, TaskLease, deadline, record_failure,
};
use crate::error::{CatalogError, Result};
use crate::tasks::task::{TaskKind, TaskMessage};

/// Upper bound on entries moved per housekeeping pass and per key.
const HOUSEKEEPING_BATCH: usize = 500;

/// Every key lives under the `{namespace}` hash tag so the scripts only ever
/// touch one cluster slot.
mod scripts {
    use redis::Script;

    /// KEYS: task, pending. ARGV: id, body.
    pub fn push() -> Script {
        Script::new(
            r#"
            redis.call('SET', KEYS[1], ARGV[2])
            redis.call('LPUSH', KEYS[2], ARGV[1])
            return 1
            "#,
        )
    }

    /// KEYS: leases, pending... ARGV: task prefix, lease prefix,
    /// expires_at_ms, lease token.
    pub fn claim() -> Script {
        Script::new(
            r#"
            for i = 2, #KEYS do
                while true do
                    local id = redis.call('RPOP', KEYS[i])
                    if not id then break end
                    local body = redis.call('GET', ARGV[1] .. id)
                    if body then
                        redis.call('ZADD', KEYS[1], ARGV[3], id)
                        redis.call('SET', ARGV[2] .. id, ARGV[4])
                        return {id, body}
                    end
                end
            end
            return false
            "#,
        )
    }

    /// KEYS: leases, lease, task. ARGV: id, lease token.
    pub fn ack() -> Script {
        Script::new(
            r#"
            if redis.call('GET', KEYS[2]) ~= ARGV[2] then
                return 0
            end
            redis.call('ZREM', KEYS[1], ARGV[1])
            redis.call('DEL', KEYS[2], KEYS[3])
            return 1
            "#,
        )
    }

    /// KEYS: leases, lease, task, scheduled. ARGV: id, lease token, due_ms, body.
    pub fn retry() -> Script {
        Script::new(
            r#"
            if redis.call('GET', KEYS[2]) ~= ARGV[2] then
                return 0
            end
            redis.call('ZREM', KEYS[1], ARGV[1])
            redis.call('DEL', KEYS[2])
            redis.call('SET', KEYS[3], ARGV[4])
            redis.call('ZADD', KEYS[4], ARGV[3], ARGV[1])
            return 1
            "#,
        )
    }

    /// KEYS: leases, lease, task, dead. ARGV: id, lease token, body, limit,
    /// task prefix.
    ///
    /// Entries pushed past `limit` are trimmed from the old end of the list
    /// and their task bodies deleted.
    pub fn dead_letter() -> Script {
        Script::new(
            r#"
            if redis.call('GET', KEYS[2]) ~= ARGV[2] then
                return 0
            end
            redis.call('ZREM', KEYS[1], ARGV[1])
            redis.call('DEL', KEYS[2])
            redis.call('SET', KEYS[3], ARGV[3])
            redis.call('LPUSH', KEYS[4], ARGV[1])
            local limit = tonumber(ARGV[4])
            while redis.call('LLEN', KEYS[4]) > limit do
                local evicted = redis.call('RPOP', KEYS[4])
                redis.call('DEL', ARGV[5] .. evicted)
            end
            return 1
            "#,
        )
    }

    /// KEYS: scheduled, leases, dead, pending... ARGV: task prefix, lease
    /// prefix, now_ms, batch, kinds... (one per pending key, same order).
    ///
    /// Due retries go to the back of their pending list; reclaimed leases go
    /// to the front so they are next in line. A body whose kind has no
    /// pending list is parked on the dead list.
    pub fn housekeep() -> Script {
        Script::new(
            r#"
            local pending = {}
            for i = 5, #ARGV do
                pending[ARGV[i]] = KEYS[i - 1]
            end
            local function requeue(id, push)
                local body = redis.call('GET', ARGV[1] .. id)
                if not body then return 0 end
                local key = pending[cjson.decode(body)['type']]
                if key then
                    redis.call(push, key, id)
                    return 1
                end
                redis.call('LPUSH', KEYS[3], id)
                return 0
            end
            local promoted = 0
            local due = redis.call('ZRANGEBYSCORE', KEYS[1], '-inf', ARGV[3], 'LIMIT', 0, ARGV[4])
            for _, id in ipairs(due) do
                redis.call('ZREM', KEYS[1], id)
                promoted = promoted + requeue(id, 'LPUSH')
            end
            local reclaimed = 0
            local expired = redis.call('ZRANGEBYSCORE', KEYS[2], '-inf', ARGV[3], 'LIMIT', 0, ARGV[4])
            for _, id in ipairs(expired) do
                redis.call('ZREM', KEYS[2], id)
                redis.call('DEL', ARGV[2] .. id)
                reclaimed = reclaimed + requeue(id, 'RPUSH')
            end
            return {promoted, reclaimed}
            "#,
        )
    }
}

/// Broker backed by Redis lists and sorted sets.
///
/// Every state transition runs as a single Lua script so a crash between
/// steps cannot lose or duplicate a task beyond what at-least-once allows.
#[derive(Clone)]
pub struct RedisBroker {
    conn: ConnectionManager,
    namespace: String,
    dead_letter_limit: usize,
}

impl fmt::Debug for RedisBroker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisBroker")
            .field("connection", &"ConnectionManager")
            .field("namespace", &self.namespace)
            .field("dead_letter_limit", &self.dead_letter_limit)
            .finish()
    }
}

impl RedisBroker {
    pub async fn new(redis_url: &str, namespace: impl Into<String>) -> Result<Self> {
        let namespace = namespace.into();
        info!(namespace = %namespace, "connecting task broker to redis");

        let client = redis::Client::open(redis_url).map_err(|e| {
            CatalogError::Broker(format!("failed to create redis client: {e}"))
        })?;
        let conn = ConnectionManager::new(client).await.map_err(|e| {
            CatalogError::Broker(format!("failed to connect to redis: {e}"))
        })?;

        Ok(Self {
            conn,
            namespace,
            dead_letter_limit: DEFAULT_DEAD_LETTER_LIMIT,
        })
    }

    pub fn with_dead_letter_limit(mut self, limit: usize) -> Self {
        self.dead_letter_limit = limit;
        self
    }

    fn key(&self, suffix: &str) -> String {
        namespaced(&self.namespace, suffix)
    }

    fn task_key(&self, id: &str) -> String {
        self.key(&format!("task:{id}"))
    }

    fn lease_key(&self, id: &str) -> String {
        self.key(&format!("lease:{id}"))
    }

    fn pending_key(&self, kind: TaskKind) -> String {
        self.key(&format!("pending:{}", kind.as_str()))
    }

    /// Releases the lease and parks `id` on the dead list with `body` as
    /// its stored envelope.
    async fn bury(&self, id: &str, lease_token: LeaseId, body: String) -> Result<bool> {
        let mut conn = self.conn.clone();
        let moved: i64 = scripts::dead_letter()
            .key(self.key("leases"))
            .key(self.lease_key(id))
            .key(self.task_key(id))
            .key(self.key("dead"))
            .arg(id)
            .arg(lease_token.to_string())
            .arg(body)
            .arg(self.dead_letter_limit)
            .arg(self.task_key(""))
            .invoke_async(&mut conn)
            .await?;
        Ok(moved == 1)
    }
}

/// `{namespace}:suffix`; the braces make the namespace the cluster hash tag.
fn namespaced(namespace: &str, suffix: &str) -> String {
    format!("{{{namespace}}}:{suffix}")
}

#[async_trait]
impl TaskBroker for RedisBroker {
    async fn push(&self, message: TaskMessage) -> Result<()> {
        let body = message.to_json()?;
        let mut conn = self.conn.clone();
        scripts::push()
            .key(self.task_key(&message.id.to_string()))
            .key(self.pending_key(message.kind))
            .arg(message.id.to_string())
            .arg(body)
            .invoke_async::<i64>(&mut conn)
            .await?;
        Ok(())
    }

    async fn claim(&self, request: &ClaimRequest) -> Result<Option<TaskLease>> {
        if request.kinds.is_empty() {
            return Ok(None);
        }
        let expires_at = deadline(Utc::now(), request.lease_ttl);
        let lease_token = LeaseId::new();

        let script = scripts::claim();
        let mut invocation = script.key(self.key("leases"));
        for kind in &request.kinds {
            invocation.key(self.pending_key(*kind));
        }
        invocation
            .arg(self.task_key(""))
            .arg(self.lease_key(""))
            .arg(expires_at.timestamp_millis())
            .arg(lease_token.to_string());

        let mut conn = self.conn.clone();
        let claimed: Option<(String, String)> =
            invocation.invoke_async(&mut conn).await?;
        let Some((id, body)) = claimed else {
            return Ok(None);
        };

        let message = match TaskMessage::from_json(&body) {
            Ok(message) => message,
            Err(err) => {
                // Undecodable envelopes can never be handled; park them.
                warn!(task_id = %id, error = %err, "dead-lettering undecodable task envelope");
                self.bury(&id, lease_token, body).await?;
                return Ok(None);
            }
        };

        Ok(Some(TaskLease {
            lease_id: lease_token,
            message,
            worker_id: request.worker_id.clone(),
            expires_at,
        }))
    }

    async fn ack(&self, lease: &TaskLease) -> Result<bool> {
        let mut conn = self.conn.clone();
        let id = lease.message.id.to_string();
        let acked: i64 = scripts::ack()
            .key(self.key("leases"))
            .key(self.lease_key(&id))
            .key(self.task_key(&id))
            .arg(&id)
            .arg(lease.lease_id.to_string())
            .invoke_async(&mut conn)
            .await?;
        Ok(acked == 1)
    }

    async fn retry(
        &self,
        lease: &TaskLease,
        delay: Duration,
        error: &str,
    ) -> Result<bool> {
        let updated = record_failure(&lease.message, error).to_json()?;
        let due = deadline(Utc::now(), delay);
        let id = lease.message.id.to_string();
        let mut conn = self.conn.clone();
        let moved: i64 = scripts::retry()
            .key(self.key("leases"))
            .key(self.lease_key(&id))
            .key(self.task_key(&id))
            .key(self.key("scheduled"))
            .arg(&id)
            .arg(lease.lease_id.to_string())
            .arg(due.timestamp_millis())
            .arg(updated)
            .invoke_async(&mut conn)
            .await?;
        Ok(moved == 1)
    }

    async fn dead_letter(&self, lease: &TaskLease, error: &str) -> Result<bool> {
        let updated = record_failure(&lease.message, error).to_json()?;
        self.bury(&lease.message.id.to_string(), lease.lease_id, updated)
            .await
    }

    async fn housekeep(&self, now: DateTime<Utc>) -> Result<HousekeepingReport> {
        let script = scripts::housekeep();
        let mut invocation = script.key(self.key("scheduled"));
        invocation.key(self.key("leases")).key(self.key("dead"));
        for kind in TaskKind::ALL {
            invocation.key(self.pending_key(kind));
        }
        invocation
            .arg(self.task_key(""))
            .arg(self.lease_key(""))
            .arg(now.timestamp_millis())
            .arg(HOUSEKEEPING_BATCH);
        for kind in TaskKind::ALL {
            invocation.arg(kind.as_str());
        }

        let mut conn = self.conn.clone();
        let (promoted, reclaimed): (usize, usize) =
            invocation.invoke_async(&mut conn).await?;
        Ok(HousekeepingReport {
            promoted,
            reclaimed,
        })
    }

    async fn depth(&self) -> Result<QueueDepth> {
        let mut pipe = redis::pipe();
        for kind in TaskKind::ALL {
            pipe.llen(self.pending_key(kind));
        }
        pipe.zcard(self.key("leases"))
            .zcard(self.key("scheduled"))
            .llen(self.key("dead"));

        let mut conn = self.conn.clone();
        let counts: Vec<usize> = pipe.query_async(&mut conn).await?;
        let kinds = TaskKind::ALL.len();
        if counts.len() != kinds + 3 {
            return Err(CatalogError::Broker(format!(
                "unexpected depth reply with {} entries",
                counts.len()
            )));
        }
        Ok(QueueDepth {
            pending: counts[..kinds].iter().sum(),
            active: counts[kinds],
            scheduled: counts[kinds + 1],
            dead: counts[kinds + 2],
        })
    }

    async fn dead_letters(&self, limit: usize) -> Result<Vec<TaskMessage>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let mut conn = self.conn.clone();
        let ids: Vec<String> = redis::cmd("LRANGE")
            .arg(self.key("dead"))
            .arg(0)
            .arg(limit as isize - 1)
            .query_async(&mut conn)
            .await?;
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let keys: Vec<String> = ids.iter().map(|id| self.task_key(id)).collect();
        let bodies: Vec<Option<String>> = redis::cmd("MGET")
            .arg(&keys)
            .query_async(&mut conn)
            .await?;

        Ok(bodies
            .into_iter()
            .flatten()
            .filter_map(|body| TaskMessage::from_json(&body).ok())
            .collect())
    }

    async fn ping(&self) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }
}
