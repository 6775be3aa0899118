use crate::error::{CoreError, CoreResult};
use crate::models::Method;
use async_trait::async_trait;
use chrono::Utc;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

const QUEUE_KEY: &str = "indexation:method_queue";
const LOCK_TTL_SECS: u64 = 120;

/// Per-request IndexNow override carried on a job, in lieu of the global
/// `IndexNowConfig` in `AppSettings`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IndexNowJobConfig {
    pub host: String,
    pub key: String,
    pub key_location: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QueueJob {
    /// Unique per enqueue so retries of the same (url, method) don't collide
    /// as sorted-set members.
    pub job_id: Uuid,
    pub url_id: Uuid,
    pub project_id: Uuid,
    pub method: Method,
    pub attempt: u32,
    pub indexnow_config: Option<IndexNowJobConfig>,
}

impl QueueJob {
    pub fn new(url_id: Uuid, project_id: Uuid, method: Method, indexnow_config: Option<IndexNowJobConfig>) -> Self {
        Self {
            job_id: Uuid::new_v4(),
            url_id,
            project_id,
            method,
            attempt: 0,
            indexnow_config,
        }
    }

    pub fn retry(&self) -> Self {
        Self {
            job_id: Uuid::new_v4(),
            attempt: self.attempt + 1,
            ..self.clone()
        }
    }
}

/// The priority-time job queue plus its coordination primitives
/// (per-method rate limiting, per-URL advisory locking). One trait so the
/// scheduler and workers can run against an in-memory fake in tests.
#[async_trait]
pub trait JobQueue: Send + Sync {
    async fn enqueue_at(&self, job: QueueJob, due_at_unix: i64) -> CoreResult<()>;
    async fn pop_eligible(&self, batch_size: usize) -> CoreResult<Vec<QueueJob>>;
    async fn requeue_after(&self, job: QueueJob, delay_secs: i64) -> CoreResult<()>;
    async fn size(&self) -> CoreResult<u64>;
    async fn try_rate(&self, method: Method) -> CoreResult<bool>;
    async fn try_lock_url(&self, url_id: Uuid) -> CoreResult<bool>;
    async fn unlock_url(&self, url_id: Uuid) -> CoreResult<()>;
}

/// Enqueues all six method jobs for a freshly submitted URL, each with its
/// method-specific initial delay from `Method::initial_delay_secs`.
pub async fn enqueue_submission(
    queue: &dyn JobQueue,
    url_id: Uuid,
    project_id: Uuid,
    indexnow_config: Option<IndexNowJobConfig>,
) -> CoreResult<()> {
    let now = Utc::now().timestamp();
    for method in Method::ALL {
        let job = QueueJob::new(url_id, project_id, method, indexnow_config.clone());
        queue.enqueue_at(job, now + method.initial_delay_secs()).await?;
    }
    Ok(())
}

#[derive(Clone)]
pub struct RedisJobQueue {
    conn: ConnectionManager,
}

impl RedisJobQueue {
    pub async fn connect(redis_url: &str) -> CoreResult<Self> {
        let client = redis::Client::open(redis_url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self { conn })
    }

    fn rate_key(method: Method) -> String {
        format!("indexation:rate:{}", method.as_str())
    }

    fn lock_key(url_id: Uuid) -> String {
        format!("indexation:lock:{}", url_id)
    }
}

#[async_trait]
impl JobQueue for RedisJobQueue {
    async fn enqueue_at(&self, job: QueueJob, due_at_unix: i64) -> CoreResult<()> {
        let mut conn = self.conn.clone();
        let payload = serde_json::to_string(&job)
            .map_err(|e| CoreError::Internal(format!("failed to serialize job: {}", e)))?;
        let _: () = conn.zadd(QUEUE_KEY, payload, due_at_unix).await?;
        Ok(())
    }

    /// Atomic pop: a single Lua script reads the due members and removes
    /// them in one round trip, so two concurrent workers never both receive
    /// the same job.
    async fn pop_eligible(&self, batch_size: usize) -> CoreResult<Vec<QueueJob>> {
        let mut conn = self.conn.clone();
        let now = Utc::now().timestamp();

        let script = redis::Script::new(
            r#"
            local members = redis.call('ZRANGEBYSCORE', KEYS[1], '-inf', ARGV[1], 'LIMIT', 0, ARGV[2])
            if #members > 0 then
                redis.call('ZREM', KEYS[1], unpack(members))
            end
            return members
            "#,
        );

        let members: Vec<String> = script
            .key(QUEUE_KEY)
            .arg(now)
            .arg(batch_size)
            .invoke_async(&mut conn)
            .await?;

        Ok(members
            .into_iter()
            .filter_map(|m| serde_json::from_str(&m).ok())
            .collect())
    }

    async fn requeue_after(&self, job: QueueJob, delay_secs: i64) -> CoreResult<()> {
        self.enqueue_at(job, Utc::now().timestamp() + delay_secs).await
    }

    async fn size(&self) -> CoreResult<u64> {
        let mut conn = self.conn.clone();
        let n: u64 = conn.zcard(QUEUE_KEY).await?;
        Ok(n)
    }

    /// Fixed-window rate limit via INCR + conditional EXPIRE, the same
    /// pattern the HTTP-facing rate limiter uses against Redis.
    async fn try_rate(&self, method: Method) -> CoreResult<bool> {
        let Some((limit, window_secs)) = method.rate_limit() else {
            return Ok(true);
        };
        let mut conn = self.conn.clone();
        let key = Self::rate_key(method);
        let count: i64 = conn.incr(&key, 1).await?;
        if count == 1 {
            let _: () = conn.expire(&key, window_secs as i64).await?;
        }
        Ok(count <= limit as i64)
    }

    /// Advisory lock via SET NX EX; this is a burst-collision optimization,
    /// not a safety invariant, so a TTL expiring mid-call is harmless.
    async fn try_lock_url(&self, url_id: Uuid) -> CoreResult<bool> {
        let mut conn = self.conn.clone();
        let key = Self::lock_key(url_id);
        let acquired: bool = redis::cmd("SET")
            .arg(&key)
            .arg(1)
            .arg("NX")
            .arg("EX")
            .arg(LOCK_TTL_SECS)
            .query_async::<Option<String>>(&mut conn)
            .await
            .map(|v| v.is_some())?;
        Ok(acquired)
    }

    async fn unlock_url(&self, url_id: Uuid) -> CoreResult<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.del(Self::lock_key(url_id)).await?;
        Ok(())
    }
}

/// In-process fake backing the same trait, for tests that exercise the
/// worker tick and scheduler without a Redis instance.
#[derive(Default)]
pub struct InMemoryJobQueue {
    jobs: Mutex<Vec<(i64, QueueJob)>>,
    rate_counts: Mutex<HashMap<&'static str, u32>>,
    locks: Mutex<HashMap<Uuid, ()>>,
}

impl InMemoryJobQueue {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobQueue for InMemoryJobQueue {
    async fn enqueue_at(&self, job: QueueJob, due_at_unix: i64) -> CoreResult<()> {
        self.jobs.lock().unwrap().push((due_at_unix, job));
        Ok(())
    }

    async fn pop_eligible(&self, batch_size: usize) -> CoreResult<Vec<QueueJob>> {
        let now = Utc::now().timestamp();
        let mut jobs = self.jobs.lock().unwrap();
        let mut due_indices: Vec<usize> = jobs
            .iter()
            .enumerate()
            .filter(|(_, (due, _))| *due <= now)
            .map(|(i, _)| i)
            .collect();
        due_indices.truncate(batch_size);

        let mut popped = Vec::new();
        for &i in due_indices.iter().rev() {
            popped.push(jobs.remove(i).1);
        }
        popped.reverse();
        Ok(popped)
    }

    async fn requeue_after(&self, job: QueueJob, delay_secs: i64) -> CoreResult<()> {
        self.enqueue_at(job, Utc::now().timestamp() + delay_secs).await
    }

    async fn size(&self) -> CoreResult<u64> {
        Ok(self.jobs.lock().unwrap().len() as u64)
    }

    async fn try_rate(&self, method: Method) -> CoreResult<bool> {
        let Some((limit, _window)) = method.rate_limit() else {
            return Ok(true);
        };
        let mut counts = self.rate_counts.lock().unwrap();
        let count = counts.entry(method.as_str()).or_insert(0);
        *count += 1;
        Ok(*count <= limit)
    }

    async fn try_lock_url(&self, url_id: Uuid) -> CoreResult<bool> {
        let mut locks = self.locks.lock().unwrap();
        if locks.contains_key(&url_id) {
            Ok(false)
        } else {
            locks.insert(url_id, ());
            Ok(true)
        }
    }

    async fn unlock_url(&self, url_id: Uuid) -> CoreResult<()> {
        self.locks.lock().unwrap().remove(&url_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn pop_eligible_respects_due_time() {
        let queue = InMemoryJobQueue::new();
        let job = QueueJob::new(Uuid::new_v4(), Uuid::new_v4(), Method::GoogleApi, None);
        queue.enqueue_at(job.clone(), Utc::now().timestamp() + 1800).await.unwrap();

        let popped = queue.pop_eligible(10).await.unwrap();
        assert!(popped.is_empty(), "job due in the future must not be popped early");
    }

    #[tokio::test]
    async fn pop_eligible_returns_due_jobs_once() {
        let queue = InMemoryJobQueue::new();
        let job = QueueJob::new(Uuid::new_v4(), Uuid::new_v4(), Method::IndexNow, None);
        queue.enqueue_at(job.clone(), Utc::now().timestamp() - 1).await.unwrap();

        let popped = queue.pop_eligible(10).await.unwrap();
        assert_eq!(popped.len(), 1);
        assert_eq!(popped[0].job_id, job.job_id);

        let popped_again = queue.pop_eligible(10).await.unwrap();
        assert!(popped_again.is_empty());
    }

    #[tokio::test]
    async fn rate_limit_caps_calls_per_window() {
        let queue = InMemoryJobQueue::new();
        let mut allowed = 0;
        for _ in 0..120 {
            if queue.try_rate(Method::IndexNow).await.unwrap() {
                allowed += 1;
            }
        }
        assert_eq!(allowed, 100, "indexnow is limited to 100 calls per window");
    }

    #[tokio::test]
    async fn url_lock_is_exclusive_until_released() {
        let queue = InMemoryJobQueue::new();
        let url_id = Uuid::new_v4();
        assert!(queue.try_lock_url(url_id).await.unwrap());
        assert!(!queue.try_lock_url(url_id).await.unwrap());
        queue.unlock_url(url_id).await.unwrap();
        assert!(queue.try_lock_url(url_id).await.unwrap());
    }
}
