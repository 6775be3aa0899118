use crate::config::AppSettings;
use crate::db::repositories::{IndexingLogRepository, UrlRepository};
use crate::error::CoreResult;
use crate::models::{LogStatus, Method, UrlStatus};
use crate::services::adapters::{self, AdapterOutcome, google_api::ServiceAccountKey};
use crate::services::credentials_pool::CredentialsPool;
use crate::services::method_queue::{JobQueue, QueueJob};
use log::{error, info, warn};
use std::sync::Arc;

const MAX_ATTEMPT: u32 = 2;
const BACKOFF_BASE_SECS: i64 = 300;
const BACKOFF_CAP_SECS: i64 = 3600;
const RATE_LIMITED_REQUEUE_SECS: i64 = 30;
const LOCK_CONTENDED_REQUEUE_SECS: i64 = 15;
const BATCH_SIZE: usize = 50;

/// Exponential backoff, capped, keyed on the attempt that just failed.
fn backoff_delay_secs(attempt: u32) -> i64 {
    (BACKOFF_BASE_SECS * (1i64 << attempt)).min(BACKOFF_CAP_SECS)
}

/// Drains due jobs from the method queue and runs each through its adapter.
/// One tick processes up to `BATCH_SIZE` jobs; the cron scheduler calls
/// `tick` every two minutes.
pub struct QueueWorker {
    queue: Arc<dyn JobQueue>,
    urls: UrlRepository,
    logs: IndexingLogRepository,
    credentials: CredentialsPool,
    http: reqwest::Client,
    settings: Arc<AppSettings>,
}

impl QueueWorker {
    pub fn new(
        queue: Arc<dyn JobQueue>,
        urls: UrlRepository,
        logs: IndexingLogRepository,
        credentials: CredentialsPool,
        http: reqwest::Client,
        settings: Arc<AppSettings>,
    ) -> Self {
        Self {
            queue,
            urls,
            logs,
            credentials,
            http,
            settings,
        }
    }

    pub async fn tick(&self) -> CoreResult<usize> {
        let jobs = self.queue.pop_eligible(BATCH_SIZE).await?;
        let mut processed = 0;
        for job in jobs {
            self.process_job(job).await;
            processed += 1;
        }
        Ok(processed)
    }

    async fn process_job(&self, job: QueueJob) {
        if !self.queue.try_rate(job.method).await.unwrap_or(true) {
            let _ = self.queue.requeue_after(job.clone(), RATE_LIMITED_REQUEUE_SECS).await;
            return;
        }

        let locked = match self.queue.try_lock_url(job.url_id).await {
            Ok(v) => v,
            Err(e) => {
                error!("failed to acquire url lock for {}: {}", job.url_id, e);
                let _ = self.queue.requeue_after(job.clone(), LOCK_CONTENDED_REQUEUE_SECS).await;
                return;
            }
        };
        if !locked {
            let _ = self.queue.requeue_after(job.clone(), LOCK_CONTENDED_REQUEUE_SECS).await;
            return;
        }

        self.run_locked(job).await;
    }

    async fn run_locked(&self, job: QueueJob) {
        let url = match self.urls.get(&job.url_id).await {
            Ok(Some(u)) => u,
            Ok(None) => {
                info!("dropping job for url {} (no longer exists)", job.url_id);
                let _ = self.queue.unlock_url(job.url_id).await;
                return;
            }
            Err(e) => {
                error!("failed to load url {}: {}", job.url_id, e);
                let _ = self.queue.unlock_url(job.url_id).await;
                return;
            }
        };

        if url.is_indexed {
            let _ = self.queue.unlock_url(job.url_id).await;
            return;
        }

        let outcome = self.run_adapter(&job, &url.text).await;
        if let Err(e) = self.apply_outcome(&job, &outcome).await {
            error!("failed to persist outcome for url {} method {}: {}", job.url_id, job.method, e);
        }

        if !outcome.success && job.attempt < MAX_ATTEMPT {
            let delay = backoff_delay_secs(job.attempt);
            if let Err(e) = self.queue.requeue_after(job.retry(), delay).await {
                error!("failed to requeue job for url {}: {}", job.url_id, e);
            }
        }

        let _ = self.queue.unlock_url(job.url_id).await;
    }

    async fn run_adapter(&self, job: &QueueJob, url_text: &str) -> AdapterOutcome {
        let result = match job.method {
            Method::IndexNow => {
                if let Some(cfg) = &job.indexnow_config {
                    adapters::indexnow::submit_with(&self.http, url_text, &cfg.host, &cfg.key, &cfg.key_location).await
                } else {
                    let host = url::Url::parse(url_text)
                        .ok()
                        .and_then(|u| u.host_str().map(str::to_string));
                    match host {
                        Some(host) => adapters::indexnow::submit(&self.http, url_text, &host, &self.settings.indexnow).await,
                        None => Err(crate::error::CoreError::Validation(format!("cannot parse host from {}", url_text))),
                    }
                }
            }
            Method::Pingomatic => adapters::pingomatic::ping(&self.http, url_text).await,
            Method::WebSub => adapters::websub::ping(&self.http, url_text).await,
            Method::ArchiveOrg => adapters::archive_org::save(&self.http, url_text).await,
            Method::Backlink => adapters::backlink::ping(&self.http, url_text).await,
            Method::GoogleApi => self.run_google_api(url_text).await,
        };

        match result {
            Ok(outcome) => outcome,
            Err(e) => AdapterOutcome::failure(e.to_string()),
        }
    }

    async fn run_google_api(&self, url_text: &str) -> CoreResult<AdapterOutcome> {
        let Some(credential) = self.credentials.next_available().await? else {
            return Ok(AdapterOutcome::failure("no google credential with remaining quota"));
        };

        let key: ServiceAccountKey = match serde_json::from_value(credential.key_material.clone()) {
            Ok(k) => k,
            Err(e) => return Ok(AdapterOutcome::failure(format!("malformed credential key: {}", e))),
        };

        let outcome = adapters::google_api::submit(&self.http, url_text, &key).await?;
        if let Err(e) = self.credentials.increment_usage(&credential.id, 1).await {
            warn!("failed to increment usage for credential {}: {}", credential.id, e);
        }
        if !outcome.success && matches!(outcome.status_code, Some(401) | Some(403) | Some(429)) {
            if let Err(e) = self.credentials.disable_for_quota(&credential.id).await {
                warn!("failed to disable credential {}: {}", credential.id, e);
            }
        }
        Ok(outcome)
    }

    async fn apply_outcome(&self, job: &QueueJob, outcome: &AdapterOutcome) -> CoreResult<()> {
        let mut tx = self.urls.get_pool().begin().await?;

        self.logs
            .insert_with_executor(
                &job.url_id,
                job.method.as_str(),
                if outcome.success { LogStatus::Success } else { LogStatus::Error },
                outcome.status_code.map(|c| c as i32),
                Some(&outcome.detail),
                None,
                &mut tx,
            )
            .await?;

        self.urls
            .record_method_attempt(&job.url_id, job.method, &outcome.detail, &mut tx)
            .await?;

        let url = self.urls.get_for_update(&job.url_id, &mut tx).await?;
        if let Some(url) = url {
            if url.status == UrlStatus::Submitted {
                self.urls.set_status(&job.url_id, UrlStatus::Indexing, &mut tx).await?;
            } else if job.method == Method::GoogleApi && outcome.success && url.status == UrlStatus::Indexing {
                self.urls.set_status(&job.url_id, UrlStatus::Verifying, &mut tx).await?;
            }
        }

        tx.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_per_attempt_until_capped() {
        assert_eq!(backoff_delay_secs(0), 300);
        assert_eq!(backoff_delay_secs(1), 600);
        assert_eq!(backoff_delay_secs(2), 1200);
        assert_eq!(backoff_delay_secs(10), BACKOFF_CAP_SECS);
    }
}
