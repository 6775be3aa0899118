use crate::config::AppSettings;
use crate::db::repositories::{CredentialRepository, ProjectRepository, UrlRepository};
use crate::error::CoreResult;
use crate::models::{IndexedUrl, UrlStatus};
use crate::services::dispatcher::build_checker_for_project;
use crate::services::notifier::{IndexedNotification, Notifier};
use crate::services::probes::PropertyCache;
use chrono::Duration;
use log::{error, info, warn};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// One of the five tiered sweeps; each fires on its own cron schedule and
/// differs only in which submission-age window and staleness floor it scans.
#[derive(Debug, Clone, Copy)]
pub struct VerificationTier {
    pub name: &'static str,
    pub min_age: Duration,
    pub max_age: Duration,
    pub min_stale: Duration,
    pub limit: i64,
}

impl VerificationTier {
    pub const FRESH: VerificationTier = VerificationTier {
        name: "fresh",
        min_age: Duration::zero(),
        max_age: Duration::hours(6),
        min_stale: Duration::minutes(50),
        limit: 100,
    };
    pub const RECENT: VerificationTier = VerificationTier {
        name: "recent",
        min_age: Duration::zero(),
        max_age: Duration::hours(24),
        min_stale: Duration::zero(),
        limit: 500,
    };
    pub const AGING: VerificationTier = VerificationTier {
        name: "aging",
        min_age: Duration::days(1),
        max_age: Duration::days(3),
        min_stale: Duration::zero(),
        limit: 500,
    };
    pub const STALE: VerificationTier = VerificationTier {
        name: "stale",
        min_age: Duration::days(3),
        max_age: Duration::days(7),
        min_stale: Duration::zero(),
        limit: 500,
    };
    pub const FINAL: VerificationTier = VerificationTier {
        name: "final",
        min_age: Duration::days(7),
        max_age: Duration::days(10),
        min_stale: Duration::zero(),
        limit: 500,
    };
}

pub struct VerificationScheduler {
    urls: UrlRepository,
    projects: ProjectRepository,
    credentials: CredentialRepository,
    notifier: Arc<dyn Notifier>,
    http: reqwest::Client,
    settings: Arc<AppSettings>,
    property_cache: Arc<PropertyCache>,
}

impl VerificationScheduler {
    pub fn new(
        urls: UrlRepository,
        projects: ProjectRepository,
        credentials: CredentialRepository,
        notifier: Arc<dyn Notifier>,
        http: reqwest::Client,
        settings: Arc<AppSettings>,
        property_cache: Arc<PropertyCache>,
    ) -> Self {
        Self {
            urls,
            projects,
            credentials,
            notifier,
            http,
            settings,
            property_cache,
        }
    }

    /// Selects the tier's candidates, groups them by project, and verifies
    /// each project's batch with that project's own checker.
    pub async fn run_sweep(&self, tier: VerificationTier) -> CoreResult<usize> {
        let candidates = self
            .urls
            .select_for_verification(tier.min_age, tier.max_age, tier.min_stale, tier.limit)
            .await?;

        if candidates.is_empty() {
            info!("verification sweep [{}]: no candidates", tier.name);
            return Ok(0);
        }

        let mut by_project: HashMap<Uuid, Vec<IndexedUrl>> = HashMap::new();
        for url in candidates {
            by_project.entry(url.project_id).or_default().push(url);
        }

        let mut checked = 0;
        for (project_id, urls) in by_project {
            checked += self.verify_project_batch(project_id, urls).await;
        }

        info!("verification sweep [{}]: checked {} URLs", tier.name, checked);
        Ok(checked)
    }

    async fn verify_project_batch(&self, project_id: Uuid, urls: Vec<IndexedUrl>) -> usize {
        let project = match self.projects.get(&project_id).await {
            Ok(Some(p)) => p,
            Ok(None) => {
                warn!("verification: project {} no longer exists", project_id);
                return 0;
            }
            Err(e) => {
                error!("verification: failed to load project {}: {}", project_id, e);
                return 0;
            }
        };

        let credential = match project.credentials_ref {
            Some(id) => self.credentials.get(&id).await.unwrap_or_default(),
            None => None,
        };
        let checker = build_checker_for_project(&self.settings, self.property_cache.clone(), credential.as_ref());

        let mut checked = 0;
        for url in urls {
            if let Err(e) = self.verify_one(&url, &checker).await {
                error!("verification failed for url {}: {}", url.id, e);
                continue;
            }
            checked += 1;
        }
        checked
    }

    async fn verify_one(&self, url: &IndexedUrl, checker: &crate::services::probes::Checker) -> CoreResult<()> {
        let mut tx = self.urls.get_pool().begin().await?;

        let promoted_status = match url.status {
            UrlStatus::Submitted => Some(UrlStatus::Indexing),
            UrlStatus::Indexing => Some(UrlStatus::Verifying),
            UrlStatus::NotIndexed | UrlStatus::Verifying => None,
            _ => None,
        };
        if let Some(status) = promoted_status {
            self.urls.set_status(&url.id, status, &mut tx).await?;
        }

        let result = checker.check_url(&self.http, &url.text).await;
        self.urls.record_check(&url.id, result.method, &mut tx).await?;

        match result.is_indexed {
            Some(true) => {
                self.urls
                    .mark_indexed(&url.id, result.title.as_deref(), result.snippet.as_deref(), false, &mut tx)
                    .await?;
            }
            Some(false) => {
                self.urls.mark_not_indexed(&url.id, &mut tx).await?;
            }
            None => {}
        }

        tx.commit().await?;

        if result.is_indexed == Some(true) {
            self.notifier
                .notify_indexed(IndexedNotification {
                    event: "url.indexed",
                    url: url.text.clone(),
                    url_id: url.id,
                    project_id: url.project_id,
                    indexed_at: chrono::Utc::now(),
                    title: result.title,
                    snippet: result.snippet,
                })
                .await;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tiers_cover_the_full_zero_to_ten_day_range_without_gaps() {
        let tiers = [
            VerificationTier::FRESH,
            VerificationTier::RECENT,
            VerificationTier::AGING,
            VerificationTier::STALE,
            VerificationTier::FINAL,
        ];
        assert_eq!(tiers[0].min_age, Duration::zero());
        assert_eq!(tiers.last().unwrap().max_age, Duration::days(10));
        for pair in [(&VerificationTier::AGING, &VerificationTier::STALE), (&VerificationTier::STALE, &VerificationTier::FINAL)] {
            assert_eq!(pair.0.max_age, pair.1.min_age, "tier boundaries must be contiguous");
        }
    }
}
