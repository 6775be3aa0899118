use crate::config::AppSettings;
use crate::db::repositories::{CredentialRepository, ProjectRepository, UrlRepository};
use crate::error::CoreResult;
use crate::models::Credential;
use crate::services::adapters::google_api::ServiceAccountKey;
use crate::services::credit_ledger::CreditLedger;
use crate::services::method_queue::{IndexNowJobConfig, JobQueue, enqueue_submission};
use crate::services::notifier::{IndexedNotification, Notifier};
use crate::services::probes::{Checker, CustomSearchProbe, FallbackProbe, GscInspectionProbe, Probe, PropertyCache};
use chrono::Utc;
use log::{error, info, warn};
use std::sync::Arc;
use uuid::Uuid;

/// Entry point for a freshly-created URL (or one still `pending`): runs the
/// pre-check, then either short-circuits to `indexed` or submits the six
/// method jobs.
pub struct Dispatcher {
    urls: UrlRepository,
    projects: ProjectRepository,
    credentials: CredentialRepository,
    ledger: Arc<CreditLedger>,
    queue: Arc<dyn JobQueue>,
    notifier: Arc<dyn Notifier>,
    http: reqwest::Client,
    settings: Arc<AppSettings>,
    property_cache: Arc<PropertyCache>,
}

impl Dispatcher {
    pub fn new(
        urls: UrlRepository,
        projects: ProjectRepository,
        credentials: CredentialRepository,
        ledger: Arc<CreditLedger>,
        queue: Arc<dyn JobQueue>,
        notifier: Arc<dyn Notifier>,
        http: reqwest::Client,
        settings: Arc<AppSettings>,
        property_cache: Arc<PropertyCache>,
    ) -> Self {
        Self {
            urls,
            projects,
            credentials,
            ledger,
            queue,
            notifier,
            http,
            settings,
            property_cache,
        }
    }

    /// Runs the full submission flow for one URL: pre-check, then either
    /// short-circuit to indexed+refund or submit to the method queue.
    /// `indexnow_config` is the caller's optional per-request override of
    /// the global `IndexNowConfig`, carried through to the queued job.
    pub async fn submit_url(&self, url_id: Uuid, indexnow_config: Option<IndexNowJobConfig>) -> CoreResult<()> {
        let Some(url) = self.urls.get(&url_id).await? else {
            warn!("dispatcher: url {} no longer exists", url_id);
            return Ok(());
        };
        let Some(project) = self.projects.get(&url.project_id).await? else {
            warn!("dispatcher: project {} for url {} no longer exists", url.project_id, url_id);
            return Ok(());
        };

        let credential = match project.credentials_ref {
            Some(id) => self.credentials.get(&id).await?,
            None => None,
        };
        let checker = build_checker_for_project(&self.settings, self.property_cache.clone(), credential.as_ref());

        let pre_check = checker.check_url(&self.http, &url.text).await;

        if pre_check.is_indexed == Some(true) {
            match self.apply_pre_indexed(url_id, project.owner_id, pre_check.title.clone(), pre_check.snippet.clone()).await {
                Ok(()) => {
                    info!("url {} was already indexed before submission", url_id);
                    self.notifier
                        .notify_indexed(IndexedNotification {
                            event: "url.indexed",
                            url: url.text.clone(),
                            url_id,
                            project_id: url.project_id,
                            indexed_at: Utc::now(),
                            title: pre_check.title,
                            snippet: pre_check.snippet,
                        })
                        .await;
                    return Ok(());
                }
                Err(e) => {
                    error!("pre-check commit failed for url {}, submitting instead: {}", url_id, e);
                }
            }
        }

        let mut tx = self.urls.get_pool().begin().await?;
        self.urls.mark_submitted(&url_id, &mut tx).await?;
        tx.commit().await?;

        enqueue_submission(self.queue.as_ref(), url_id, url.project_id, indexnow_config).await?;
        Ok(())
    }

    async fn apply_pre_indexed(
        &self,
        url_id: Uuid,
        owner_id: Uuid,
        title: Option<String>,
        snippet: Option<String>,
    ) -> CoreResult<()> {
        // Refund and indexed-mark commit together: if the process died between
        // two independent commits here, a URL could end up credit_refunded
        // but never marked indexed, and the refund sweeper (which requires
        // ¬credit_refunded) would never be able to catch or correct it.
        let mut tx = self.urls.get_pool().begin().await?;
        self.ledger
            .refund_with_executor(&owner_id, &[url_id], "Pre-indexed before submission", false, &mut tx)
            .await?;
        self.urls
            .mark_indexed(&url_id, title.as_deref(), snippet.as_deref(), true, &mut tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }
}

/// Per-project checker: the project's own credential overrides the global
/// one if set, otherwise falls back to `AppSettings`'s single global
/// credential; the unconditional-unknown fallback probe always anchors the
/// chain. Shared by the dispatcher's pre-check and the verification
/// scheduler's per-project sweeps.
///
/// The GSC property to inspect under is no longer taken from the project's
/// `main_domain` — `GscInspectionProbe` discovers it per-URL from the
/// credential's own owned-properties list (see `PropertyCache`). The
/// project-level credential is keyed in `property_cache` by its UUID; the
/// global settings credential is keyed by the fixed string `"global"` and
/// may instead pin a single property via `GOOGLE_SEARCH_CONSOLE_PROPERTY`,
/// skipping discovery entirely.
pub fn build_checker_for_project(settings: &AppSettings, property_cache: Arc<PropertyCache>, credential: Option<&Credential>) -> Checker {
    let mut probes: Vec<Box<dyn Probe>> = Vec::new();

    if let Some(credential) = credential {
        match serde_json::from_value::<ServiceAccountKey>(credential.key_material.clone()) {
            Ok(key) => probes.push(Box::new(GscInspectionProbe {
                credential_key: credential.id.to_string(),
                key,
                property_cache: property_cache.clone(),
                property_override: None,
            })),
            Err(e) => warn!("credential {} has malformed key material: {}", credential.id, e),
        }
    } else if let Some(path) = &settings.google.service_account_key_path {
        match ServiceAccountKey::load(path) {
            Ok(key) => probes.push(Box::new(GscInspectionProbe {
                credential_key: "global".to_string(),
                key,
                property_cache: property_cache.clone(),
                property_override: settings.google.search_console_property.clone(),
            })),
            Err(e) => warn!("global service account key unusable: {}", e),
        }
    }

    if let (Some(api_key), Some(engine_id)) = (&settings.custom_search.api_key, &settings.custom_search.engine_id) {
        probes.push(Box::new(CustomSearchProbe {
            api_key: api_key.clone(),
            engine_id: engine_id.clone(),
        }));
    }

    probes.push(Box::new(FallbackProbe));
    Checker::new(probes)
}
