use crate::db::repositories::{ProjectRepository, UrlRepository};
use crate::error::CoreResult;
use crate::services::credit_ledger::CreditLedger;
use log::{info, warn};
use std::collections::HashMap;
use uuid::Uuid;

const REFUND_CUTOFF_DAYS: i64 = 14;

/// Daily sweep that auto-refunds credits for URLs stuck un-indexed past the
/// cutoff, grouped by project to resolve each URL's owning user once.
pub struct RefundSweeper {
    urls: UrlRepository,
    projects: ProjectRepository,
    ledger: CreditLedger,
}

impl RefundSweeper {
    pub fn new(urls: UrlRepository, projects: ProjectRepository, ledger: CreditLedger) -> Self {
        Self { urls, projects, ledger }
    }

    pub async fn sweep(&self) -> CoreResult<usize> {
        let candidates = self.urls.select_for_refund_sweep(REFUND_CUTOFF_DAYS).await?;
        if candidates.is_empty() {
            info!("refund sweep: nothing eligible");
            return Ok(0);
        }

        let mut by_project: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
        for url in candidates {
            by_project.entry(url.project_id).or_default().push(url.id);
        }

        let mut total_refunded = 0;
        for (project_id, url_ids) in by_project {
            let Some(project) = self.projects.get(&project_id).await? else {
                warn!("refund sweep: project {} no longer exists", project_id);
                continue;
            };
            let refunded = self
                .ledger
                .refund(&project.owner_id, &url_ids, "Auto-refund: URL not indexed after 14 days", true)
                .await?;
            total_refunded += refunded;
        }

        info!("refund sweep: auto-refunded {} credits", total_refunded);
        Ok(total_refunded)
    }
}
