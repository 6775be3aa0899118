use crate::db::repositories::CredentialRepository;
use crate::error::CoreResult;
use crate::models::Credential;
use log::{info, warn};
use sqlx::PgPool;
use uuid::Uuid;

/// Rotating pool of search-engine service credentials, one per Search
/// Console property the system owns. Selection is least-used-first so usage
/// smooths across the pool instead of draining one account at a time.
#[derive(Debug, Clone)]
pub struct CredentialsPool {
    repo: CredentialRepository,
}

impl CredentialsPool {
    pub fn new(pool: PgPool) -> Self {
        Self {
            repo: CredentialRepository::new(pool),
        }
    }

    pub async fn next_available(&self) -> CoreResult<Option<Credential>> {
        self.repo.next_available().await
    }

    pub async fn total_remaining_quota(&self) -> CoreResult<i64> {
        self.repo.total_remaining_quota().await
    }

    pub async fn increment_usage(&self, credential_id: &Uuid, n: i32) -> CoreResult<()> {
        self.repo.increment_usage(credential_id, n).await
    }

    /// Called when an adapter observes a 401/403/429 from the credential's
    /// API. Disables it for the rest of the day; the midnight reset is the
    /// only thing allowed to clear this.
    pub async fn disable_for_quota(&self, credential_id: &Uuid) -> CoreResult<()> {
        warn!("Disabling credential {} for quota/auth error", credential_id);
        self.repo.disable_for_quota(credential_id).await
    }

    pub async fn admin_disable(&self, credential_id: &Uuid) -> CoreResult<()> {
        self.repo.admin_disable(credential_id).await
    }

    /// Scheduled daily at 00:00 UTC.
    pub async fn reset_all(&self) -> CoreResult<()> {
        let reenabled = self.repo.reset_all().await?;
        info!("Credential daily reset complete, re-enabled {} quota-disabled credentials", reenabled);
        Ok(())
    }
}
