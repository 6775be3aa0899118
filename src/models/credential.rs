use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A rotating search-engine service credential with a daily quota.
///
/// `is_active` is the admin-facing switch; `disabled_for_quota` is set by the
/// pool itself when an adapter observes a 401/403/429 and is the only flag
/// the nightly reset is allowed to clear. A credential an admin disabled
/// (`is_active = false`, `disabled_for_quota = false`) must stay disabled
/// across resets.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Credential {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub key_material: serde_json::Value,
    pub daily_quota: i32,
    pub used_today: i32,
    pub is_active: bool,
    pub disabled_for_quota: bool,
    pub last_reset_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Credential {
    pub fn has_quota_remaining(&self) -> bool {
        self.used_today < self.daily_quota
    }

    pub fn is_usable(&self) -> bool {
        self.is_active && self.has_quota_remaining()
    }
}
