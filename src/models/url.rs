use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum UrlStatus {
    Pending,
    Submitted,
    Indexing,
    Verifying,
    Indexed,
    NotIndexed,
    Recredited,
}

impl UrlStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            UrlStatus::Pending => "pending",
            UrlStatus::Submitted => "submitted",
            UrlStatus::Indexing => "indexing",
            UrlStatus::Verifying => "verifying",
            UrlStatus::Indexed => "indexed",
            UrlStatus::NotIndexed => "not_indexed",
            UrlStatus::Recredited => "recredited",
        }
    }
}

/// A submitted URL and its full state-machine record. Named `IndexedUrl`
/// rather than `Url` to avoid colliding with the `url` crate used for
/// parsing throughout the adapters and probes.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct IndexedUrl {
    pub id: Uuid,
    pub project_id: Uuid,
    pub text: String,
    pub status: UrlStatus,

    pub indexnow_attempts: i32,
    pub indexnow_last_status: Option<String>,
    pub pingomatic_attempts: i32,
    pub pingomatic_last_status: Option<String>,
    pub websub_attempts: i32,
    pub websub_last_status: Option<String>,
    pub archive_org_attempts: i32,
    pub archive_org_last_status: Option<String>,
    pub backlink_attempts: i32,
    pub backlink_last_status: Option<String>,
    pub google_api_attempts: i32,
    pub google_api_last_status: Option<String>,

    pub is_indexed: bool,
    pub indexed_at: Option<DateTime<Utc>>,
    pub indexed_title: Option<String>,
    pub indexed_snippet: Option<String>,

    pub last_checked_at: Option<DateTime<Utc>>,
    pub check_count: i32,
    pub check_method: Option<String>,

    pub credit_debited: bool,
    pub credit_refunded: bool,
    pub pre_indexed: bool,
    pub verified_not_indexed: bool,

    pub submitted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl IndexedUrl {
    pub fn attempts_for(&self, method: super::Method) -> i32 {
        use super::Method::*;
        match method {
            IndexNow => self.indexnow_attempts,
            Pingomatic => self.pingomatic_attempts,
            WebSub => self.websub_attempts,
            ArchiveOrg => self.archive_org_attempts,
            Backlink => self.backlink_attempts,
            GoogleApi => self.google_api_attempts,
        }
    }
}
