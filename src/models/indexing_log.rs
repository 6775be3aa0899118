use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum LogStatus {
    Success,
    Error,
}

/// One row per adapter call attempt. Append-only, used for debugging and for
/// the per-URL `_last_status` fields derived from the most recent row.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct IndexingLog {
    pub id: Uuid,
    pub url_id: Uuid,
    pub method: String,
    pub status: LogStatus,
    pub response_code: Option<i32>,
    pub response_body: Option<String>,
    pub credentials_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}
