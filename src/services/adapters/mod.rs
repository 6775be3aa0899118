pub mod archive_org;
pub mod backlink;
pub mod google_api;
pub mod indexnow;
pub mod pingomatic;
pub mod websub;

/// Common shape every method adapter reduces its HTTP call to, so the
/// dispatcher can record one `<method>_last_status` string regardless of
/// which adapter produced it.
#[derive(Debug, Clone)]
pub struct AdapterOutcome {
    pub success: bool,
    pub status_code: Option<u16>,
    pub detail: String,
}

impl AdapterOutcome {
    pub fn from_status(status_code: u16) -> Self {
        Self {
            success: (200..300).contains(&status_code),
            status_code: Some(status_code),
            detail: status_code.to_string(),
        }
    }

    pub fn failure(detail: impl Into<String>) -> Self {
        Self {
            success: false,
            status_code: None,
            detail: detail.into(),
        }
    }
}
