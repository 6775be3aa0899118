use serde::{Deserialize, Serialize};
use std::fmt;

/// The six submission channels a URL is pushed through. Replaces dynamic
/// dispatch on a string method name with a closed sum type, per the queue
/// backend's design notes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Method {
    IndexNow,
    Pingomatic,
    WebSub,
    ArchiveOrg,
    Backlink,
    GoogleApi,
}

impl Method {
    pub const ALL: [Method; 6] = [
        Method::IndexNow,
        Method::Pingomatic,
        Method::WebSub,
        Method::ArchiveOrg,
        Method::Backlink,
        Method::GoogleApi,
    ];

    /// Seconds after submission before the method's first job becomes eligible.
    pub const fn initial_delay_secs(self) -> i64 {
        match self {
            Method::IndexNow => 0,
            Method::Pingomatic => 120,
            Method::WebSub => 240,
            Method::ArchiveOrg => 480,
            Method::Backlink => 720,
            Method::GoogleApi => 1800,
        }
    }

    /// `(max_calls, window_seconds)` for methods rate-limited by a shared
    /// fixed window. `GoogleApi` returns `None`: it is gated by the
    /// credentials pool's daily quota instead.
    pub const fn rate_limit(self) -> Option<(u32, u64)> {
        match self {
            Method::IndexNow => Some((100, 60)),
            Method::Pingomatic => Some((30, 60)),
            Method::WebSub => Some((30, 60)),
            Method::ArchiveOrg => Some((15, 60)),
            Method::Backlink => Some((30, 60)),
            Method::GoogleApi => None,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Method::IndexNow => "indexnow",
            Method::Pingomatic => "pingomatic",
            Method::WebSub => "websub",
            Method::ArchiveOrg => "archive_org",
            Method::Backlink => "backlink",
            Method::GoogleApi => "google_api",
        }
    }

    pub fn from_str(s: &str) -> Option<Method> {
        match s {
            "indexnow" => Some(Method::IndexNow),
            "pingomatic" => Some(Method::Pingomatic),
            "websub" => Some(Method::WebSub),
            "archive_org" => Some(Method::ArchiveOrg),
            "backlink" => Some(Method::Backlink),
            "google_api" => Some(Method::GoogleApi),
            _ => None,
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
