use crate::error::{CoreError, CoreResult};
use crate::services::adapters::google_api::ServiceAccountKey;
use async_trait::async_trait;
use dashmap::DashMap;
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use log::error;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Outcome of one indexation check, regardless of which probe produced it.
/// `is_indexed: None` means the probe could not determine an answer (a
/// transport error, or the fallback probe's unconditional "unknown").
#[derive(Debug, Clone)]
pub struct ProbeResult {
    pub is_indexed: Option<bool>,
    pub title: Option<String>,
    pub snippet: Option<String>,
    pub method: &'static str,
}

impl ProbeResult {
    fn unknown(method: &'static str) -> Self {
        Self {
            is_indexed: None,
            title: None,
            snippet: None,
            method,
        }
    }
}

#[async_trait]
pub trait Probe: Send + Sync {
    async fn check(&self, client: &reqwest::Client, url: &str) -> ProbeResult;
}

const PROPERTY_CACHE_TTL: Duration = Duration::from_secs(300);

/// Bounded, TTL-expiring cache of each credential's owned Search Console
/// properties, keyed by a caller-supplied credential key (a credential's
/// UUID, or `"global"` for the single settings-level credential). One
/// instance is shared by every `GscInspectionProbe` built across the
/// process, not a process-global — it's handed in by the caller.
#[derive(Default)]
pub struct PropertyCache {
    entries: DashMap<String, (Instant, Vec<String>)>,
}

impl PropertyCache {
    pub fn new() -> Self {
        Self { entries: DashMap::new() }
    }

    fn get(&self, key: &str) -> Option<Vec<String>> {
        let entry = self.entries.get(key)?;
        let (fetched_at, properties) = entry.value();
        if fetched_at.elapsed() < PROPERTY_CACHE_TTL { Some(properties.clone()) } else { None }
    }

    fn put(&self, key: String, properties: Vec<String>) {
        self.entries.insert(key, (Instant::now(), properties));
    }
}

/// Google Search Console URL Inspection API. Quota: 2000/day, 600/min per
/// property. This is the only probe that can say "indexed" with certainty
/// since it reflects Google's own index, not a search result page.
///
/// The property to inspect under is not known up front: it dynamically
/// discovers which property covers a URL's host by enumerating the
/// properties the credential owns (`sites.list`) and matching on host
/// suffix, caching that list per credential in `property_cache`.
/// `property_override`, when set, skips discovery entirely and always
/// inspects under the given property — used for the global credential when
/// an operator has pinned `GOOGLE_SEARCH_CONSOLE_PROPERTY`.
pub struct GscInspectionProbe {
    pub credential_key: String,
    pub key: ServiceAccountKey,
    pub property_cache: Arc<PropertyCache>,
    pub property_override: Option<String>,
}

#[derive(Serialize)]
struct InspectRequest<'a> {
    #[serde(rename = "inspectionUrl")]
    inspection_url: &'a str,
    #[serde(rename = "siteUrl")]
    site_url: &'a str,
}

#[derive(Deserialize)]
struct InspectResponse {
    #[serde(rename = "inspectionResult")]
    inspection_result: Option<InspectionResult>,
}

#[derive(Deserialize)]
struct InspectionResult {
    #[serde(rename = "indexStatusResult")]
    index_status_result: Option<IndexStatusResult>,
}

#[derive(Deserialize)]
struct IndexStatusResult {
    verdict: Option<String>,
}

#[derive(Deserialize)]
struct SitesListResponse {
    #[serde(rename = "siteEntry")]
    site_entry: Option<Vec<SiteEntry>>,
}

#[derive(Deserialize)]
struct SiteEntry {
    #[serde(rename = "siteUrl")]
    site_url: String,
}

#[derive(Serialize)]
struct JwtClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    exp: i64,
    iat: i64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

impl GscInspectionProbe {
    async fn fetch_token(&self, client: &reqwest::Client) -> CoreResult<String> {
        let now = chrono::Utc::now().timestamp();
        let claims = JwtClaims {
            iss: &self.key.client_email,
            scope: "https://www.googleapis.com/auth/webmasters.readonly",
            aud: &self.key.token_uri,
            exp: now + 3600,
            iat: now,
        };
        let encoding_key = EncodingKey::from_rsa_pem(self.key.private_key.as_bytes())
            .map_err(|e| crate::error::CoreError::Configuration(format!("invalid GSC private key: {}", e)))?;
        let assertion = encode(&Header::new(Algorithm::RS256), &claims, &encoding_key)
            .map_err(|e| crate::error::CoreError::Internal(format!("failed to sign GSC JWT: {}", e)))?;

        let response = client
            .post(&self.key.token_uri)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", assertion.as_str()),
            ])
            .send()
            .await?;
        let token: TokenResponse = response.json().await.map_err(|e| {
            crate::error::CoreError::Transport(format!("invalid GSC token response: {}", e))
        })?;
        Ok(token.access_token)
    }

    async fn list_properties(&self, client: &reqwest::Client, token: &str) -> CoreResult<Vec<String>> {
        let response = client
            .get("https://www.googleapis.com/webmasters/v3/sites")
            .bearer_auth(token)
            .send()
            .await?;
        let body: SitesListResponse = response
            .json()
            .await
            .map_err(|e| CoreError::Transport(format!("invalid GSC sites.list response: {}", e)))?;
        Ok(body.site_entry.unwrap_or_default().into_iter().map(|e| e.site_url).collect())
    }

    /// Resolves the property that covers `url`'s host, fetching and caching
    /// the credential's property list on a miss. Returns `None` (not an
    /// error) when no owned property covers the host — the caller treats
    /// that the same as an inconclusive check.
    async fn resolve_property(&self, client: &reqwest::Client, token: &str, url: &str) -> CoreResult<Option<String>> {
        let properties = match self.property_cache.get(&self.credential_key) {
            Some(cached) => cached,
            None => {
                let fetched = self.list_properties(client, token).await?;
                self.property_cache.put(self.credential_key.clone(), fetched.clone());
                fetched
            }
        };

        let Some(host) = url::Url::parse(url).ok().and_then(|u| u.host_str().map(str::to_string)) else {
            return Ok(None);
        };

        Ok(properties.into_iter().find(|property| property_covers_host(property, &host)))
    }
}

/// A GSC property is either a domain property (`sc-domain:example.com`,
/// covering every subdomain) or a URL-prefix property
/// (`https://example.com/`, covering only that exact host). Matches `host`
/// against either form.
fn property_covers_host(property: &str, host: &str) -> bool {
    let candidate = property
        .trim_start_matches("sc-domain:")
        .trim_start_matches("https://")
        .trim_start_matches("http://")
        .trim_end_matches('/');
    host == candidate || host.ends_with(&format!(".{}", candidate))
}

#[async_trait]
impl Probe for GscInspectionProbe {
    async fn check(&self, client: &reqwest::Client, url: &str) -> ProbeResult {
        let result = async {
            let token = self.fetch_token(client).await?;

            let site_url = match &self.property_override {
                Some(property) => property.clone(),
                None => match self.resolve_property(client, &token, url).await? {
                    Some(property) => property,
                    None => return Ok::<Option<String>, CoreError>(None),
                },
            };

            let response = client
                .post("https://searchconsole.googleapis.com/v1/urlInspection/index:inspect")
                .bearer_auth(token)
                .json(&InspectRequest {
                    inspection_url: url,
                    site_url: &site_url,
                })
                .send()
                .await?;
            let body: InspectResponse = response.json().await.map_err(|e| {
                crate::error::CoreError::Transport(format!("invalid GSC inspect response: {}", e))
            })?;
            let verdict = body
                .inspection_result
                .and_then(|r| r.index_status_result)
                .and_then(|s| s.verdict);
            Ok::<Option<String>, crate::error::CoreError>(verdict)
        }
        .await;

        match result {
            Ok(Some(verdict)) => ProbeResult {
                is_indexed: Some(verdict == "PASS"),
                title: None,
                snippet: None,
                method: "gsc_inspection",
            },
            Ok(None) => ProbeResult::unknown("gsc_inspection"),
            Err(e) => {
                error!("GSC inspection failed for {}: {}", url, e);
                ProbeResult::unknown("gsc_inspection")
            }
        }
    }
}

/// Google Custom Search API: queries `site:<url>` and treats any hit as
/// indexed. Free tier is 100 queries/day.
pub struct CustomSearchProbe {
    pub api_key: String,
    pub engine_id: String,
}

#[derive(Deserialize)]
struct CustomSearchResponse {
    items: Option<Vec<CustomSearchItem>>,
}

#[derive(Deserialize)]
struct CustomSearchItem {
    title: Option<String>,
    snippet: Option<String>,
}

#[async_trait]
impl Probe for CustomSearchProbe {
    async fn check(&self, client: &reqwest::Client, url: &str) -> ProbeResult {
        let result = async {
            let response = client
                .get("https://www.googleapis.com/customsearch/v1")
                .query(&[
                    ("q", format!("site:{}", url)),
                    ("cx", self.engine_id.clone()),
                    ("key", self.api_key.clone()),
                ])
                .send()
                .await?;
            let body: CustomSearchResponse = response.json().await.map_err(|e| {
                crate::error::CoreError::Transport(format!("invalid Custom Search response: {}", e))
            })?;
            Ok::<Option<Vec<CustomSearchItem>>, crate::error::CoreError>(body.items)
        }
        .await;

        match result {
            Ok(Some(items)) if !items.is_empty() => ProbeResult {
                is_indexed: Some(true),
                title: items[0].title.clone(),
                snippet: items[0].snippet.clone(),
                method: "custom_search",
            },
            Ok(_) => ProbeResult {
                is_indexed: Some(false),
                title: None,
                snippet: None,
                method: "custom_search",
            },
            Err(e) => {
                error!("Custom Search check failed for {}: {}", url, e);
                ProbeResult::unknown("custom_search")
            }
        }
    }
}

/// Last resort when no Google credentials are configured for the project.
/// Always answers "unknown" rather than scraping a search results page: the
/// scraping variant has known false positives and is not carried forward.
pub struct FallbackProbe;

#[async_trait]
impl Probe for FallbackProbe {
    async fn check(&self, _client: &reqwest::Client, _url: &str) -> ProbeResult {
        ProbeResult::unknown("fallback")
    }
}

/// Tries probes in priority order (authoritative > best-effort > fallback)
/// and stops at the first one that returns a definite answer.
pub struct Checker {
    probes: Vec<Box<dyn Probe>>,
}

impl Checker {
    pub fn new(probes: Vec<Box<dyn Probe>>) -> Self {
        Self { probes }
    }

    pub async fn check_url(&self, client: &reqwest::Client, url: &str) -> ProbeResult {
        for probe in &self.probes {
            let result = probe.check(client, url).await;
            if result.is_indexed.is_some() {
                return result;
            }
        }
        ProbeResult::unknown("fallback")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct AlwaysUnknown;
    #[async_trait]
    impl Probe for AlwaysUnknown {
        async fn check(&self, _client: &reqwest::Client, _url: &str) -> ProbeResult {
            ProbeResult::unknown("test_unknown")
        }
    }

    struct AlwaysIndexed;
    #[async_trait]
    impl Probe for AlwaysIndexed {
        async fn check(&self, _client: &reqwest::Client, _url: &str) -> ProbeResult {
            ProbeResult {
                is_indexed: Some(true),
                title: Some("t".to_string()),
                snippet: Some("s".to_string()),
                method: "test_indexed",
            }
        }
    }

    #[tokio::test]
    async fn checker_falls_through_to_first_definite_probe() {
        let checker = Checker::new(vec![Box::new(AlwaysUnknown), Box::new(AlwaysIndexed)]);
        let client = reqwest::Client::new();
        let result = checker.check_url(&client, "https://example.com").await;
        assert_eq!(result.is_indexed, Some(true));
        assert_eq!(result.method, "test_indexed");
    }

    #[test]
    fn property_covers_host_matches_domain_and_url_prefix_properties() {
        assert!(property_covers_host("sc-domain:example.com", "example.com"));
        assert!(property_covers_host("sc-domain:example.com", "blog.example.com"));
        assert!(property_covers_host("https://example.com/", "example.com"));
        assert!(!property_covers_host("https://example.com/", "other.com"));
        assert!(!property_covers_host("sc-domain:example.com", "notexample.com"));
    }

    #[test]
    fn property_cache_misses_once_ttl_elapses() {
        let cache = PropertyCache::new();
        cache.entries.insert("cred-1".to_string(), (Instant::now(), vec!["sc-domain:example.com".to_string()]));
        assert!(cache.get("cred-1").is_some());

        let expired_at = Instant::now() - PROPERTY_CACHE_TTL - Duration::from_secs(1);
        cache.entries.insert("cred-1".to_string(), (expired_at, vec!["sc-domain:example.com".to_string()]));
        assert!(cache.get("cred-1").is_none());
    }

    #[tokio::test]
    async fn checker_returns_unknown_when_every_probe_is_unknown() {
        let checker = Checker::new(vec![Box::new(AlwaysUnknown)]);
        let client = reqwest::Client::new();
        let result = checker.check_url(&client, "https://example.com").await;
        assert_eq!(result.is_indexed, None);
    }
}
