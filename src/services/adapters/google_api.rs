use super::AdapterOutcome;
use crate::error::{CoreError, CoreResult};
use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use serde::{Deserialize, Serialize};
use std::fs;

const SCOPE: &str = "https://www.googleapis.com/auth/indexing";
const PUBLISH_ENDPOINT: &str = "https://indexing.googleapis.com/v3/urlNotifications:publish";
const TOKEN_TTL_SECS: i64 = 3600;

/// The subset of a downloaded Google service-account JSON key this adapter
/// needs to mint its own bearer token.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

impl ServiceAccountKey {
    pub fn load(path: &str) -> CoreResult<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|e| CoreError::Configuration(format!("failed to read {}: {}", path, e)))?;
        serde_json::from_str(&raw)
            .map_err(|e| CoreError::Configuration(format!("invalid service account key {}: {}", path, e)))
    }
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

#[derive(Serialize)]
struct PublishRequest<'a> {
    url: &'a str,
    #[serde(rename = "type")]
    kind: &'a str,
}

/// Mints a fresh bearer token via the JWT-bearer OAuth2 grant. One round
/// trip per submission; the original does the same rather than caching
/// tokens across calls.
async fn fetch_access_token(client: &reqwest::Client, key: &ServiceAccountKey) -> CoreResult<String> {
    let now = Utc::now().timestamp();
    let claims = JwtClaims {
        iss: &key.client_email,
        scope: SCOPE,
        aud: &key.token_uri,
        exp: now + TOKEN_TTL_SECS,
        iat: now,
    };

    let header = Header::new(Algorithm::RS256);
    let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
        .map_err(|e| CoreError::Configuration(format!("invalid service account private key: {}", e)))?;
    let assertion = encode(&header, &claims, &encoding_key)
        .map_err(|e| CoreError::Internal(format!("failed to sign service account JWT: {}", e)))?;

    let response = client
        .post(&key.token_uri)
        .form(&[
            ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
            ("assertion", assertion.as_str()),
        ])
        .send()
        .await?;

    if !response.status().is_success() {
        return Err(CoreError::Transport(format!(
            "token exchange failed with status {}",
            response.status()
        )));
    }

    let token: TokenResponse = response
        .json()
        .await
        .map_err(|e| CoreError::Transport(format!("invalid token response: {}", e)))?;
    Ok(token.access_token)
}

pub async fn submit(client: &reqwest::Client, url: &str, key: &ServiceAccountKey) -> CoreResult<AdapterOutcome> {
    let access_token = fetch_access_token(client, key).await?;

    let response = client
        .post(PUBLISH_ENDPOINT)
        .bearer_auth(access_token)
        .json(&PublishRequest { url, kind: "URL_UPDATED" })
        .send()
        .await?;

    Ok(AdapterOutcome::from_status(response.status().as_u16()))
}
