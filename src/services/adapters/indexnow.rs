use super::AdapterOutcome;
use crate::config::settings::IndexNowConfig;
use crate::error::{CoreError, CoreResult};
use serde::Serialize;

/// IndexNow shares one key across all three participating search engines:
/// a single submission to any endpoint is supposed to propagate to the
/// others, so we only ever call the primary one.
const ENDPOINT: &str = "https://www.bing.com/indexnow";

#[derive(Serialize)]
struct IndexNowPayload<'a> {
    host: &'a str,
    key: &'a str,
    #[serde(rename = "keyLocation")]
    key_location: &'a str,
    #[serde(rename = "urlList")]
    url_list: &'a [String],
}

pub async fn submit_with(client: &reqwest::Client, url: &str, host: &str, key: &str, key_location: &str) -> CoreResult<AdapterOutcome> {
    let url_list = [url.to_string()];
    let payload = IndexNowPayload {
        host,
        key,
        key_location,
        url_list: &url_list,
    };

    let response = client
        .post(ENDPOINT)
        .header("Content-Type", "application/json; charset=utf-8")
        .json(&payload)
        .send()
        .await?;

    Ok(AdapterOutcome::from_status(response.status().as_u16()))
}

/// Submits using the project's per-request IndexNow config if one was
/// supplied, otherwise falls back to the global `IndexNowConfig`.
pub async fn submit(client: &reqwest::Client, url: &str, host: &str, config: &IndexNowConfig) -> CoreResult<AdapterOutcome> {
    let (key, key_location) = match (&config.key, &config.key_location) {
        (Some(k), Some(loc)) => (k.as_str(), loc.as_str()),
        _ => {
            return Err(CoreError::Configuration(
                "INDEXNOW_KEY / INDEXNOW_KEY_LOCATION must be configured to use the indexnow method".to_string(),
            ));
        }
    };
    submit_with(client, url, host, key, key_location).await
}
