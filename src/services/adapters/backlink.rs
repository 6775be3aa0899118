use super::AdapterOutcome;
use crate::error::CoreResult;

/// Direct GET-style IndexNow pings, distinct from the POST-based `indexnow`
/// method: these hit each engine's legacy single-URL endpoint individually
/// rather than the shared `urlList` submission, functioning as a redundant
/// backlink-style crawl signal.
const ENDPOINTS: [(&str, &str); 2] = [
    ("bing", "https://www.bing.com/indexnow"),
    ("yandex", "https://yandex.com/indexnow"),
];

pub async fn ping(client: &reqwest::Client, url: &str) -> CoreResult<AdapterOutcome> {
    let encoded = urlencoding::encode(url);
    let mut last = AdapterOutcome::failure("no endpoint reached");

    for (_name, base) in ENDPOINTS {
        let target = format!("{}?url={}", base, encoded);
        match client.get(&target).send().await {
            Ok(response) => {
                let outcome = AdapterOutcome::from_status(response.status().as_u16());
                if outcome.success {
                    return Ok(outcome);
                }
                last = outcome;
            }
            Err(e) => {
                last = AdapterOutcome::failure(e.to_string());
            }
        }
    }

    Ok(last)
}
