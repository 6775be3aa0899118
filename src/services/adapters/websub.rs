use super::AdapterOutcome;
use crate::error::CoreResult;

const HUB: &str = "https://pubsubhubbub.appspot.com/";

/// PubSubHubbub publish notification: tells the public hub a URL changed so
/// any subscriber feeds get a crawl nudge.
pub async fn ping(client: &reqwest::Client, url: &str) -> CoreResult<AdapterOutcome> {
    let response = client
        .post(HUB)
        .form(&[("hub.mode", "publish"), ("hub.url", url)])
        .send()
        .await?;

    Ok(AdapterOutcome::from_status(response.status().as_u16()))
}
