use super::AdapterOutcome;
use crate::error::CoreResult;

/// The Internet Archive's save-page-now endpoint crawls and snapshots the
/// URL on request, which is itself a crawl signal independent of whether
/// anyone ever reads the snapshot.
pub async fn save(client: &reqwest::Client, url: &str) -> CoreResult<AdapterOutcome> {
    let target = format!("https://web.archive.org/save/{}", url);
    let response = client.get(&target).send().await?;
    Ok(AdapterOutcome::from_status(response.status().as_u16()))
}
