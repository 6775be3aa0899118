use super::AdapterOutcome;
use crate::error::CoreResult;

const ENDPOINT: &str = "http://rpc.pingomatic.com/";

/// XML-RPC `weblogUpdates.ping` call. Ping-o-matic fans this out to a
/// handful of downstream crawl-signal aggregators on its own.
pub async fn ping(client: &reqwest::Client, url: &str) -> CoreResult<AdapterOutcome> {
    let body = format!(
        r#"<?xml version="1.0"?>
<methodCall>
    <methodName>weblogUpdates.ping</methodName>
    <params>
        <param><value>URL Update</value></param>
        <param><value>{}</value></param>
    </params>
</methodCall>"#,
        url
    );

    let response = client
        .post(ENDPOINT)
        .header("Content-Type", "text/xml")
        .body(body)
        .send()
        .await?;

    Ok(AdapterOutcome::from_status(response.status().as_u16()))
}
