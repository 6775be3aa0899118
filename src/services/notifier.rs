use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{error, info, warn};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
pub struct IndexedNotification {
    pub event: &'static str,
    pub url: String,
    pub url_id: Uuid,
    pub project_id: Uuid,
    pub indexed_at: DateTime<Utc>,
    pub title: Option<String>,
    pub snippet: Option<String>,
}

/// Fires when a URL transitions to `indexed`, either via pre-check or
/// verification. One webhook POST; SMTP digests are out of scope here (no
/// ambient mail stack in the teacher to ground it on).
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify_indexed(&self, notification: IndexedNotification);
}

pub struct WebhookNotifier {
    client: reqwest::Client,
    webhook_url: String,
}

impl WebhookNotifier {
    pub fn new(client: reqwest::Client, webhook_url: String) -> Self {
        Self { client, webhook_url }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify_indexed(&self, notification: IndexedNotification) {
        match self.client.post(&self.webhook_url).json(&notification).send().await {
            Ok(response) if response.status().is_success() => {
                info!("Webhook sent to {} for url {}", self.webhook_url, notification.url_id);
            }
            Ok(response) => {
                warn!("Webhook to {} returned {}", self.webhook_url, response.status());
            }
            Err(e) => {
                error!("Webhook failed for {}: {}", self.webhook_url, e);
            }
        }
    }
}

/// Used when no webhook is configured; logs the event and does nothing else.
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn notify_indexed(&self, notification: IndexedNotification) {
        info!("url {} indexed (no notifier configured)", notification.url_id);
    }
}
