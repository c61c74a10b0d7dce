use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;

use crate::notify::Notifier;

/// Notifier that POSTs each message to a webhook URL as `{"text": ...}`.
///
/// Works with any chat webhook that accepts a plain-text payload.
pub struct WebhookNotifier {
    client: Client,
    webhook_url: String,
    enabled: bool,
}

impl WebhookNotifier {
    pub fn new(webhook_url: String) -> Self {
        Self {
            client: Client::new(),
            webhook_url,
            enabled: true,
        }
    }

    /// Build from `BANDBOT_WEBHOOK_URL`; `None` when the variable is unset.
    pub fn from_env() -> Option<Self> {
        let webhook_url = std::env::var("BANDBOT_WEBHOOK_URL").ok()?;
        let enabled = std::env::var("BANDBOT_WEBHOOK_ENABLED")
            .map(|v| v.to_lowercase() != "false")
            .unwrap_or(true);

        Some(Self {
            client: Client::new(),
            webhook_url,
            enabled,
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send_message(&self, text: &str) {
        if !self.enabled {
            tracing::debug!("Webhook disabled, dropping message: {}", text);
            return;
        }

        let payload = json!({ "text": text });
        match self
            .client
            .post(&self.webhook_url)
            .json(&payload)
            .send()
            .await
        {
            Ok(response) if response.status().is_success() => {
                tracing::debug!("Webhook delivered: {}", text);
            }
            Ok(response) => {
                tracing::warn!(
                    "Webhook returned {} for message: {}",
                    response.status(),
                    text
                );
            }
            Err(err) => {
                tracing::warn!("Webhook delivery failed: {} (message: {})", err, text);
            }
        }
    }
}
