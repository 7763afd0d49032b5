//! Webhook notification channel
//!
//! Sends each mirror transition as a JSON payload via HTTP POST.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use super::{DeliveryStatus, Notifier, NotifyError, NotifyResult};
use crate::config::NotifyConfig;
use crate::models::MirrorTransition;

/// Webhook channel configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    /// Webhook URL endpoint
    pub url: String,
    /// Optional authentication token (sent as Bearer token)
    pub auth_token: Option<String>,
    /// Custom headers to include in requests
    #[serde(default)]
    pub headers: HashMap<String, String>,
    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_timeout() -> u64 {
    10
}

impl WebhookConfig {
    /// Create a new webhook configuration
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            auth_token: None,
            headers: HashMap::new(),
            timeout_secs: default_timeout(),
        }
    }

    /// Build from the `[notify]` section, if a webhook is configured
    pub fn from_notify(config: &NotifyConfig) -> Option<Self> {
        let url = config.webhook_url.as_ref()?;
        let mut webhook = Self::new(url.clone()).with_timeout(config.webhook_timeout_secs);
        if let Some(token) = &config.webhook_token {
            webhook = webhook.with_auth_token(token.clone());
        }
        Some(webhook)
    }

    /// Set authentication token
    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    /// Add a custom header
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Set request timeout
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.url.is_empty() {
            return Err("Webhook URL cannot be empty".to_string());
        }

        if !self.url.starts_with("http://") && !self.url.starts_with("https://") {
            return Err("Webhook URL must start with http:// or https://".to_string());
        }

        if self.timeout_secs == 0 {
            return Err("Timeout must be greater than 0".to_string());
        }

        Ok(())
    }
}

/// Webhook notification channel
///
/// # Payload Format
///
/// ```json
/// {
///   "mirror": "avalon",
///   "url": "https://mirror-master.dragonflybsd.org/dports/",
///   "event": "DOWN",
///   "occurred_at": "2024-01-01T12:00:00Z"
/// }
/// ```
pub struct WebhookNotifier {
    config: WebhookConfig,
    client: Client,
}

impl WebhookNotifier {
    /// Create a new webhook channel
    pub fn new(config: WebhookConfig) -> NotifyResult<Self> {
        config.validate().map_err(NotifyError::InvalidConfig)?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { config, client })
    }

    /// Get the webhook URL
    pub fn url(&self) -> &str {
        &self.config.url
    }

    fn build_payload(&self, transition: &MirrorTransition) -> serde_json::Value {
        serde_json::json!({
            "mirror": transition.mirror,
            "url": transition.url,
            "event": transition.event.as_str(),
            "occurred_at": transition.occurred_at.to_rfc3339(),
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    fn name(&self) -> &str {
        "webhook"
    }

    async fn send(&self, transition: &MirrorTransition) -> NotifyResult<DeliveryStatus> {
        let payload = self.build_payload(transition);

        let mut request = self.client.post(&self.config.url);
        if let Some(token) = &self.config.auth_token {
            request = request.bearer_auth(token);
        }
        for (key, value) in &self.config.headers {
            request = request.header(key, value);
        }

        let response = request.json(&payload).send().await.map_err(|e| {
            if e.is_timeout() {
                NotifyError::Timeout(Duration::from_secs(self.config.timeout_secs))
            } else {
                NotifyError::Http(e)
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read response body".to_string());
            return Err(NotifyError::BadStatus {
                status: status.as_u16(),
                body,
            });
        }

        tracing::info!(
            url = %self.config.url,
            mirror = %transition.mirror,
            event = %transition.event,
            status = %status,
            "Webhook delivered"
        );
        Ok(DeliveryStatus::success_with_message(
            self.name(),
            format!("Delivered to {}", self.config.url),
        ))
    }
}
