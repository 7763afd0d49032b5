//! Notification channels for mirror state changes
//!
//! Two channels are provided: an external executable and a webhook.

pub mod exec;
pub mod webhook;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::models::MirrorTransition;

pub use exec::ExecNotifier;
pub use webhook::{WebhookConfig, WebhookNotifier};

/// Result type for channel operations
pub type NotifyResult<T> = Result<T, NotifyError>;

/// Errors that can occur while delivering a notification
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Endpoint answered with an error status
    #[error("HTTP {status}: {body}")]
    BadStatus { status: u16, body: String },

    /// Executable could not be started
    #[error("Failed to run command: {0}")]
    Io(#[from] std::io::Error),

    /// Executable exited unsuccessfully
    #[error("Command exited with {status}: {output}")]
    ExitStatus { status: String, output: String },

    /// Delivery did not finish in time
    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    /// Invalid channel configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Response from sending a notification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryStatus {
    /// Whether the notification was successfully delivered
    pub success: bool,
    /// Channel that delivered (or failed to deliver) the notification
    pub channel: String,
    /// Optional message about the delivery
    pub message: Option<String>,
    /// Timestamp of delivery attempt
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl DeliveryStatus {
    /// Create a successful delivery status
    pub fn success(channel: impl Into<String>) -> Self {
        Self {
            success: true,
            channel: channel.into(),
            message: None,
            timestamp: chrono::Utc::now(),
        }
    }

    /// Create a successful delivery status with a message
    pub fn success_with_message(channel: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: true,
            channel: channel.into(),
            message: Some(message.into()),
            timestamp: chrono::Utc::now(),
        }
    }

    /// Create a failed delivery status
    pub fn failure(channel: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            channel: channel.into(),
            message: Some(message.into()),
            timestamp: chrono::Utc::now(),
        }
    }
}

impl fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = if self.success { "SUCCESS" } else { "FAILED" };
        write!(f, "[{status}] {}", self.channel)?;
        if let Some(msg) = &self.message {
            write!(f, ": {msg}")?;
        }
        Ok(())
    }
}

/// Trait for notification channels
///
/// A channel bounds its own delivery time; callers never wait longer than
/// the channel's configured timeout.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Get the channel name
    fn name(&self) -> &str;

    /// Deliver one mirror transition
    async fn send(&self, transition: &MirrorTransition) -> NotifyResult<DeliveryStatus>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delivery_status_success() {
        let status = DeliveryStatus::success("webhook");
        assert!(status.success);
        assert_eq!(status.channel, "webhook");
        assert!(status.message.is_none());
    }

    #[test]
    fn test_delivery_status_failure() {
        let status = DeliveryStatus::failure("exec", "Connection timeout");
        assert!(!status.success);
        assert_eq!(status.message, Some("Connection timeout".to_string()));
    }

    #[test]
    fn test_delivery_status_display() {
        let success = DeliveryStatus::success_with_message("webhook", "Delivered");
        assert_eq!(success.to_string(), "[SUCCESS] webhook: Delivered");

        let failure = DeliveryStatus::failure("exec", "exit status 1");
        assert!(failure.to_string().contains("FAILED"));
    }

    #[test]
    fn test_notify_error_messages() {
        let err = NotifyError::BadStatus {
            status: 503,
            body: "busy".to_string(),
        };
        assert_eq!(err.to_string(), "HTTP 503: busy");
        assert!(NotifyError::Timeout(Duration::from_secs(3))
            .to_string()
            .contains("3s"));
    }
}
