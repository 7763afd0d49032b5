//! Notifications for mirror state changes
//!
//! # Architecture
//!
//! ```text
//!   HealthMonitor ── try_send ──▶ bounded queue
//!                                     │
//!                                     ▼
//!                         NotificationDispatcher
//!                                     │
//!                         ┌───────────┴───────────┐
//!                         ▼                       ▼
//!                   ┌──────────┐            ┌──────────┐
//!                   │   Exec   │            │ Webhook  │
//!                   │ Notifier │            │ Notifier │
//!                   └──────────┘            └──────────┘
//! ```
//!
//! The monitor never waits on delivery. Each channel bounds its own
//! delivery time and failures are only logged.

pub mod channels;
mod dispatcher;

use std::sync::Arc;

use crate::config::NotifyConfig;

pub use channels::{
    DeliveryStatus, ExecNotifier, Notifier, NotifyError, NotifyResult, WebhookConfig,
    WebhookNotifier,
};
pub use dispatcher::{NotificationDispatcher, NotificationHandle};

/// Build every channel configured in the `[notify]` section
pub fn build_notifiers(config: &NotifyConfig) -> NotifyResult<Vec<Arc<dyn Notifier>>> {
    let mut notifiers: Vec<Arc<dyn Notifier>> = Vec::new();

    if let Some(program) = &config.exec {
        notifiers.push(Arc::new(ExecNotifier::new(
            program.clone(),
            config.exec_timeout(),
        )));
    }

    if let Some(webhook) = WebhookConfig::from_notify(config) {
        notifiers.push(Arc::new(WebhookNotifier::new(webhook)?));
    }

    Ok(notifiers)
}
