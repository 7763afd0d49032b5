//! Bounded notification queue and its delivery worker

use futures::future::join_all;
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::channels::Notifier;
use crate::metrics;
use crate::models::MirrorTransition;

/// Sending side of the notification queue
///
/// Never blocks: when the queue is full the event is dropped.
#[derive(Clone)]
pub struct NotificationHandle {
    tx: mpsc::Sender<MirrorTransition>,
}

impl NotificationHandle {
    /// Enqueue a transition; returns false when it was dropped
    pub fn notify(&self, transition: MirrorTransition) -> bool {
        match self.tx.try_send(transition) {
            Ok(()) => true,
            Err(TrySendError::Full(t)) => {
                tracing::warn!(
                    mirror = %t.mirror,
                    event = %t.event,
                    "Notification queue full, dropping event"
                );
                false
            }
            Err(TrySendError::Closed(t)) => {
                tracing::warn!(
                    mirror = %t.mirror,
                    event = %t.event,
                    "Notification worker stopped, dropping event"
                );
                false
            }
        }
    }
}

/// Delivers queued transitions to every configured channel
pub struct NotificationDispatcher {
    notifiers: Vec<Arc<dyn Notifier>>,
}

impl NotificationDispatcher {
    pub fn new(notifiers: Vec<Arc<dyn Notifier>>) -> Self {
        Self { notifiers }
    }

    pub fn channel_names(&self) -> Vec<&str> {
        self.notifiers.iter().map(|n| n.name()).collect()
    }

    /// Start the delivery worker
    ///
    /// The worker stops when `cancel` fires or every handle is dropped.
    pub fn spawn(
        self,
        capacity: usize,
        cancel: CancellationToken,
    ) -> (NotificationHandle, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::channel(capacity.max(1));

        let worker = tokio::spawn(async move {
            tracing::info!(
                channels = ?self.channel_names(),
                capacity,
                "Notification worker started"
            );

            loop {
                let transition = tokio::select! {
                    _ = cancel.cancelled() => break,
                    next = rx.recv() => match next {
                        Some(transition) => transition,
                        None => break,
                    },
                };
                self.deliver(&transition).await;
            }

            tracing::info!("Notification worker stopped");
        });

        (NotificationHandle { tx }, worker)
    }

    /// Send one transition to all channels concurrently
    ///
    /// Failures are logged and never propagated.
    pub async fn deliver(&self, transition: &MirrorTransition) {
        let sends = self.notifiers.iter().map(|notifier| async move {
            match notifier.send(transition).await {
                Ok(status) => {
                    tracing::debug!(status = %status, "Notification delivered");
                    metrics::record_notification(notifier.name(), true);
                }
                Err(e) => {
                    tracing::error!(
                        channel = notifier.name(),
                        mirror = %transition.mirror,
                        event = %transition.event,
                        error = %e,
                        "Notification failed"
                    );
                    metrics::record_notification(notifier.name(), false);
                }
            }
        });

        join_all(sends).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MirrorEvent;
    use crate::notifications::channels::{DeliveryStatus, NotifyError, NotifyResult};
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<(String, MirrorEvent)>>,
    }

    #[async_trait]
    impl Notifier for Recorder {
        fn name(&self) -> &str {
            "recorder"
        }

        async fn send(&self, transition: &MirrorTransition) -> NotifyResult<DeliveryStatus> {
            self.seen
                .lock()
                .unwrap()
                .push((transition.mirror.clone(), transition.event));
            Ok(DeliveryStatus::success(self.name()))
        }
    }

    struct Failing;

    #[async_trait]
    impl Notifier for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        async fn send(&self, _transition: &MirrorTransition) -> NotifyResult<DeliveryStatus> {
            Err(NotifyError::Timeout(Duration::from_secs(1)))
        }
    }

    fn transition(mirror: &str, event: MirrorEvent) -> MirrorTransition {
        MirrorTransition {
            mirror: mirror.to_string(),
            url: format!("https://{mirror}.example.org/"),
            event,
            occurred_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_delivers_in_order_despite_failing_channel() {
        let recorder = Arc::new(Recorder::default());
        let notifiers: Vec<Arc<dyn Notifier>> = vec![recorder.clone(), Arc::new(Failing)];
        let dispatcher = NotificationDispatcher::new(notifiers);
        let cancel = CancellationToken::new();
        let (handle, worker) = dispatcher.spawn(8, cancel.clone());

        assert!(handle.notify(transition("a", MirrorEvent::Down)));
        assert!(handle.notify(transition("b", MirrorEvent::Up)));
        drop(handle);
        worker.await.unwrap();

        let seen = recorder.seen.lock().unwrap().clone();
        assert_eq!(
            seen,
            vec![
                ("a".to_string(), MirrorEvent::Down),
                ("b".to_string(), MirrorEvent::Up),
            ]
        );
    }

    #[tokio::test]
    async fn test_full_queue_drops_events() {
        let (tx, _rx) = mpsc::channel(1);
        let handle = NotificationHandle { tx };

        assert!(handle.notify(transition("a", MirrorEvent::Down)));
        assert!(!handle.notify(transition("b", MirrorEvent::Down)));
    }

    #[tokio::test]
    async fn test_cancel_stops_worker() {
        let dispatcher = NotificationDispatcher::new(Vec::new());
        let cancel = CancellationToken::new();
        let (handle, worker) = dispatcher.spawn(4, cancel.clone());

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(1), worker)
            .await
            .expect("worker did not stop")
            .unwrap();

        assert!(!handle.notify(transition("a", MirrorEvent::Up)));
    }
}
