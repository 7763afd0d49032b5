//! Periodic mirror health monitoring
//!
//! Every cycle probes all mirrors through the worker pool, applies the
//! results to the registry under one write lock, hands confirmed
//! transitions to the notification queue and then sleeps for the configured
//! interval. The first cycle runs immediately.
//!
//! Cancellation is honoured both between cycles and inside a cycle; a
//! cancelled cycle leaves the registry untouched.

pub mod ftp;
pub mod hysteresis;
pub mod prober;

use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::MonitorConfig;
use crate::metrics;
use crate::models::{MirrorEvent, MirrorTransition};
use crate::notifications::NotificationHandle;
use crate::registry::MirrorRegistry;
use crate::workerpool::{Task, TaskError, WorkerPool};

pub use prober::{NetworkProber, ProbeError, ProbeOutcome, Prober};

/// Summary of one monitoring cycle
#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub probed: usize,
    pub reachable: usize,
    pub unreachable: usize,
    pub transitions: Vec<MirrorTransition>,
    pub elapsed: Duration,
    /// The cycle was cancelled and its results discarded
    pub cancelled: bool,
}

impl CycleReport {
    fn cancelled(probed: usize, elapsed: Duration) -> Self {
        Self {
            probed,
            reachable: 0,
            unreachable: 0,
            transitions: Vec::new(),
            elapsed,
            cancelled: true,
        }
    }
}

/// Drives periodic probing of every mirror in the registry
pub struct HealthMonitor {
    registry: Arc<MirrorRegistry>,
    prober: Arc<dyn Prober>,
    pool: WorkerPool,
    interval: Duration,
    hysteresis: u32,
    notifications: Option<NotificationHandle>,
}

impl HealthMonitor {
    pub fn new(registry: Arc<MirrorRegistry>, prober: Arc<dyn Prober>, config: &MonitorConfig) -> Self {
        Self {
            registry,
            prober,
            pool: WorkerPool::new(config.workers),
            interval: config.interval(),
            hysteresis: config.hysteresis.max(1),
            notifications: None,
        }
    }

    /// Forward confirmed transitions to a notification queue
    pub fn with_notifications(mut self, handle: NotificationHandle) -> Self {
        self.notifications = Some(handle);
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Start the monitoring loop as a background task
    pub fn start(self: Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move { self.run(cancel).await })
    }

    /// Run cycles until `cancel` fires
    pub async fn run(&self, cancel: CancellationToken) {
        tracing::info!(
            interval_secs = self.interval.as_secs(),
            hysteresis = self.hysteresis,
            workers = self.pool.concurrency(),
            "Mirror monitor started"
        );

        loop {
            let report = self.run_cycle(&cancel).await;
            if report.cancelled {
                break;
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }

        tracing::info!("Mirror monitor stopped");
    }

    /// Probe every mirror once and apply the results
    pub async fn run_cycle(&self, cancel: &CancellationToken) -> CycleReport {
        let started = Instant::now();
        let targets = self.registry.targets().await;
        let probed = targets.len();

        let tasks: Vec<Task<ProbeOutcome>> = targets
            .iter()
            .map(|(name, url)| {
                let prober = Arc::clone(&self.prober);
                let cancel = cancel.clone();
                let url = url.clone();
                Task::new(name.clone(), async move {
                    tokio::select! {
                        _ = cancel.cancelled() => Err(TaskError::Cancelled),
                        outcome = prober.probe(&url) => Ok(outcome),
                    }
                })
            })
            .collect();

        let reports = self.pool.run(tasks).await;

        if cancel.is_cancelled() {
            tracing::info!(probed, "Monitoring cycle cancelled, discarding results");
            return CycleReport::cancelled(probed, started.elapsed());
        }

        let mut results = Vec::with_capacity(reports.len());
        for (report, (_, url)) in reports.iter().zip(&targets) {
            let reachable = match &report.result {
                Ok(outcome) => {
                    if let Some(cause) = &outcome.cause {
                        tracing::debug!(mirror = %report.label, url = %url, cause = %cause, "Mirror unreachable");
                    }
                    outcome.reachable
                }
                Err(e) => {
                    tracing::warn!(mirror = %report.label, error = %e, "Probe task failed");
                    false
                }
            };
            metrics::record_probe(url.scheme().as_str(), reachable);
            results.push((report.label.clone(), reachable));
        }

        let transitions = self.registry.apply_results(&results, self.hysteresis).await;
        self.publish(&transitions);
        self.registry.publish_metrics().await;

        let reachable = results.iter().filter(|(_, ok)| *ok).count();
        let report = CycleReport {
            probed,
            reachable,
            unreachable: probed - reachable,
            transitions,
            elapsed: started.elapsed(),
            cancelled: false,
        };

        let stats = self.registry.stats().await;
        metrics::observe_cycle(report.elapsed.as_secs_f64(), stats.online);
        tracing::info!(
            probed = report.probed,
            reachable = report.reachable,
            unreachable = report.unreachable,
            transitions = report.transitions.len(),
            online = stats.online,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "Monitoring cycle finished"
        );

        report
    }

    fn publish(&self, transitions: &[MirrorTransition]) {
        for transition in transitions {
            match transition.event {
                MirrorEvent::Up => {
                    tracing::info!(mirror = %transition.mirror, url = %transition.url, "Mirror is UP")
                }
                MirrorEvent::Down => {
                    tracing::warn!(mirror = %transition.mirror, url = %transition.url, "Mirror is DOWN")
                }
            }
            metrics::record_transition(transition.event.as_str());

            if let Some(handle) = &self.notifications {
                handle.notify(transition.clone());
            }
        }
    }
}
