//! Prometheus metrics for mirrorselect
//!
//! This module provides metrics tracking for:
//! - Monitor: probe results, mirror online state, transitions, cycle duration
//! - Selection: requests served per tier, notifications delivered
//!
//! # Usage
//!
//! Call `init_metrics()` at application startup to register all metrics.
//! If initialization fails, metrics operations become no-ops.

use prometheus::{
    register_counter_vec, register_gauge, register_gauge_vec, register_histogram,
    CounterVec, Encoder, Gauge, GaugeVec, Histogram, TextEncoder,
};
use std::sync::OnceLock;

// ============================================================================
// Metrics Storage
// ============================================================================

/// Container for all monitor metrics
struct MonitorMetrics {
    probes: CounterVec,
    mirror_online: GaugeVec,
    mirrors_online: Gauge,
    transitions: CounterVec,
    cycle_duration: Histogram,
}

/// Container for request-side metrics
struct ServiceMetrics {
    selections: CounterVec,
    notifications: CounterVec,
}

static MONITOR_METRICS: OnceLock<MonitorMetrics> = OnceLock::new();

static SERVICE_METRICS: OnceLock<ServiceMetrics> = OnceLock::new();

/// Outcome of the first initialization attempt
static METRICS_INIT: OnceLock<Result<(), String>> = OnceLock::new();

// ============================================================================
// Initialization
// ============================================================================

/// Initialize all Prometheus metrics
///
/// This function should be called once at application startup.
/// If metric registration fails, subsequent metric operations become no-ops.
///
/// # Example
///
/// ```ignore
/// if let Err(e) = mirrorselect::metrics::init_metrics() {
///     tracing::warn!("Metrics initialization failed: {}", e);
/// }
/// ```
pub fn init_metrics() -> Result<(), Box<dyn std::error::Error>> {
    // Concurrent callers block until the first attempt has finished
    METRICS_INIT
        .get_or_init(|| register_all().map_err(|e| e.to_string()))
        .clone()
        .map_err(Into::into)
}

fn register_all() -> Result<(), Box<dyn std::error::Error>> {
    let monitor = MonitorMetrics {
        probes: register_counter_vec!(
            "mirrorselect_probes_total",
            "Total mirror probes by scheme and result",
            &["scheme", "result"]
        )?,
        mirror_online: register_gauge_vec!(
            "mirrorselect_mirror_online",
            "Whether a mirror is online (1 = online, 0 = offline)",
            &["mirror"]
        )?,
        mirrors_online: register_gauge!(
            "mirrorselect_mirrors_online",
            "Number of mirrors currently online"
        )?,
        transitions: register_counter_vec!(
            "mirrorselect_transitions_total",
            "Confirmed mirror state changes by event",
            &["event"]
        )?,
        cycle_duration: register_histogram!(
            "mirrorselect_cycle_duration_seconds",
            "Time spent on one monitoring cycle in seconds",
            vec![0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0]
        )?,
    };

    let service = ServiceMetrics {
        selections: register_counter_vec!(
            "mirrorselect_selections_total",
            "Mirror selections served by tier",
            &["tier"]
        )?,
        notifications: register_counter_vec!(
            "mirrorselect_notifications_total",
            "Notification deliveries by channel and result",
            &["channel", "result"]
        )?,
    };

    MONITOR_METRICS
        .set(monitor)
        .map_err(|_| "Monitor metrics already initialized")?;
    SERVICE_METRICS
        .set(service)
        .map_err(|_| "Service metrics already initialized")?;

    tracing::info!("Prometheus metrics initialized successfully");
    Ok(())
}

/// Check if metrics have been initialized
pub fn metrics_initialized() -> bool {
    MONITOR_METRICS.get().is_some() && SERVICE_METRICS.get().is_some()
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Encode all metrics to Prometheus text format
pub fn encode_metrics() -> Result<String, Box<dyn std::error::Error>> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

/// Record one probe result
pub fn record_probe(scheme: &str, reachable: bool) {
    if let Some(m) = MONITOR_METRICS.get() {
        let result = if reachable { "ok" } else { "error" };
        m.probes.with_label_values(&[scheme, result]).inc();
    }
}

/// Set the online gauge of one mirror
pub fn set_mirror_online(mirror: &str, online: bool) {
    if let Some(m) = MONITOR_METRICS.get() {
        m.mirror_online
            .with_label_values(&[mirror])
            .set(if online { 1.0 } else { 0.0 });
    }
}

/// Record a confirmed transition
pub fn record_transition(event: &str) {
    if let Some(m) = MONITOR_METRICS.get() {
        m.transitions.with_label_values(&[event]).inc();
    }
}

/// Record a completed monitoring cycle
pub fn observe_cycle(duration_secs: f64, online: usize) {
    let Some(m) = MONITOR_METRICS.get() else {
        return;
    };

    m.cycle_duration.observe(duration_secs);
    m.mirrors_online.set(online as f64);
}

/// Record a served selection
pub fn record_selection(tier: &str) {
    if let Some(m) = SERVICE_METRICS.get() {
        m.selections.with_label_values(&[tier]).inc();
    }
}

/// Record a notification delivery attempt
pub fn record_notification(channel: &str, delivered: bool) {
    if let Some(m) = SERVICE_METRICS.get() {
        let result = if delivered { "delivered" } else { "failed" };
        m.notifications.with_label_values(&[channel, result]).inc();
    }
}

// ============================================================================
// Tests
// ============================================================================
