use anyhow::{Context, Result};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use mirrorselect::config::Config;
use mirrorselect::metrics;
use mirrorselect::monitor::{HealthMonitor, NetworkProber};
use mirrorselect::notifications::{build_notifiers, NotificationDispatcher};
use mirrorselect::server::MirrorServer;

use super::{load_registry, open_locator};

/// Run the HTTP server with the monitor and notifications until shutdown
pub async fn serve(config: Config) -> Result<()> {
    let registry = load_registry(&config)?;
    let locator = open_locator(&config.geoip)?;

    if let Err(e) = metrics::init_metrics() {
        tracing::warn!(error = %e, "Failed to initialize metrics");
    }
    registry.publish_metrics().await;

    let cancel = CancellationToken::new();
    tokio::spawn(watch_signals(cancel.clone()));

    // Notifications
    let mut notifier_task = None;
    let mut notification_handle = None;
    if config.notify.has_channels() {
        let notifiers = build_notifiers(&config.notify).context("Invalid notification config")?;
        let (handle, worker) = NotificationDispatcher::new(notifiers)
            .spawn(config.notify.queue_capacity, cancel.clone());
        notification_handle = Some(handle);
        notifier_task = Some(worker);
    }

    // Monitor
    let mut monitor_task = None;
    if config.monitor.enabled {
        if !config.monitor.tls_verify {
            tracing::warn!("TLS certificate verification is disabled for mirror probes");
        }

        let prober = NetworkProber::new(&config.monitor).context("Failed to build prober")?;
        let mut monitor = HealthMonitor::new(Arc::clone(&registry), Arc::new(prober), &config.monitor);
        if let Some(handle) = notification_handle {
            monitor = monitor.with_notifications(handle);
        }
        monitor_task = Some(Arc::new(monitor).start(cancel.clone()));
    } else {
        tracing::warn!("Mirror monitoring disabled, every mirror is treated as online");
    }

    println!("mirrorselect");
    println!("============");
    println!("Mirrors: {}", registry.len().await);
    println!("Default: {}", registry.default_name());
    println!("Listen: http://{}", config.server.listen);
    println!();
    println!("Endpoints:");
    println!("  GET /ping");
    println!("  GET /ip");
    println!("  GET /mirrors");
    println!("  GET /pkg/{{abi}}/{{path}}");
    println!("  GET /health");
    println!("  GET /metrics");
    println!();
    println!("Press Ctrl+C to stop");

    let server = MirrorServer::new(config.server.clone(), Arc::clone(&registry), locator);
    let served = server
        .start_with_shutdown(cancel.clone().cancelled_owned())
        .await;

    // Stop the background tasks whether the server exited cleanly or not
    cancel.cancel();

    if let Some(task) = monitor_task {
        if let Err(e) = task.await {
            tracing::error!(error = %e, "Monitor task failed");
        }
    }
    if let Some(task) = notifier_task {
        if let Err(e) = task.await {
            tracing::error!(error = %e, "Notification task failed");
        }
    }

    served.context("Server failed")?;

    println!("\n{}", registry.stats().await.display());
    Ok(())
}

/// Cancel `cancel` on Ctrl+C or SIGTERM
async fn watch_signals(cancel: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C, shutting down"),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down"),
        _ = cancel.cancelled() => return,
    }

    cancel.cancel();
}
