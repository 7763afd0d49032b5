use anyhow::{Context, Result};
use serde::Serialize;
use std::sync::Arc;

use mirrorselect::config::Config;
use mirrorselect::monitor::{NetworkProber, ProbeOutcome, Prober};
use mirrorselect::workerpool::{Task, WorkerPool};

use super::load_registry;

#[derive(Debug, Serialize)]
struct CheckRow {
    mirror: String,
    url: String,
    reachable: bool,
    cause: Option<String>,
    elapsed_ms: u128,
}

/// Probe every mirror once, outside of the monitor's hysteresis
pub async fn check(config: Config, json: bool) -> Result<()> {
    let registry = load_registry(&config)?;
    let prober: Arc<dyn Prober> =
        Arc::new(NetworkProber::new(&config.monitor).context("Failed to build prober")?);
    let pool = WorkerPool::new(config.monitor.workers);

    let targets = registry.targets().await;
    let tasks: Vec<Task<ProbeOutcome>> = targets
        .iter()
        .map(|(name, url)| {
            let prober = Arc::clone(&prober);
            let url = url.clone();
            Task::new(name.clone(), async move { Ok(prober.probe(&url).await) })
        })
        .collect();

    let rows: Vec<CheckRow> = pool
        .run(tasks)
        .await
        .into_iter()
        .zip(targets.iter())
        .map(|(report, (_, url))| {
            let outcome = report
                .result
                .unwrap_or_else(|e| ProbeOutcome::unreachable(e.to_string()));
            CheckRow {
                mirror: report.label,
                url: url.to_string(),
                reachable: outcome.reachable,
                cause: outcome.cause,
                elapsed_ms: report.elapsed.as_millis(),
            }
        })
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    println!("Mirror Check");
    println!("============");
    for row in &rows {
        let status = if row.reachable { "UP" } else { "DOWN" };
        println!("{:<20} {:<5} {:>6}ms  {}", row.mirror, status, row.elapsed_ms, row.url);
        if let Some(cause) = &row.cause {
            println!("{:<20} {}", "", cause);
        }
    }

    let up = rows.iter().filter(|r| r.reachable).count();
    println!("\n{up}/{} mirrors reachable", rows.len());

    Ok(())
}
