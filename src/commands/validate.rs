use anyhow::Result;

use mirrorselect::config::Config;

use super::{load_registry, open_locator};

/// Check that the configuration, mirror list and GeoIP database all load
pub async fn validate(config: Config) -> Result<()> {
    let registry = load_registry(&config)?;
    open_locator(&config.geoip)?;

    let snapshot = registry.snapshot().await;

    println!("Configuration OK");
    println!("================");
    println!("Mirror list: {}", config.mirror_list.display());
    match &config.geoip.mmdb_file {
        Some(path) => println!("GeoIP database: {} ({:?})", path.display(), config.geoip.mmdb_type),
        None => println!("GeoIP database: none"),
    }
    println!("Listen: {}", config.server.listen);
    println!(
        "Monitor: {} (every {}s, timeout {}s, hysteresis {}, {} workers)",
        if config.monitor.enabled { "enabled" } else { "disabled" },
        config.monitor.interval_secs,
        config.monitor.timeout_secs,
        config.monitor.hysteresis,
        config.monitor.workers
    );
    println!(
        "Notifications: exec={} webhook={}",
        config.notify.exec.as_ref().map(|p| p.display().to_string()).unwrap_or_else(|| "none".to_string()),
        config.notify.webhook_url.as_deref().unwrap_or("none")
    );

    println!("\nMirrors");
    println!("-------");
    for mirror in snapshot.iter() {
        println!(
            "{:<20} {}/{}  {}{}",
            mirror.name,
            mirror.continent_code,
            mirror.country_code,
            mirror.url,
            if mirror.is_default { " (default)" } else { "" }
        );
    }

    println!("\n{}", registry.stats().await.display());
    Ok(())
}
