pub mod check;
pub mod locate;
pub mod serve;
pub mod validate;

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;

use mirrorselect::config::{load_mirror_list, Config, GeoIpConfig};
use mirrorselect::geo::{GeoLocator, MmdbLocator, NullLocator};
use mirrorselect::registry::MirrorRegistry;

// Re-export command functions for convenience
pub use check::check;
pub use locate::locate;
pub use serve::serve;
pub use validate::validate;

/// Load and validate the configuration file
pub fn load_config(path: &Path) -> Result<Config> {
    Config::load(path).with_context(|| format!("Failed to load config {}", path.display()))
}

/// Load the mirror list named by the configuration into a registry
pub fn load_registry(config: &Config) -> Result<Arc<MirrorRegistry>> {
    let records = load_mirror_list(&config.mirror_list).with_context(|| {
        format!("Failed to load mirror list {}", config.mirror_list.display())
    })?;
    let registry = MirrorRegistry::new(records).context("Invalid mirror list")?;
    Ok(Arc::new(registry))
}

/// Open the configured GeoIP database, or a locator that knows nothing
pub fn open_locator(config: &GeoIpConfig) -> Result<Arc<dyn GeoLocator>> {
    match &config.mmdb_file {
        Some(path) => {
            let locator = MmdbLocator::open(path, config.mmdb_type)
                .with_context(|| format!("Failed to open GeoIP database {}", path.display()))?;
            tracing::info!(path = %path.display(), kind = ?config.mmdb_type, "GeoIP database loaded");
            Ok(Arc::new(locator))
        }
        None => {
            tracing::warn!("No GeoIP database configured, every client gets the default mirror");
            Ok(Arc::new(NullLocator))
        }
    }
}
