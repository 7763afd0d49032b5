//! mirrorselect - geo-aware package mirror selection
//!
//! Answers "which mirrors should this client use?" by combining a GeoIP
//! lookup of the client address with the live health of every mirror.
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - [`config`] - Configuration and mirror list loading
//! - [`models`] - Core data structures and types
//! - [`registry`] - Shared table of mirrors and their status
//! - [`workerpool`] - Bounded-concurrency task execution
//! - [`monitor`] - Periodic reachability probing with hysteresis
//! - [`geo`] - Client geolocation and mirror ranking
//! - [`notifications`] - Delivery of mirror UP/DOWN events
//! - [`server`] - HTTP endpoints
//! - [`metrics`] - Prometheus metrics
//!
//! # Example
//!
//! ```no_run
//! use mirrorselect::config::{load_mirror_list, Config};
//! use mirrorselect::geo::select;
//! use mirrorselect::registry::MirrorRegistry;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = Config::load("mirrorselect.toml".as_ref())?;
//! let registry = MirrorRegistry::new(load_mirror_list(&config.mirror_list)?)?;
//!
//! let snapshot = registry.snapshot().await;
//! let selection = select(None, &snapshot);
//! assert_eq!(selection.mirrors.last().map(|m| m.is_default), Some(true));
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod geo;
pub mod metrics;
pub mod models;
pub mod monitor;
pub mod notifications;
pub mod registry;
pub mod server;
pub mod workerpool;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::geo::{select, GeoLocator, Selection, SelectionTier};
    pub use crate::models::{Location, MirrorEvent, MirrorRecord, MirrorUrl};
    pub use crate::monitor::{HealthMonitor, Prober};
    pub use crate::registry::{MirrorRegistry, RegistrySnapshot};
    pub use crate::workerpool::WorkerPool;
}

// Direct re-exports for convenience
pub use models::{Location, MirrorRecord, MirrorStatus};
