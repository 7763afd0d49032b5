//! HTTP server
//!
//! Wires the registry and the geolocator into the axum router and serves it
//! until the shutdown signal fires.

pub mod api;

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::ServerConfig;
use crate::geo::GeoLocator;
use crate::registry::MirrorRegistry;

pub use api::create_router;

// ============================================================================
// App State
// ============================================================================

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Mirror registry
    pub registry: Arc<MirrorRegistry>,

    /// Client geolocation
    pub locator: Arc<dyn GeoLocator>,

    /// Server start time
    pub start_time: Instant,

    /// Configuration
    pub config: ServerConfig,
}

impl AppState {
    pub fn new(
        registry: Arc<MirrorRegistry>,
        locator: Arc<dyn GeoLocator>,
        config: ServerConfig,
    ) -> Self {
        Self {
            registry,
            locator,
            start_time: Instant::now(),
            config,
        }
    }
}

// ============================================================================
// Mirror Server
// ============================================================================

/// HTTP front end answering mirror selection requests
pub struct MirrorServer {
    config: ServerConfig,
    state: AppState,
}

impl MirrorServer {
    pub fn new(
        config: ServerConfig,
        registry: Arc<MirrorRegistry>,
        locator: Arc<dyn GeoLocator>,
    ) -> Self {
        let state = AppState::new(registry, locator, config.clone());
        Self { config, state }
    }

    /// Get the application state
    pub fn state(&self) -> AppState {
        self.state.clone()
    }

    /// Build the router with all routes
    pub fn build_router(&self) -> Router {
        let mut router = create_router(self.state.clone());

        if self.config.enable_cors {
            router = router.layer(
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods(Any)
                    .allow_headers(Any),
            );
        }

        if self.config.enable_request_logging {
            router = router.layer(TraceLayer::new_for_http());
        }

        router
    }

    /// Serve until `shutdown_signal` resolves
    pub async fn start_with_shutdown(
        &self,
        shutdown_signal: impl Future<Output = ()> + Send + 'static,
    ) -> Result<(), ServerError> {
        let router = self.build_router();
        let addr = self.config.listen;

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::BindError(format!("{addr}: {e}")))?;

        tracing::info!(listen = %addr, "Mirror server listening");

        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal)
        .await
        .map_err(|e| ServerError::ServeError(e.to_string()))?;

        tracing::info!("Mirror server shutdown complete");
        Ok(())
    }
}

// ============================================================================
// Server Errors
// ============================================================================

/// Server errors
#[derive(Debug, Clone)]
pub enum ServerError {
    /// Failed to bind to address
    BindError(String),

    /// Server error
    ServeError(String),
}

impl std::fmt::Display for ServerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BindError(msg) => write!(f, "Failed to bind: {}", msg),
            Self::ServeError(msg) => write!(f, "Server error: {}", msg),
        }
    }
}

impl std::error::Error for ServerError {}
