//! HTTP handlers
//!
//! Plain-text endpoints (`/ping`, `/ip`, `/pkg/...`) keep the line-oriented
//! format package tools already parse; status endpoints answer JSON.

use axum::{
    extract::{ConnectInfo, FromRequestParts, Path, State},
    http::{header, request::Parts, HeaderMap, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::net::{IpAddr, SocketAddr};

use super::AppState;
use crate::geo::select;
use crate::metrics;
use crate::models::MirrorRecord;
use crate::registry::RegistryStats;

const INVALID_CLIENT_IP: &str = "Invalid client IP!\n";

// ============================================================================
// API Response Types
// ============================================================================

/// Generic API response wrapper
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}

/// Overall service health
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl HealthStatus {
    pub fn from_stats(stats: &RegistryStats) -> Self {
        if stats.online == 0 {
            Self::Unhealthy
        } else if stats.offline > 0 {
            Self::Degraded
        } else {
            Self::Healthy
        }
    }
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub version: String,
    pub uptime_secs: u64,
    pub mirrors: RegistryStats,
}

// ============================================================================
// Client Address
// ============================================================================

/// Address of the requesting client
///
/// The TCP peer address, or the first `X-Forwarded-For` entry when the
/// server is configured to trust it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientIp(pub IpAddr);

impl FromRequestParts<AppState> for ClientIp {
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip());

        client_ip(&parts.headers, peer, state.config.trust_forwarded_for)
            .map(ClientIp)
            .ok_or((StatusCode::BAD_REQUEST, INVALID_CLIENT_IP))
    }
}

fn client_ip(headers: &HeaderMap, peer: Option<IpAddr>, trust_forwarded: bool) -> Option<IpAddr> {
    if trust_forwarded {
        if let Some(value) = headers.get("x-forwarded-for") {
            let first = value.to_str().ok()?.split(',').next()?.trim();
            return match first.parse() {
                Ok(ip) => Some(ip),
                Err(_) => {
                    tracing::debug!(forwarded_for = %first, "Invalid client IP");
                    None
                }
            };
        }
    }
    peer
}

// ============================================================================
// API Routes
// ============================================================================

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(ping))
        .route("/ping", get(ping))
        .route("/ip", get(client_info))
        .route("/mirror", get(list_mirrors))
        .route("/mirrors", get(list_mirrors))
        .route("/pkg/{abi}/{*path}", get(pkg_mirrors))
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}

// ============================================================================
// Handlers
// ============================================================================

async fn ping() -> &'static str {
    "pong\n"
}

/// Client IP and resolved location
async fn client_info(State(state): State<AppState>, ClientIp(ip): ClientIp) -> String {
    let mut info = format!("IP: {ip}\n");
    match state.locator.locate(ip) {
        None => info.push_str("Location: unknown\n"),
        Some(location) => {
            let _ = write!(
                info,
                "Location:\nContinent: {}\nCountry: {}\nLatitude: {}\nLongitude: {}\n",
                location.continent_code,
                location.country_code,
                location.latitude,
                location.longitude
            );
        }
    }
    info
}

/// Every mirror with its status, keyed by name
async fn list_mirrors(State(state): State<AppState>) -> Json<BTreeMap<String, MirrorRecord>> {
    let snapshot = state.registry.snapshot().await;
    Json(
        snapshot
            .iter()
            .map(|m| (m.name.clone(), m.clone()))
            .collect(),
    )
}

/// Ranked package URLs for the requesting client
async fn pkg_mirrors(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    Path((abi, path)): Path<(String, String)>,
) -> String {
    let location = state.locator.locate(ip);
    let snapshot = state.registry.snapshot().await;
    let selection = select(location.as_ref(), &snapshot);

    tracing::debug!(
        ip = %ip,
        location = ?location,
        tier = selection.tier.as_str(),
        mirrors = ?selection.names(),
        "Selected mirrors"
    );
    metrics::record_selection(selection.tier.as_str());

    selection
        .urls(&abi, &path)
        .into_iter()
        .fold(String::new(), |mut body, url| {
            let _ = writeln!(body, "URL: {url}");
            body
        })
}

/// Health summary; 503 when no mirror is online
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let stats = state.registry.stats().await;
    let status = HealthStatus::from_stats(&stats);
    let code = match status {
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::OK,
    };

    (
        code,
        Json(ApiResponse::success(HealthResponse {
            status,
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_secs: state.start_time.elapsed().as_secs(),
            mirrors: stats,
        })),
    )
}

async fn metrics_handler() -> impl IntoResponse {
    match metrics::encode_metrics() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            [(header::CONTENT_TYPE, "text/plain")],
            format!("Failed to encode metrics: {e}\n"),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(forwarded: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_str(forwarded).unwrap());
        headers
    }

    #[test]
    fn test_client_ip_from_peer() {
        let peer: IpAddr = "192.0.2.7".parse().unwrap();
        assert_eq!(client_ip(&HeaderMap::new(), Some(peer), true), Some(peer));
        assert_eq!(client_ip(&headers("198.51.100.1"), Some(peer), false), Some(peer));
    }

    #[test]
    fn test_client_ip_from_forwarded_for() {
        let peer: IpAddr = "10.0.0.1".parse().unwrap();
        let ip = client_ip(&headers("203.0.113.9, 10.0.0.2"), Some(peer), true);
        assert_eq!(ip, Some("203.0.113.9".parse().unwrap()));
    }

    #[test]
    fn test_invalid_forwarded_for() {
        let peer: IpAddr = "10.0.0.1".parse().unwrap();
        assert_eq!(client_ip(&headers("not-an-ip"), Some(peer), true), None);
    }

    #[test]
    fn test_health_status() {
        let mut stats = RegistryStats {
            total_mirrors: 2,
            online: 2,
            offline: 0,
            default_online: true,
            total_ok: 0,
            total_errors: 0,
            last_checked: None,
        };
        assert_eq!(HealthStatus::from_stats(&stats), HealthStatus::Healthy);

        stats.online = 1;
        stats.offline = 1;
        assert_eq!(HealthStatus::from_stats(&stats), HealthStatus::Degraded);

        stats.online = 0;
        stats.offline = 2;
        assert_eq!(HealthStatus::from_stats(&stats), HealthStatus::Unhealthy);
    }
}
