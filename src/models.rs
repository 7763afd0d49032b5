//! Core data structures shared across mirrorselect
//!
//! This module defines the mirror records held by the registry, their
//! health status, client locations and the events emitted when a mirror
//! changes state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use url::{Position, Url};

use crate::config::ConfigError;

// ============================================================================
// Mirror URL
// ============================================================================

/// Protocols a mirror may be served over
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MirrorScheme {
    Http,
    Https,
    Ftp,
}

impl MirrorScheme {
    /// Parse a URL scheme, rejecting anything that cannot be probed
    pub fn from_scheme(scheme: &str) -> Option<Self> {
        match scheme {
            "http" => Some(Self::Http),
            "https" => Some(Self::Https),
            "ftp" => Some(Self::Ftp),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Https => "https",
            Self::Ftp => "ftp",
        }
    }
}

impl fmt::Display for MirrorScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated mirror base URL
///
/// Always ends with a slash (some mirrors answer 404 without it) and always
/// carries one of the supported schemes, so the probe path never has to deal
/// with an unknown protocol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorUrl {
    url: Url,
    scheme: MirrorScheme,
}

impl MirrorUrl {
    /// Parse and normalize a mirror URL
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let mut url = Url::parse(raw.trim()).map_err(|e| ConfigError::InvalidUrl {
            url: raw.to_string(),
            reason: e.to_string(),
        })?;

        // The slash belongs to the path, before any query or fragment
        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }

        let scheme = MirrorScheme::from_scheme(url.scheme())
            .ok_or_else(|| ConfigError::UnsupportedScheme {
                url: raw.to_string(),
                scheme: url.scheme().to_string(),
            })?;

        if url.host_str().map_or(true, str::is_empty) {
            return Err(ConfigError::InvalidUrl {
                url: raw.to_string(),
                reason: "missing host".to_string(),
            });
        }

        Ok(Self { url, scheme })
    }

    pub fn scheme(&self) -> MirrorScheme {
        self.scheme
    }

    pub fn as_url(&self) -> &Url {
        &self.url
    }

    pub fn as_str(&self) -> &str {
        self.url.as_str()
    }

    /// Build the URL of a file below this mirror
    ///
    /// `mirror_url("https://m.example/dports/").join_path("x86_64", "/All/pkg.txz")`
    /// yields `https://m.example/dports/x86_64/All/pkg.txz`.
    pub fn join_path(&self, abi: &str, path: &str) -> String {
        let abi = abi.trim_matches('/');
        let path = path.trim_start_matches('/');
        let base = &self.url[..Position::AfterPath];
        let tail = &self.url[Position::AfterPath..];
        if abi.is_empty() {
            format!("{base}{path}{tail}")
        } else {
            format!("{base}{abi}/{path}{tail}")
        }
    }
}

impl fmt::Display for MirrorUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.url.as_str())
    }
}

impl Serialize for MirrorUrl {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.url.as_str())
    }
}

// ============================================================================
// Locations
// ============================================================================

/// A latitude/longitude pair in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// Geographic location of a client, as resolved by a geolocation database
///
/// An unresolvable client is represented as `Option::<Location>::None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    /// Two-letter continent code (e.g. "EU")
    pub continent_code: String,
    /// ISO 3166-1 alpha-2 country code (e.g. "DE")
    pub country_code: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl Location {
    pub fn new(
        continent_code: impl Into<String>,
        country_code: impl Into<String>,
        latitude: f64,
        longitude: f64,
    ) -> Self {
        Self {
            continent_code: continent_code.into(),
            country_code: country_code.into(),
            latitude,
            longitude,
        }
    }

    pub fn point(&self) -> GeoPoint {
        GeoPoint::new(self.latitude, self.longitude)
    }
}

// ============================================================================
// Mirror Status
// ============================================================================

/// Health state of one mirror, owned by the health monitor
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MirrorStatus {
    /// Whether the mirror is currently offered to clients
    pub online: bool,

    /// Total number of successful probes
    pub ok_count: u64,

    /// Total number of failed probes
    pub error_count: u64,

    /// Consecutive probes disagreeing with `online`
    pub hysteresis: u32,

    /// When the last probe result was applied
    pub last_checked: Option<DateTime<Utc>>,
}

impl Default for MirrorStatus {
    fn default() -> Self {
        Self {
            online: true,
            ok_count: 0,
            error_count: 0,
            hysteresis: 0,
            last_checked: None,
        }
    }
}

// ============================================================================
// Mirror Record
// ============================================================================

/// A mirror as loaded from the mirror list, plus its live status
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MirrorRecord {
    pub name: String,
    #[serde(rename = "default")]
    pub is_default: bool,
    pub url: MirrorUrl,
    pub continent_code: String,
    pub country_code: String,
    pub latitude: f64,
    pub longitude: f64,
    pub status: MirrorStatus,
}

impl MirrorRecord {
    pub fn point(&self) -> GeoPoint {
        GeoPoint::new(self.latitude, self.longitude)
    }

    pub fn is_online(&self) -> bool {
        self.status.online
    }
}

// ============================================================================
// Events
// ============================================================================

/// A confirmed change of a mirror's online state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MirrorEvent {
    Up,
    Down,
}

impl MirrorEvent {
    /// Event for a mirror that is now `online`
    pub fn from_online(online: bool) -> Self {
        if online {
            Self::Up
        } else {
            Self::Down
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Up => "UP",
            Self::Down => "DOWN",
        }
    }
}

impl fmt::Display for MirrorEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A mirror whose state flipped during a monitoring cycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MirrorTransition {
    pub mirror: String,
    pub url: String,
    pub event: MirrorEvent,
    pub occurred_at: DateTime<Utc>,
}
