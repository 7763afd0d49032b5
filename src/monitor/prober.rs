//! Mirror reachability probes
//!
//! One probe is exactly one network attempt against a mirror base URL:
//! - http/https: `GET` must end (after redirects) with status 200.
//! - ftp: anonymous login and `CWD` into the mirror path must succeed.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::{Client, StatusCode};
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

use super::ftp;
use crate::config::MonitorConfig;
use crate::models::{MirrorScheme, MirrorUrl};

/// Reasons a probe failed
#[derive(Error, Debug)]
pub enum ProbeError {
    /// Transport-level HTTP failure
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Server answered with something other than 200
    #[error("Status code ({0}) != OK")]
    BadStatus(u16),

    /// The probe did not finish in time
    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    /// Socket error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// FTP server rejected a step
    #[error("FTP {command} failed: {code} {message}")]
    FtpReply {
        command: String,
        code: u16,
        message: String,
    },

    /// FTP server sent something unexpected
    #[error("FTP protocol error: {0}")]
    FtpProtocol(String),

    /// URL has no host to connect to
    #[error("URL has no host")]
    MissingHost,
}

/// Result of one probe
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProbeOutcome {
    pub reachable: bool,
    /// Why the mirror was unreachable
    pub cause: Option<String>,
}

impl ProbeOutcome {
    pub fn reachable() -> Self {
        Self {
            reachable: true,
            cause: None,
        }
    }

    pub fn unreachable(cause: impl Into<String>) -> Self {
        Self {
            reachable: false,
            cause: Some(cause.into()),
        }
    }
}

impl From<Result<(), ProbeError>> for ProbeOutcome {
    fn from(result: Result<(), ProbeError>) -> Self {
        match result {
            Ok(()) => Self::reachable(),
            Err(e) => Self::unreachable(e.to_string()),
        }
    }
}

/// Checks whether a mirror is reachable
#[async_trait]
pub trait Prober: Send + Sync {
    async fn probe(&self, url: &MirrorUrl) -> ProbeOutcome;
}

/// Prober speaking HTTP(S) and FTP over the network
pub struct NetworkProber {
    client: Client,
    timeout: Duration,
}

impl NetworkProber {
    /// Build a prober from the monitor settings
    ///
    /// # Errors
    ///
    /// Returns `ProbeError::Http` if the HTTP client cannot be created
    pub fn new(config: &MonitorConfig) -> Result<Self, ProbeError> {
        let timeout = config.timeout();

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("*/*"));

        // Certificate checks can be skipped; SNI is still sent for the host.
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(config.user_agent.as_str())
            .default_headers(headers)
            .danger_accept_invalid_certs(!config.tls_verify)
            .build()?;

        Ok(Self { client, timeout })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn check_http(&self, url: &MirrorUrl) -> Result<(), ProbeError> {
        let response = self
            .client
            .get(url.as_url().clone())
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProbeError::Timeout(self.timeout)
                } else {
                    ProbeError::Http(e)
                }
            })?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(ProbeError::BadStatus(status.as_u16()));
        }
        Ok(())
    }
}

#[async_trait]
impl Prober for NetworkProber {
    async fn probe(&self, url: &MirrorUrl) -> ProbeOutcome {
        let result = match url.scheme() {
            MirrorScheme::Http | MirrorScheme::Https => self.check_http(url).await,
            MirrorScheme::Ftp => ftp::check(url.as_url(), self.timeout).await,
        };

        if let Err(e) = &result {
            tracing::debug!(url = %url, error = %e, "Probe failed");
        }
        result.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_from_result() {
        assert_eq!(ProbeOutcome::from(Ok(())), ProbeOutcome::reachable());

        let outcome = ProbeOutcome::from(Err(ProbeError::BadStatus(404)));
        assert!(!outcome.reachable);
        assert_eq!(outcome.cause.as_deref(), Some("Status code (404) != OK"));
    }

    #[test]
    fn test_prober_builds_with_insecure_tls() {
        let mut config = MonitorConfig::default();
        config.tls_verify = false;
        let prober = NetworkProber::new(&config).unwrap();
        assert_eq!(prober.timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_ftp_reply_message() {
        let err = ProbeError::FtpReply {
            command: "CWD".to_string(),
            code: 550,
            message: "No such directory".to_string(),
        };
        assert_eq!(err.to_string(), "FTP CWD failed: 550 No such directory");
    }
}
