//! FTP reachability check on top of `suppaftp`
//!
//! Greeting, anonymous login, `CWD` into the mirror path, `QUIT`.
//! No data connection is ever opened.

use percent_encoding::percent_decode_str;
use std::time::Duration;
use suppaftp::tokio::AsyncFtpStream;
use suppaftp::FtpError;
use url::Url;

use super::prober::ProbeError;

/// Default FTP control port
pub const DEFAULT_PORT: u16 = 21;

const ANONYMOUS: &str = "anonymous";

/// Check an FTP mirror: log in anonymously, change into the URL path, quit
///
/// The whole session, connect included, is bounded by `timeout`.
pub async fn check(url: &Url, timeout: Duration) -> Result<(), ProbeError> {
    tokio::time::timeout(timeout, session(url))
        .await
        .map_err(|_| ProbeError::Timeout(timeout))?
}

async fn session(url: &Url) -> Result<(), ProbeError> {
    let host = url.host_str().ok_or(ProbeError::MissingHost)?;
    let port = url.port().unwrap_or(DEFAULT_PORT);

    let mut ftp = AsyncFtpStream::connect((host, port))
        .await
        .map_err(|e| step_error("greeting", e))?;

    ftp.login(ANONYMOUS, ANONYMOUS)
        .await
        .map_err(|e| step_error("login", e))?;

    let dir = decoded_path(url);
    ftp.cwd(&dir).await.map_err(|e| step_error("CWD", e))?;

    ftp.quit().await.map_err(|e| step_error("QUIT", e))?;

    Ok(())
}

/// Percent-decoded URL path, `/` when empty
fn decoded_path(url: &Url) -> String {
    let path = percent_decode_str(url.path()).decode_utf8_lossy();
    if path.is_empty() {
        "/".to_string()
    } else {
        path.into_owned()
    }
}

/// Attach the session step to a `suppaftp` failure
fn step_error(step: &str, err: FtpError) -> ProbeError {
    match err {
        FtpError::ConnectionError(e) => ProbeError::Io(e),
        FtpError::UnexpectedResponse(response) => {
            let text = response.as_string().unwrap_or_default();
            // Codes suppaftp has no name for come back as status 0; the
            // body still starts with the raw "550 " / "550-" prefix.
            let code = text
                .get(..3)
                .and_then(|digits| digits.parse().ok())
                .unwrap_or_else(|| u16::try_from(response.status.code()).unwrap_or(0));
            ProbeError::FtpReply {
                command: step.to_string(),
                code,
                message: text.get(4..).unwrap_or_default().to_string(),
            }
        }
        FtpError::BadResponse => ProbeError::FtpProtocol(format!("malformed reply to {step}")),
        other => ProbeError::FtpProtocol(format!("{step}: {other}")),
    }
}
