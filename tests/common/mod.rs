//! Common test utilities

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;

use mirrorselect::config::parse_mirror_list;
use mirrorselect::models::{Location, MirrorRecord, MirrorUrl};
use mirrorselect::monitor::{ProbeOutcome, Prober};
use mirrorselect::registry::MirrorRegistry;

/// Mirror list with one mirror per interesting tier
pub const MIRROR_LIST: &str = r#"
[avalon]
default = true
url = "https://avalon.example.org/dports"
continent_code = "NA"
country_code = "US"
latitude = 37.751
longitude = -97.822

[berlin]
url = "https://berlin.example.de/dports"
continent_code = "EU"
country_code = "DE"
latitude = 52.52
longitude = 13.405

[munich]
url = "https://munich.example.de/dports"
continent_code = "EU"
country_code = "DE"
latitude = 48.137
longitude = 11.575

[paris]
url = "ftp://paris.example.fr/pub/dports"
continent_code = "EU"
country_code = "FR"
latitude = 48.857
longitude = 2.352

[tokyo]
url = "http://tokyo.example.jp/dports/"
continent_code = "AS"
country_code = "JP"
latitude = 35.676
longitude = 139.65
"#;

/// Parse [`MIRROR_LIST`]
pub fn mirror_records() -> Vec<MirrorRecord> {
    parse_mirror_list(MIRROR_LIST, "mirrors.toml".as_ref()).unwrap()
}

/// Registry built from [`MIRROR_LIST`]
pub fn registry() -> Arc<MirrorRegistry> {
    Arc::new(MirrorRegistry::new(mirror_records()).unwrap())
}

/// A location in Frankfurt
pub fn frankfurt() -> Location {
    Location::new("EU", "DE", 50.11, 8.68)
}

/// A location in Madrid (Europe, no Spanish mirror)
pub fn madrid() -> Location {
    Location::new("EU", "ES", 40.417, -3.704)
}

/// Prober answering from a table keyed by host
///
/// Hosts missing from the table are reachable.
#[derive(Default)]
pub struct ScriptedProber {
    down: Mutex<HashMap<String, bool>>,
    calls: AtomicUsize,
}

impl ScriptedProber {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_reachable(&self, host: &str, reachable: bool) {
        self.down
            .lock()
            .unwrap()
            .insert(host.to_string(), !reachable);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Prober for ScriptedProber {
    async fn probe(&self, url: &MirrorUrl) -> ProbeOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let host = url.as_url().host_str().unwrap_or_default().to_string();
        let down = self.down.lock().unwrap().get(&host).copied().unwrap_or(false);
        if down {
            ProbeOutcome::unreachable(format!("{host} scripted down"))
        } else {
            ProbeOutcome::reachable()
        }
    }
}

/// Start a one-shot FTP server replaying `replies`
///
/// The first reply is the greeting; each following reply answers one
/// client command. Received commands are returned through the join handle.
pub async fn fake_ftp_server(
    replies: Vec<&'static str>,
) -> (SocketAddr, tokio::task::JoinHandle<Vec<String>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let handle = tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        let (read, mut write) = socket.into_split();
        let mut lines = BufReader::new(read).lines();
        let mut replies = replies.into_iter();
        let mut received = Vec::new();

        if let Some(greeting) = replies.next() {
            write.write_all(greeting.as_bytes()).await.unwrap();
        }
        for reply in replies {
            match lines.next_line().await {
                Ok(Some(line)) => received.push(line),
                _ => break,
            }
            write.write_all(reply.as_bytes()).await.unwrap();
        }
        received
    });

    (addr, handle)
}
