//! Mirror registry
//!
//! The registry is the only mutable state shared between the health monitor
//! (single writer) and request handlers (many readers). Records are loaded
//! once at startup; afterwards only their status changes.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

use crate::config::ConfigError;
use crate::metrics;
use crate::models::{MirrorRecord, MirrorTransition, MirrorUrl};
use crate::monitor::hysteresis;

// ============================================================================
// Snapshot
// ============================================================================

/// Registry-wide consistent copy of every mirror
#[derive(Debug, Clone, Serialize)]
pub struct RegistrySnapshot {
    /// Mirrors sorted by name
    mirrors: Vec<MirrorRecord>,

    /// Index of the default mirror in `mirrors`
    #[serde(skip)]
    default_index: usize,

    /// When the snapshot was taken
    taken_at: DateTime<Utc>,
}

impl RegistrySnapshot {
    /// Build a snapshot from records, checking the single-default invariant
    pub fn new(mut mirrors: Vec<MirrorRecord>) -> Result<Self, ConfigError> {
        mirrors.sort_by(|a, b| a.name.cmp(&b.name));
        let default_index = find_default(&mirrors)?;
        Ok(Self {
            mirrors,
            default_index,
            taken_at: Utc::now(),
        })
    }

    pub fn mirrors(&self) -> &[MirrorRecord] {
        &self.mirrors
    }

    pub fn default_mirror(&self) -> &MirrorRecord {
        &self.mirrors[self.default_index]
    }

    pub fn get(&self, name: &str) -> Option<&MirrorRecord> {
        self.mirrors
            .binary_search_by(|m| m.name.as_str().cmp(name))
            .ok()
            .map(|i| &self.mirrors[i])
    }

    pub fn taken_at(&self) -> DateTime<Utc> {
        self.taken_at
    }

    pub fn len(&self) -> usize {
        self.mirrors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mirrors.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &MirrorRecord> {
        self.mirrors.iter()
    }
}

fn find_default(mirrors: &[MirrorRecord]) -> Result<usize, ConfigError> {
    let defaults: Vec<usize> = mirrors
        .iter()
        .enumerate()
        .filter(|(_, m)| m.is_default)
        .map(|(i, _)| i)
        .collect();

    match defaults.as_slice() {
        [] => Err(ConfigError::NoDefaultMirror),
        [index] => Ok(*index),
        _ => Err(ConfigError::MultipleDefaultMirrors(
            defaults.iter().map(|&i| mirrors[i].name.clone()).collect(),
        )),
    }
}

// ============================================================================
// Registry
// ============================================================================

/// Shared table of mirrors and their health status
pub struct MirrorRegistry {
    mirrors: RwLock<BTreeMap<String, MirrorRecord>>,
    default_name: String,
}

impl MirrorRegistry {
    /// Create a registry from loaded mirror records
    pub fn new(records: Vec<MirrorRecord>) -> Result<Self, ConfigError> {
        if records.is_empty() {
            return Err(ConfigError::EmptyMirrorList);
        }

        let mut mirrors = BTreeMap::new();
        for record in records {
            let name = record.name.clone();
            if mirrors.insert(name.clone(), record).is_some() {
                return Err(ConfigError::DuplicateMirror(name));
            }
        }

        let ordered: Vec<MirrorRecord> = mirrors.values().cloned().collect();
        let default_name = ordered[find_default(&ordered)?].name.clone();

        Ok(Self {
            mirrors: RwLock::new(mirrors),
            default_name,
        })
    }

    /// Copy every mirror under one read lock
    pub async fn snapshot(&self) -> RegistrySnapshot {
        let mirrors = self.mirrors.read().await;
        let records: Vec<MirrorRecord> = mirrors.values().cloned().collect();
        let default_index = records
            .iter()
            .position(|m| m.name == self.default_name)
            .unwrap_or_default();

        RegistrySnapshot {
            mirrors: records,
            default_index,
            taken_at: Utc::now(),
        }
    }

    /// Get one mirror
    pub async fn get(&self, name: &str) -> Option<MirrorRecord> {
        self.mirrors.read().await.get(name).cloned()
    }

    /// Names and URLs of every mirror, for probing
    pub async fn targets(&self) -> Vec<(String, MirrorUrl)> {
        self.mirrors
            .read()
            .await
            .values()
            .map(|m| (m.name.clone(), m.url.clone()))
            .collect()
    }

    /// Apply one cycle of probe results under a single write lock
    ///
    /// Results for unknown names are ignored. Returns the confirmed
    /// transitions in name order.
    pub async fn apply_results(
        &self,
        results: &[(String, bool)],
        threshold: u32,
    ) -> Vec<MirrorTransition> {
        let now = Utc::now();
        let mut mirrors = self.mirrors.write().await;
        let mut transitions = Vec::new();

        for (name, reachable) in results {
            let Some(record) = mirrors.get_mut(name) else {
                tracing::warn!(mirror = %name, "Probe result for unknown mirror");
                continue;
            };

            record.status.last_checked = Some(now);
            if let Some(event) = hysteresis::apply(&mut record.status, *reachable, threshold) {
                transitions.push(MirrorTransition {
                    mirror: record.name.clone(),
                    url: record.url.to_string(),
                    event,
                    occurred_at: now,
                });
            }
        }

        transitions.sort_by(|a, b| a.mirror.cmp(&b.mirror));
        transitions
    }

    /// Set the online gauge of every mirror, changed or not
    pub async fn publish_metrics(&self) {
        for record in self.mirrors.read().await.values() {
            metrics::set_mirror_online(&record.name, record.status.online);
        }
    }

    pub fn default_name(&self) -> &str {
        &self.default_name
    }

    pub async fn len(&self) -> usize {
        self.mirrors.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.mirrors.read().await.is_empty()
    }

    /// Get registry statistics
    pub async fn stats(&self) -> RegistryStats {
        let mirrors = self.mirrors.read().await;

        let mut online = 0;
        let mut total_ok = 0;
        let mut total_errors = 0;
        let mut last_checked: Option<DateTime<Utc>> = None;

        for record in mirrors.values() {
            if record.status.online {
                online += 1;
            }
            total_ok += record.status.ok_count;
            total_errors += record.status.error_count;
            last_checked = last_checked.max(record.status.last_checked);
        }

        let default_online = mirrors
            .get(&self.default_name)
            .is_some_and(|m| m.status.online);

        RegistryStats {
            total_mirrors: mirrors.len(),
            online,
            offline: mirrors.len() - online,
            default_online,
            total_ok,
            total_errors,
            last_checked,
        }
    }
}

/// Registry statistics
#[derive(Debug, Clone, Serialize)]
pub struct RegistryStats {
    pub total_mirrors: usize,
    pub online: usize,
    pub offline: usize,
    pub default_online: bool,
    pub total_ok: u64,
    pub total_errors: u64,
    pub last_checked: Option<DateTime<Utc>>,
}

impl RegistryStats {
    /// Percentage of mirrors currently online
    pub fn availability(&self) -> f64 {
        if self.total_mirrors == 0 {
            0.0
        } else {
            (self.online as f64 / self.total_mirrors as f64) * 100.0
        }
    }

    /// Format as display string
    pub fn display(&self) -> String {
        let last_checked = self
            .last_checked
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| "never".to_string());

        format!(
            "Mirror Registry\n\
             {:-<30}\n\
             Total Mirrors: {}\n\
             - Online: {}\n\
             - Offline: {}\n\
             Default Online: {}\n\
             Availability: {:.1}%\n\
             Probes OK/Failed: {}/{}\n\
             Last Checked: {}",
            "",
            self.total_mirrors,
            self.online,
            self.offline,
            self.default_online,
            self.availability(),
            self.total_ok,
            self.total_errors,
            last_checked
        )
    }
}

// ============================================================================
// Tests
// ============================================================================
