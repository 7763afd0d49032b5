//! Mirror list loading
//!
//! The mirror list is a TOML file with one table per mirror, keyed by the
//! mirror name:
//!
//! ```toml
//! [tuna]
//! url = "https://mirrors.tuna.tsinghua.edu.cn/dragonflybsd/dports"
//! continent_code = "AS"
//! country_code = "CN"
//! latitude = 39.9042
//! longitude = 116.4074
//!
//! [avalon]
//! default = true
//! url = "https://mirror-master.dragonflybsd.org/dports"
//! continent_code = "NA"
//! country_code = "US"
//! latitude = 37.751
//! longitude = -97.822
//! ```
//!
//! Loading validates every URL scheme and requires exactly one default
//! mirror, so nothing downstream has to handle a malformed list.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

use super::ConfigError;
use crate::models::{MirrorRecord, MirrorStatus, MirrorUrl};

/// One mirror as written in the mirror list
#[derive(Debug, Clone, Deserialize)]
pub struct MirrorEntry {
    pub url: String,
    #[serde(default)]
    pub default: bool,
    pub continent_code: String,
    pub country_code: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl MirrorEntry {
    /// Validate the entry and turn it into a registry record
    pub fn into_record(self, name: &str) -> Result<MirrorRecord, ConfigError> {
        let url = MirrorUrl::parse(&self.url)?;

        let continent_code = normalize_code("continent_code", &self.continent_code)?;
        let country_code = normalize_code("country_code", &self.country_code)?;

        if !(-90.0..=90.0).contains(&self.latitude) {
            return Err(ConfigError::InvalidValue {
                field: "latitude".to_string(),
                reason: format!("{} is outside [-90, 90]", self.latitude),
            });
        }
        if !(-180.0..=180.0).contains(&self.longitude) {
            return Err(ConfigError::InvalidValue {
                field: "longitude".to_string(),
                reason: format!("{} is outside [-180, 180]", self.longitude),
            });
        }

        Ok(MirrorRecord {
            name: name.to_string(),
            is_default: self.default,
            url,
            continent_code,
            country_code,
            latitude: self.latitude,
            longitude: self.longitude,
            status: MirrorStatus::default(),
        })
    }
}

fn normalize_code(field: &str, code: &str) -> Result<String, ConfigError> {
    let code = code.trim();
    if code.is_empty() {
        return Err(ConfigError::MissingField {
            field: field.to_string(),
        });
    }
    Ok(code.to_ascii_uppercase())
}

/// Parse and validate mirror list content
pub fn parse_mirror_list(content: &str, path: &Path) -> Result<Vec<MirrorRecord>, ConfigError> {
    let entries: BTreeMap<String, MirrorEntry> =
        toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

    if entries.is_empty() {
        return Err(ConfigError::EmptyMirrorList);
    }

    let mut records = Vec::with_capacity(entries.len());
    let mut defaults = Vec::new();

    for (name, entry) in entries {
        let record = entry
            .into_record(&name)
            .map_err(|e| ConfigError::for_mirror(&name, e))?;

        if record.is_default {
            tracing::info!(mirror = %name, "Default mirror");
            defaults.push(name.clone());
        }
        tracing::debug!(mirror = %name, url = %record.url, "Loaded mirror");

        records.push(record);
    }

    match defaults.len() {
        0 => Err(ConfigError::NoDefaultMirror),
        1 => Ok(records),
        _ => Err(ConfigError::MultipleDefaultMirrors(defaults)),
    }
}

/// Read and validate a mirror list file
pub fn load_mirror_list(path: &Path) -> Result<Vec<MirrorRecord>, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let records = parse_mirror_list(&content, path)?;
    tracing::info!(count = records.len(), path = %path.display(), "Read in mirror list");
    Ok(records)
}
