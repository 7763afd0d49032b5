//! Tests for configuration and mirror list loading

mod common;

use serial_test::serial;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

use mirrorselect::config::{load_mirror_list, parse_mirror_list, Config, ConfigError, MmdbType};
use mirrorselect::geo::MmdbLocator;
use mirrorselect::registry::MirrorRegistry;

fn write(dir: &Path, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    path
}

fn parse(content: &str) -> Result<Vec<mirrorselect::MirrorRecord>, ConfigError> {
    parse_mirror_list(content, Path::new("mirrors.toml"))
}

// ============================================================================
// Config file
// ============================================================================

#[test]
#[serial]
fn test_load_resolves_relative_paths() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "mirrors.toml", common::MIRROR_LIST);
    let config_path = write(
        dir.path(),
        "mirrorselect.toml",
        r#"
mirror_list = "mirrors.toml"

[server]
listen = "0.0.0.0:8080"
trust_forwarded_for = true

[geoip]
mmdb_type = "maxmind"
mmdb_file = "geo/city.mmdb"

[monitor]
interval_secs = 600
hysteresis = 2
tls_verify = false

[notify]
webhook_url = "https://hooks.example.com/mirrors"
"#,
    );

    let config = Config::load(&config_path).unwrap();

    assert_eq!(config.mirror_list, dir.path().join("mirrors.toml"));
    assert_eq!(config.geoip.mmdb_file, Some(dir.path().join("geo/city.mmdb")));
    assert_eq!(config.geoip.mmdb_type, MmdbType::Maxmind);
    assert_eq!(config.server.listen.port(), 8080);
    assert!(config.server.trust_forwarded_for);
    assert_eq!(config.monitor.interval().as_secs(), 600);
    assert_eq!(config.monitor.hysteresis, 2);
    assert!(!config.monitor.tls_verify);
    assert_eq!(config.monitor.timeout_secs, 5);
    assert!(config.notify.has_channels());

    let records = load_mirror_list(&config.mirror_list).unwrap();
    let registry = MirrorRegistry::new(records).unwrap();
    assert_eq!(registry.default_name(), "avalon");
}

#[test]
#[serial]
fn test_minimal_config_uses_defaults() {
    let dir = TempDir::new().unwrap();
    let path = write(dir.path(), "mirrorselect.toml", "mirror_list = \"/srv/mirrors.toml\"\n");

    let config = Config::load(&path).unwrap();

    assert_eq!(config.mirror_list, Path::new("/srv/mirrors.toml"));
    assert!(config.geoip.mmdb_file.is_none());
    assert_eq!(config.geoip.mmdb_type, MmdbType::Dbip);
    assert!(config.monitor.enabled);
    assert!(!config.notify.has_channels());
    assert_eq!(config.logging.format, "text");
}

#[test]
#[serial]
fn test_env_overrides() {
    let dir = TempDir::new().unwrap();
    let path = write(dir.path(), "mirrorselect.toml", "mirror_list = \"mirrors.toml\"\n");

    std::env::set_var("MIRRORSELECT_LISTEN", "127.0.0.1:9999");
    std::env::set_var("MIRRORSELECT_LOG_FORMAT", "json");
    let config = Config::load(&path);
    std::env::remove_var("MIRRORSELECT_LISTEN");
    std::env::remove_var("MIRRORSELECT_LOG_FORMAT");

    let config = config.unwrap();
    assert_eq!(config.server.listen.port(), 9999);
    assert_eq!(config.logging.format, "json");
}

#[test]
#[serial]
fn test_env_override_bad_listen() {
    let dir = TempDir::new().unwrap();
    let path = write(dir.path(), "mirrorselect.toml", "mirror_list = \"mirrors.toml\"\n");

    std::env::set_var("MIRRORSELECT_LISTEN", "not an address");
    let result = Config::load(&path);
    std::env::remove_var("MIRRORSELECT_LISTEN");

    assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
}

#[test]
#[serial]
fn test_invalid_config_values() {
    let dir = TempDir::new().unwrap();
    let path = write(
        dir.path(),
        "mirrorselect.toml",
        "mirror_list = \"mirrors.toml\"\n[monitor]\nhysteresis = 0\n",
    );

    let err = Config::load(&path).unwrap_err();
    assert!(err.to_string().contains("monitor.hysteresis"));
}

#[test]
fn test_missing_config_file() {
    let err = Config::load(Path::new("/nonexistent/mirrorselect.toml")).unwrap_err();
    assert!(matches!(err, ConfigError::Read { .. }));
}

#[test]
fn test_missing_mmdb_file() {
    let result = MmdbLocator::open(Path::new("/nonexistent/city.mmdb"), MmdbType::Dbip);
    assert!(matches!(result, Err(ConfigError::GeoIpDatabase { .. })));
}

// ============================================================================
// Mirror list
// ============================================================================

#[test]
fn test_mirror_list_fixture() {
    let records = parse(common::MIRROR_LIST).unwrap();

    assert_eq!(records.len(), 5);
    assert!(records.iter().all(|r| r.is_online()));
    assert_eq!(records.iter().filter(|r| r.is_default).count(), 1);
}

#[test]
fn test_mirror_list_without_default() {
    let err = parse(
        r#"
[alpha]
url = "https://alpha.example.org/"
continent_code = "EU"
country_code = "DE"
latitude = 1.0
longitude = 1.0
"#,
    )
    .unwrap_err();

    assert!(matches!(err, ConfigError::NoDefaultMirror));
}

#[test]
fn test_mirror_list_with_two_defaults() {
    let err = parse(
        r#"
[alpha]
default = true
url = "https://alpha.example.org/"
continent_code = "EU"
country_code = "DE"
latitude = 1.0
longitude = 1.0

[bravo]
default = true
url = "https://bravo.example.org/"
continent_code = "EU"
country_code = "DE"
latitude = 1.0
longitude = 1.0
"#,
    )
    .unwrap_err();

    assert_eq!(err.to_string(), "More than one default mirror: alpha, bravo");
}

#[test]
fn test_mirror_list_unsupported_scheme() {
    let err = parse(
        r#"
[alpha]
default = true
url = "rsync://alpha.example.org/dports"
continent_code = "EU"
country_code = "DE"
latitude = 1.0
longitude = 1.0
"#,
    )
    .unwrap_err();

    let message = err.to_string();
    assert!(message.starts_with("Mirror [alpha]:"), "{message}");
    assert!(message.contains("rsync"), "{message}");
}

#[test]
fn test_mirror_list_missing_field() {
    let result = parse(
        r#"
[alpha]
default = true
url = "https://alpha.example.org/"
country_code = "DE"
latitude = 1.0
longitude = 1.0
"#,
    );

    assert!(matches!(result, Err(ConfigError::Parse { .. })));
}

#[test]
fn test_empty_mirror_list() {
    assert!(matches!(parse(""), Err(ConfigError::EmptyMirrorList)));
}
