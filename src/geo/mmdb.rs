//! GeoLocator backed by a MaxMind DB (`.mmdb`) city database
//!
//! MaxMind GeoLite2/GeoIP2 City and DB-IP City use the same schema for the
//! fields read here, so one decoder serves both.
//!
//! A record missing its continent or coordinates is an unknown location, not
//! one with empty codes at 0,0.

use maxminddb::{MaxMindDBError, Reader};
use serde::Deserialize;
use std::net::IpAddr;
use std::path::Path;

use super::{GeoLocator, LookupError};
use crate::config::{ConfigError, MmdbType};
use crate::models::Location;

#[derive(Debug, Deserialize)]
struct CityRecord {
    continent: Option<ContinentRecord>,
    country: Option<CountryRecord>,
    location: Option<CoordinatesRecord>,
}

#[derive(Debug, Deserialize)]
struct ContinentRecord {
    /// Two-letter code
    code: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CountryRecord {
    /// Two-letter code
    iso_code: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CoordinatesRecord {
    latitude: Option<f64>,
    longitude: Option<f64>,
}

/// Locator reading an in-memory MMDB file
pub struct MmdbLocator {
    reader: Reader<Vec<u8>>,
    kind: MmdbType,
}

impl MmdbLocator {
    /// Open a database file
    pub fn open(path: &Path, kind: MmdbType) -> Result<Self, ConfigError> {
        let reader = Reader::open_readfile(path).map_err(|e| ConfigError::GeoIpDatabase {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        tracing::info!(
            path = %path.display(),
            kind = ?kind,
            database_type = %reader.metadata.database_type,
            "Opened GeoIP database"
        );

        Ok(Self { reader, kind })
    }

    /// Build a locator from database bytes
    pub fn from_bytes(bytes: Vec<u8>, kind: MmdbType) -> Result<Self, LookupError> {
        let reader = Reader::from_source(bytes)?;
        Ok(Self { reader, kind })
    }

    pub fn kind(&self) -> MmdbType {
        self.kind
    }
}

impl GeoLocator for MmdbLocator {
    fn lookup(&self, ip: IpAddr) -> Result<Location, LookupError> {
        let record: CityRecord = match self.reader.lookup(ip) {
            Ok(record) => record,
            Err(MaxMindDBError::AddressNotFoundError(_)) => return Err(LookupError::NotFound(ip)),
            Err(e) => return Err(e.into()),
        };

        location_from_record(record).ok_or(LookupError::Incomplete(ip))
    }
}

/// A record is usable when it names a continent and has coordinates;
/// anycast and satellite ranges often lack a country.
fn location_from_record(record: CityRecord) -> Option<Location> {
    let continent_code = record.continent?.code?;
    let country_code = record
        .country
        .and_then(|c| c.iso_code)
        .unwrap_or_default();
    let coordinates = record.location?;

    Some(Location {
        continent_code: continent_code.to_ascii_uppercase(),
        country_code: country_code.to_ascii_uppercase(),
        latitude: coordinates.latitude?,
        longitude: coordinates.longitude?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(json: &str) -> CityRecord {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_complete_record() {
        let location = location_from_record(record(
            r#"{
                "continent": {"code": "EU"},
                "country": {"iso_code": "de"},
                "location": {"latitude": 52.52, "longitude": 13.405}
            }"#,
        ))
        .unwrap();

        assert_eq!(location.continent_code, "EU");
        assert_eq!(location.country_code, "DE");
        assert_eq!(location.latitude, 52.52);
    }

    #[test]
    fn test_record_without_country() {
        let location = location_from_record(record(
            r#"{
                "continent": {"code": "AS"},
                "location": {"latitude": 1.0, "longitude": 2.0}
            }"#,
        ))
        .unwrap();

        assert_eq!(location.continent_code, "AS");
        assert!(location.country_code.is_empty());
    }

    #[test]
    fn test_record_without_coordinates_is_incomplete() {
        let location = location_from_record(record(
            r#"{"continent": {"code": "EU"}, "country": {"iso_code": "FR"}}"#,
        ));
        assert!(location.is_none());
    }

    #[test]
    fn test_open_missing_file() {
        let result = MmdbLocator::open(Path::new("/nonexistent/city.mmdb"), MmdbType::Dbip);
        assert!(matches!(result, Err(ConfigError::GeoIpDatabase { .. })));
    }

    #[test]
    fn test_garbage_bytes_rejected() {
        let result = MmdbLocator::from_bytes(b"definitely not an mmdb".to_vec(), MmdbType::Maxmind);
        assert!(result.is_err());
    }
}
