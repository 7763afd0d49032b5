//! Client geolocation and geo-aware mirror ranking
//!
//! - [`GeoLocator`] resolves a client IP to a [`Location`]; failures degrade
//!   to an unknown location instead of surfacing to callers.
//! - [`great_circle_distance`] measures how far a mirror is from a client.
//! - [`selector`] turns a location and a registry snapshot into an ordered
//!   mirror list.

pub mod mmdb;
pub mod selector;

use std::net::IpAddr;
use thiserror::Error;

use crate::models::{GeoPoint, Location};

pub use mmdb::MmdbLocator;
pub use selector::{select, Selection, SelectionTier};

/// Errors raised by a geolocation lookup
#[derive(Error, Debug)]
pub enum LookupError {
    /// The database has no entry for the address
    #[error("No data for IP ({0})")]
    NotFound(IpAddr),

    /// The entry lacks the fields needed to rank mirrors
    #[error("Incomplete location data for IP ({0})")]
    Incomplete(IpAddr),

    /// No database is configured
    #[error("No GeoIP database configured")]
    Unavailable,

    /// The database failed to decode the entry
    #[error("GeoIP database error: {0}")]
    Database(#[from] maxminddb::MaxMindDBError),
}

/// Resolves client addresses to geographic locations
pub trait GeoLocator: Send + Sync {
    /// Look up the location of an address
    fn lookup(&self, ip: IpAddr) -> Result<Location, LookupError>;

    /// Look up the location of an address, treating any failure as unknown
    fn locate(&self, ip: IpAddr) -> Option<Location> {
        match self.lookup(ip) {
            Ok(location) => Some(location),
            Err(e) => {
                tracing::debug!(ip = %ip, error = %e, "Lookup IP failed");
                None
            }
        }
    }
}

/// Locator used when no database is configured
#[derive(Debug, Default, Clone, Copy)]
pub struct NullLocator;

impl GeoLocator for NullLocator {
    fn lookup(&self, _ip: IpAddr) -> Result<Location, LookupError> {
        Err(LookupError::Unavailable)
    }
}

/// Great-circle distance between two points, in radians
///
/// Uses the haversine form, which stays well-conditioned for short
/// distances:
/// `d = 2·asin(sqrt(sin²(Δlat/2) + cos(lat1)·cos(lat2)·sin²(Δlon/2)))`.
pub fn great_circle_distance(a: GeoPoint, b: GeoPoint) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lon1 = a.longitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let lon2 = b.longitude.to_radians();

    let t1 = ((lat1 - lat2) / 2.0).sin().powi(2);
    let t2 = lat1.cos() * lat2.cos() * ((lon1 - lon2) / 2.0).sin().powi(2);
    // Rounding can push the sum a hair above 1 for antipodal points.
    2.0 * (t1 + t2).sqrt().min(1.0).asin()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::{FRAC_PI_2, PI};

    const EPS: f64 = 1e-9;

    #[test]
    fn test_distance_to_self_is_zero() {
        let p = GeoPoint::new(48.137, 11.575);
        assert!(great_circle_distance(p, p).abs() < EPS);
    }

    #[test]
    fn test_equator_to_pole() {
        let equator = GeoPoint::new(0.0, 42.0);
        let pole = GeoPoint::new(90.0, 0.0);
        assert!((great_circle_distance(equator, pole) - FRAC_PI_2).abs() < EPS);
    }

    #[test]
    fn test_distance_is_symmetric() {
        let a = GeoPoint::new(35.68, 139.69);
        let b = GeoPoint::new(-33.87, 151.21);
        let ab = great_circle_distance(a, b);
        let ba = great_circle_distance(b, a);
        assert!((ab - ba).abs() < EPS);
    }

    #[test]
    fn test_antipodes() {
        let a = GeoPoint::new(0.0, 0.0);
        let b = GeoPoint::new(0.0, 180.0);
        assert!((great_circle_distance(a, b) - PI).abs() < EPS);
    }

    #[test]
    fn test_longitude_wraparound() {
        // Fiji and Samoa sit on either side of the antimeridian.
        let fiji = GeoPoint::new(-17.7, 178.0);
        let samoa = GeoPoint::new(-13.8, -172.1);
        let sydney = GeoPoint::new(-33.87, 151.21);

        let near = great_circle_distance(fiji, samoa);
        let far = great_circle_distance(fiji, sydney);
        assert!(near < far, "wraparound misordered: {near} >= {far}");
    }

    #[test]
    fn test_null_locator_is_unknown() {
        let ip: IpAddr = "192.0.2.1".parse().unwrap();
        assert!(matches!(NullLocator.lookup(ip), Err(LookupError::Unavailable)));
        assert!(NullLocator.locate(ip).is_none());
    }
}
