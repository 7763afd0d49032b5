//! Geo-aware mirror ranking
//!
//! Rules:
//! - Prefer online mirrors in the client's country.
//! - Otherwise prefer online mirrors on the client's continent.
//! - Order candidates by great-circle distance to the client, then by name.
//! - Always append the default mirror last, even when it is offline or
//!   already listed.
//! - An unknown client location yields the default mirror alone.

use serde::Serialize;

use super::great_circle_distance;
use crate::models::{Location, MirrorRecord};
use crate::registry::RegistrySnapshot;

/// Which candidate set a selection was drawn from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionTier {
    /// Mirrors in the client's country
    Country,
    /// Mirrors on the client's continent
    Continent,
    /// Location known but no nearby mirror online
    DefaultOnly,
    /// Client location could not be resolved
    UnknownLocation,
}

impl SelectionTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Country => "country",
            Self::Continent => "continent",
            Self::DefaultOnly => "default_only",
            Self::UnknownLocation => "unknown_location",
        }
    }
}

/// Ordered mirror recommendation for one client
#[derive(Debug, Clone, Serialize)]
pub struct Selection {
    pub tier: SelectionTier,
    pub mirrors: Vec<MirrorRecord>,
}

impl Selection {
    /// Full URLs of a package path on every selected mirror
    pub fn urls(&self, abi: &str, path: &str) -> Vec<String> {
        self.mirrors
            .iter()
            .map(|m| m.url.join_path(abi, path))
            .collect()
    }

    pub fn names(&self) -> Vec<&str> {
        self.mirrors.iter().map(|m| m.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.mirrors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mirrors.is_empty()
    }
}

/// Rank mirrors for a client location
pub fn select(location: Option<&Location>, snapshot: &RegistrySnapshot) -> Selection {
    let default = snapshot.default_mirror().clone();

    let Some(location) = location else {
        return Selection {
            tier: SelectionTier::UnknownLocation,
            mirrors: vec![default],
        };
    };

    let online = || snapshot.mirrors().iter().filter(|m| m.is_online());
    let country: Vec<&MirrorRecord> = online()
        .filter(|m| m.country_code == location.country_code)
        .collect();
    let continent: Vec<&MirrorRecord> = online()
        .filter(|m| m.continent_code == location.continent_code)
        .collect();

    let (tier, ranked) = if !country.is_empty() {
        (SelectionTier::Country, rank_by_distance(country, location))
    } else if !continent.is_empty() {
        (SelectionTier::Continent, rank_by_distance(continent, location))
    } else {
        (SelectionTier::DefaultOnly, Vec::new())
    };

    let mut mirrors: Vec<MirrorRecord> = ranked.into_iter().cloned().collect();
    mirrors.push(default);

    Selection { tier, mirrors }
}

fn rank_by_distance<'a>(
    candidates: Vec<&'a MirrorRecord>,
    location: &Location,
) -> Vec<&'a MirrorRecord> {
    let client = location.point();
    let mut keyed: Vec<(f64, &MirrorRecord)> = candidates
        .into_iter()
        .map(|m| (great_circle_distance(m.point(), client), m))
        .collect();

    keyed.sort_by(|(da, a), (db, b)| da.total_cmp(db).then_with(|| a.name.cmp(&b.name)));

    keyed.into_iter().map(|(_, m)| m).collect()
}
