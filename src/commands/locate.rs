use anyhow::Result;
use std::net::IpAddr;

use mirrorselect::config::Config;
use mirrorselect::geo::{great_circle_distance, select};

use super::{load_registry, open_locator};

/// Mean Earth radius in kilometres, for display only
const EARTH_RADIUS_KM: f64 = 6371.0;

/// Resolve an address and show the mirrors it would be given
///
/// No probes run here, so every mirror counts as online.
pub async fn locate(config: Config, ip: IpAddr, abi: Option<String>) -> Result<()> {
    let registry = load_registry(&config)?;
    let locator = open_locator(&config.geoip)?;

    println!("IP: {ip}");
    let location = match locator.lookup(ip) {
        Ok(location) => {
            println!("Continent: {}", location.continent_code);
            println!("Country: {}", location.country_code);
            println!("Latitude: {}", location.latitude);
            println!("Longitude: {}", location.longitude);
            Some(location)
        }
        Err(e) => {
            println!("Location: unknown ({e})");
            None
        }
    };

    let snapshot = registry.snapshot().await;
    let selection = select(location.as_ref(), &snapshot);

    println!("\nSelected Mirrors ({})", selection.tier.as_str());
    println!("----------------");
    for (rank, mirror) in selection.mirrors.iter().enumerate() {
        let distance = location
            .as_ref()
            .map(|l| format!("{:.0} km", great_circle_distance(l.point(), mirror.point()) * EARTH_RADIUS_KM))
            .unwrap_or_else(|| "-".to_string());
        let marker = if mirror.is_default { " (default)" } else { "" };
        println!("{:>2}. {:<20} {:>9}  {}{}", rank + 1, mirror.name, distance, mirror.url, marker);
    }

    if let Some(abi) = abi {
        println!();
        for url in selection.urls(&abi, "") {
            println!("URL: {url}");
        }
    }

    Ok(())
}
