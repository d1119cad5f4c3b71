//! Nominatim HTTP adapter for geocoding postal addresses.

use serde::Deserialize;

use crate::address::{expand_abbreviations, strip_diacritics};
use crate::coordinate::Coordinate;
use crate::error::GeocodeError;
use crate::traits::Geocoder;

/// Default user agent; Nominatim's usage policy requires an identifying one.
pub const DEFAULT_USER_AGENT: &str = "delivery-planner/0.1 (delivery route planning)";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct NominatimConfig {
    pub base_url: String,
    pub user_agent: String,
    /// Appended to every query to keep results inside one country.
    pub country: String,
    pub expand_abbreviations: bool,
    pub timeout_secs: u64,
}

impl Default for NominatimConfig {
    fn default() -> Self {
        Self {
            base_url: "https://nominatim.openstreetmap.org".to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            country: "Brasil".to_string(),
            expand_abbreviations: false,
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NominatimClient {
    config: NominatimConfig,
    client: reqwest::blocking::Client,
}

#[derive(Debug, Deserialize)]
struct Place {
    lat: String,
    lon: String,
}

impl NominatimClient {
    pub fn new(config: NominatimConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(&config.user_agent)
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { config, client })
    }

    /// Free-text query: diacritics stripped, country appended.
    pub fn query_for(&self, address: &str) -> String {
        let address = if self.config.expand_abbreviations {
            expand_abbreviations(address)
        } else {
            address.to_string()
        };
        if self.config.country.is_empty() {
            strip_diacritics(&address)
        } else {
            format!("{}, {}", strip_diacritics(&address), self.config.country)
        }
    }
}

impl Geocoder for NominatimClient {
    fn geocode(&self, address: &str) -> Result<Coordinate, GeocodeError> {
        let query = self.query_for(address);
        let url = format!("{}/search", self.config.base_url.trim_end_matches('/'));
        let response = self
            .client
            .get(url)
            .query(&[("q", query.as_str()), ("format", "json"), ("limit", "1")])
            .send()?;

        let status = response.status();
        if status == reqwest::StatusCode::FORBIDDEN {
            return Err(GeocodeError::RateLimited);
        }
        if !status.is_success() {
            return Err(GeocodeError::Status(status.as_u16()));
        }

        let places = response.json::<Vec<Place>>()?;
        let place = places.first().ok_or(GeocodeError::NoResult)?;
        let lat = place
            .lat
            .parse::<f64>()
            .map_err(|err| GeocodeError::Decode(format!("lat {:?}: {err}", place.lat)))?;
        let lon = place
            .lon
            .parse::<f64>()
            .map_err(|err| GeocodeError::Decode(format!("lon {:?}: {err}", place.lon)))?;
        Ok(Coordinate::new(lat, lon))
    }
}
