//! Great-circle distance fallback (used when the routing service fails).
//!
//! Ignores roads entirely, so the raw figure is inflated by a safety margin.
//! Pairs that are out of range or implausibly far apart are reported as
//! unreachable rather than guessed at.

use serde::Deserialize;
use tracing::warn;

use crate::coordinate::Coordinate;
use crate::distance::apply_margin;
use crate::traits::DistanceEstimator;

/// Earth radius in kilometers.
const EARTH_RADIUS_KM: f64 = 6371.0;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct GeodesicConfig {
    /// Beyond this the pair is treated as a geocoding mistake.
    pub max_plausible_km: f64,
    /// Multiplier applied to the straight-line distance.
    pub margin: f64,
}

impl Default for GeodesicConfig {
    fn default() -> Self {
        Self {
            max_plausible_km: 500.0,
            margin: 1.15,
        }
    }
}

/// Great-circle distance between two points in kilometers.
pub fn haversine_km(from: Coordinate, to: Coordinate) -> f64 {
    let lat1_rad = from.lat.to_radians();
    let lat2_rad = to.lat.to_radians();
    let delta_lat = (to.lat - from.lat).to_radians();
    let delta_lng = (to.lon - from.lon).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lng / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().asin();

    EARTH_RADIUS_KM * c
}

/// Great-circle distance, or infinity for invalid or implausible pairs.
pub fn checked_km(from: Coordinate, to: Coordinate, max_plausible_km: f64) -> f64 {
    if !from.is_valid() || !to.is_valid() {
        warn!(?from, ?to, "invalid coordinates");
        return f64::INFINITY;
    }

    let km = haversine_km(from, to);
    if km > max_plausible_km {
        warn!(?from, ?to, km, "implausible distance, treating pair as unreachable");
        return f64::INFINITY;
    }
    km
}

/// Fallback strategy: never declines, answers infinity for unusable pairs.
#[derive(Debug, Clone, Default)]
pub struct GeodesicEstimator {
    config: GeodesicConfig,
}

impl GeodesicEstimator {
    pub fn new(config: GeodesicConfig) -> Self {
        Self { config }
    }

    /// Unscaled great-circle distance with the plausibility cutoff applied.
    pub fn raw_km(&self, from: Coordinate, to: Coordinate) -> f64 {
        checked_km(from, to, self.config.max_plausible_km)
    }
}

impl DistanceEstimator for GeodesicEstimator {
    fn name(&self) -> &str {
        "geodesic"
    }

    fn estimate_km(&self, from: Coordinate, to: Coordinate) -> Option<f64> {
        Some(apply_margin(self.raw_km(from, to), self.config.margin))
    }
}
