//! Planner configuration.
//!
//! Every section has a default, so a config file only needs the keys it
//! changes:
//!
//! ```json
//! {
//!   "batch": { "workers": 1 },
//!   "routing": { "sources": ["valhalla", "geodesic"] }
//! }
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use chrono::TimeDelta;
use serde::Deserialize;

use crate::batch::DEFAULT_WORKERS;
use crate::error::ConfigError;
use crate::geocode::GeocodeOptions;
use crate::geodesic::GeodesicConfig;
use crate::nominatim::NominatimConfig;
use crate::osrm::OsrmConfig;
use crate::solver::SolveOptions;
use crate::valhalla::ValhallaConfig;

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    pub cache: CacheConfig,
    pub nominatim: NominatimConfig,
    pub geocoding: GeocodeOptions,
    pub routing: RoutingConfig,
    pub fallback: GeodesicConfig,
    pub batch: BatchConfig,
    pub solver: SolveOptions,
    pub outliers: OutlierConfig,
}

impl PlannerConfig {
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub geocode_path: PathBuf,
    pub distance_path: PathBuf,
    pub ttl_days: i64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            geocode_path: PathBuf::from("geocode_cache.json"),
            distance_path: PathBuf::from("distance_cache.json"),
            ttl_days: 30,
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> TimeDelta {
        TimeDelta::try_days(self.ttl_days).unwrap_or(TimeDelta::MAX)
    }
}

/// A way of getting a distance between two points, tried in list order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceSource {
    Osrm,
    Valhalla,
    Geodesic,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    pub osrm: OsrmConfig,
    pub valhalla: ValhallaConfig,
    pub sources: Vec<DistanceSource>,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            osrm: OsrmConfig::default(),
            valhalla: ValhallaConfig::default(),
            sources: vec![DistanceSource::Osrm, DistanceSource::Geodesic],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// `1` serialises every call.
    pub workers: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct OutlierConfig {
    /// Standard deviations above the global mean before a point is flagged.
    pub deviations: f64,
}

impl Default for OutlierConfig {
    fn default() -> Self {
        Self { deviations: 2.0 }
    }
}
