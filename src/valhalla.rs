//! Valhalla HTTP adapter, an alternative routing back-end.
//!
//! Not part of the default source list; enable it by adding `valhalla` to
//! `routing.sources` in the planner configuration.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::coordinate::Coordinate;
use crate::distance::apply_margin;
use crate::error::RouteError;
use crate::retry::{self, RetryPolicy};
use crate::traits::{Clock, DistanceEstimator};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ValhallaConfig {
    pub base_url: String,
    /// Costing model, e.g. `auto` or `truck`.
    pub costing: String,
    pub timeout_secs: u64,
    pub margin: f64,
    pub retry: RetryPolicy,
}

impl Default for ValhallaConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8002".to_string(),
            costing: "auto".to_string(),
            timeout_secs: 15,
            margin: 1.10,
            retry: RetryPolicy::default(),
        }
    }
}

#[derive(Debug, Serialize)]
struct RouteRequest<'a> {
    locations: [Location; 2],
    costing: &'a str,
    units: &'static str,
}

#[derive(Debug, Serialize)]
struct Location {
    lat: f64,
    lon: f64,
}

impl From<Coordinate> for Location {
    fn from(coord: Coordinate) -> Self {
        Self {
            lat: coord.lat,
            lon: coord.lon,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ValhallaRouteResponse {
    pub trip: ValhallaTrip,
}

#[derive(Debug, Deserialize)]
pub struct ValhallaTrip {
    pub status: i32,
    #[serde(default)]
    pub status_message: Option<String>,
    pub summary: ValhallaSummary,
}

#[derive(Debug, Deserialize)]
pub struct ValhallaSummary {
    /// Kilometers, since requests ask for `units: kilometers`.
    pub length: f64,
}

impl ValhallaRouteResponse {
    pub fn km(&self) -> Result<f64, RouteError> {
        if self.trip.status != 0 {
            return Err(RouteError::Service {
                code: self.trip.status.to_string(),
                message: self.trip.status_message.clone().unwrap_or_default(),
            });
        }
        Ok(self.trip.summary.length)
    }
}

#[derive(Debug, Clone)]
pub struct ValhallaClient {
    config: ValhallaConfig,
    client: reqwest::blocking::Client,
}

impl ValhallaClient {
    pub fn new(config: ValhallaConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { config, client })
    }

    pub fn config(&self) -> &ValhallaConfig {
        &self.config
    }

    /// One request: unscaled driving distance in kilometers.
    pub fn route_km(&self, from: Coordinate, to: Coordinate) -> Result<f64, RouteError> {
        let request = RouteRequest {
            locations: [from.into(), to.into()],
            costing: &self.config.costing,
            units: "kilometers",
        };
        let url = format!("{}/route", self.config.base_url.trim_end_matches('/'));
        let response = self.client.post(url).json(&request).send()?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(RouteError::RateLimited);
        }
        if !status.is_success() {
            return Err(RouteError::Status(status.as_u16()));
        }

        response.json::<ValhallaRouteResponse>()?.km()
    }
}

/// Valhalla strategy with retries and the routing margin.
#[derive(Clone)]
pub struct ValhallaEstimator {
    client: ValhallaClient,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for ValhallaEstimator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValhallaEstimator")
            .field("client", &self.client)
            .finish_non_exhaustive()
    }
}

impl ValhallaEstimator {
    pub fn new(client: ValhallaClient, clock: Arc<dyn Clock>) -> Self {
        Self { client, clock }
    }
}

impl DistanceEstimator for ValhallaEstimator {
    fn name(&self) -> &str {
        "valhalla"
    }

    fn estimate_km(&self, from: Coordinate, to: Coordinate) -> Option<f64> {
        let config = self.client.config();
        let km = retry::run(&config.retry, self.clock.as_ref(), "valhalla route", |_| {
            self.client.route_km(from, to)
        })
        .ok()?;
        debug!(?from, ?to, km, "valhalla distance");
        Some(apply_margin(km, config.margin))
    }
}
