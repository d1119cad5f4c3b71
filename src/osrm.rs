//! OSRM HTTP adapter for point-to-point driving distances.

use std::sync::Arc;

use serde::Deserialize;
use tracing::debug;

use crate::coordinate::Coordinate;
use crate::distance::apply_margin;
use crate::error::RouteError;
use crate::retry::{self, RetryPolicy};
use crate::traits::{Clock, DistanceEstimator};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct OsrmConfig {
    pub base_url: String,
    pub profile: String,
    pub timeout_secs: u64,
    /// Multiplier compensating for routing underestimates.
    pub margin: f64,
    pub retry: RetryPolicy,
}

impl Default for OsrmConfig {
    fn default() -> Self {
        Self {
            base_url: "http://router.project-osrm.org".to_string(),
            profile: "driving".to_string(),
            timeout_secs: 15,
            margin: 1.10,
            retry: RetryPolicy {
                rate_limit_delay_ms: 5_000,
                ..RetryPolicy::default()
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct OsrmClient {
    config: OsrmConfig,
    client: reqwest::blocking::Client,
}

impl OsrmClient {
    pub fn new(config: OsrmConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { config, client })
    }

    pub fn config(&self) -> &OsrmConfig {
        &self.config
    }

    fn route_url(&self, from: Coordinate, to: Coordinate) -> String {
        format!(
            "{}/route/v1/{}/{},{};{},{}?overview=false&alternatives=true&steps=true&annotations=distance",
            self.config.base_url.trim_end_matches('/'),
            self.config.profile,
            from.lon,
            from.lat,
            to.lon,
            to.lat
        )
    }

    /// One request: unscaled driving distance in kilometers.
    pub fn route_km(&self, from: Coordinate, to: Coordinate) -> Result<f64, RouteError> {
        let response = self.client.get(self.route_url(from, to)).send()?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(RouteError::RateLimited);
        }
        if !status.is_success() {
            return Err(RouteError::Status(status.as_u16()));
        }

        let body = response.json::<OsrmRouteResponse>()?;
        body.shortest_km()
    }
}

/// Primary distance strategy: OSRM with retries and the routing margin.
#[derive(Clone)]
pub struct OsrmEstimator {
    client: OsrmClient,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for OsrmEstimator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OsrmEstimator")
            .field("client", &self.client)
            .finish_non_exhaustive()
    }
}

impl OsrmEstimator {
    pub fn new(client: OsrmClient, clock: Arc<dyn Clock>) -> Self {
        Self { client, clock }
    }
}

impl DistanceEstimator for OsrmEstimator {
    fn name(&self) -> &str {
        "osrm"
    }

    fn estimate_km(&self, from: Coordinate, to: Coordinate) -> Option<f64> {
        let config = self.client.config();
        let km = retry::run(&config.retry, self.clock.as_ref(), "osrm route", |_| {
            self.client.route_km(from, to)
        })
        .ok()?;
        debug!(?from, ?to, km, "osrm distance");
        Some(apply_margin(km, config.margin))
    }
}

#[derive(Debug, Deserialize)]
pub struct OsrmRouteResponse {
    pub code: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub routes: Vec<OsrmRoute>,
}

#[derive(Debug, Deserialize)]
pub struct OsrmRoute {
    /// Route-level total in meters, used only to rank alternatives.
    pub distance: f64,
    #[serde(default)]
    pub legs: Vec<OsrmLeg>,
}

#[derive(Debug, Deserialize)]
pub struct OsrmLeg {
    #[serde(default)]
    pub steps: Vec<OsrmStep>,
}

#[derive(Debug, Deserialize)]
pub struct OsrmStep {
    pub distance: f64,
}

impl OsrmRoute {
    /// Sum of step distances in meters.
    pub fn step_meters(&self) -> f64 {
        self.legs
            .iter()
            .flat_map(|leg| leg.steps.iter())
            .map(|step| step.distance)
            .sum()
    }
}

impl OsrmRouteResponse {
    /// Pick the alternative with the smallest reported distance and return
    /// the sum of its steps in kilometers.
    pub fn shortest_km(&self) -> Result<f64, RouteError> {
        if self.code != "Ok" {
            return Err(RouteError::Service {
                code: self.code.clone(),
                message: self.message.clone().unwrap_or_default(),
            });
        }

        self.routes
            .iter()
            .min_by(|a, b| a.distance.total_cmp(&b.distance))
            .map(|route| route.step_meters() / 1000.0)
            .ok_or(RouteError::NoRoute)
    }
}
