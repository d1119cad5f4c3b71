//! Address to coordinate resolution.
//!
//! In order: a literal `lat,lon` in the address, the geocode cache, then a
//! live geocoding call under the retry policy. Live results are cached and
//! flushed immediately, and each successful call is followed by a pause so
//! the provider's one-request-per-second policy holds per worker.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::address::{DirectCoordinate, parse_direct};
use crate::cache::GeoCache;
use crate::coordinate::Coordinate;
use crate::retry::{self, RetryPolicy};
use crate::traits::{Clock, Geocoder};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct GeocodeOptions {
    pub retry: RetryPolicy,
    /// Minimum pause after every successful live call.
    pub pause_after_success_ms: u64,
}

impl Default for GeocodeOptions {
    fn default() -> Self {
        Self {
            retry: RetryPolicy {
                rate_limit_delay_ms: 10_000,
                ..RetryPolicy::default()
            },
            pause_after_success_ms: 1_000,
        }
    }
}

/// How an address was (or was not) turned into a coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResolutionStatus {
    DirectCoordinate,
    CacheHit,
    Resolved,
    Failed,
}

impl fmt::Display for ResolutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::DirectCoordinate => "direct-coordinate",
            Self::CacheHit => "cache-hit",
            Self::Resolved => "resolved",
            Self::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// Outcome of resolving one input address.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolutionRecord {
    /// Position of the address in the input.
    pub index: usize,
    pub address: String,
    pub coordinate: Option<Coordinate>,
    pub status: ResolutionStatus,
}

pub struct CoordinateResolver {
    geocoder: Box<dyn Geocoder>,
    cache: GeoCache,
    clock: Arc<dyn Clock>,
    options: GeocodeOptions,
}

impl fmt::Debug for CoordinateResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CoordinateResolver")
            .field("cache", &self.cache)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl CoordinateResolver {
    pub fn new(
        geocoder: Box<dyn Geocoder>,
        cache: GeoCache,
        clock: Arc<dyn Clock>,
        options: GeocodeOptions,
    ) -> Self {
        Self {
            geocoder,
            cache,
            clock,
            options,
        }
    }

    pub fn cache(&self) -> &GeoCache {
        &self.cache
    }

    pub fn resolve(&self, index: usize, address: &str) -> ResolutionRecord {
        let (coordinate, status) = self.lookup(address);
        ResolutionRecord {
            index,
            address: address.to_string(),
            coordinate,
            status,
        }
    }

    fn lookup(&self, address: &str) -> (Option<Coordinate>, ResolutionStatus) {
        match parse_direct(address) {
            DirectCoordinate::Parsed(coord) => return (Some(coord), ResolutionStatus::DirectCoordinate),
            DirectCoordinate::Malformed => {
                warn!(address, "address looks like coordinates but is out of range");
                return (None, ResolutionStatus::Failed);
            }
            DirectCoordinate::NotCoordinate => {}
        }

        if let Some(value) = self.cache.get(address, self.clock.now()) {
            return (Some(value.into()), ResolutionStatus::CacheHit);
        }

        let result = retry::run(&self.options.retry, self.clock.as_ref(), "geocode", |_| {
            self.geocoder.geocode(address)
        });
        match result {
            Ok(coord) => {
                debug!(address, ?coord, "geocoded");
                self.cache.insert(address, coord.into(), self.clock.now());
                self.clock
                    .sleep(Duration::from_millis(self.options.pause_after_success_ms));
                (Some(coord), ResolutionStatus::Resolved)
            }
            Err(err) => {
                warn!(address, error = %err, "geocoding failed");
                (None, ResolutionStatus::Failed)
            }
        }
    }
}
