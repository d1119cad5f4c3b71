//! Road distance between two coordinates, with caching and fallbacks.
//!
//! Estimation strategies are tried in order (typically OSRM, then the
//! geodesic fallback); the first one that answers wins. Results are cached
//! per ordered pair and written to disk on `flush`. A cached value that is
//! more than twice the straight-line distance is treated as corrupt and
//! recomputed. Pairs with an out-of-range coordinate are unreachable.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::cache::{DistanceCache, DistanceValue, distance_key};
use crate::coordinate::Coordinate;
use crate::geodesic::checked_km;
use crate::traits::{Clock, DistanceEstimator};

/// Scale `km` by `margin` and round to one decimal. Infinity stays infinity.
pub fn apply_margin(km: f64, margin: f64) -> f64 {
    if !km.is_finite() {
        return f64::INFINITY;
    }
    (km * margin * 10.0).round() / 10.0
}

pub struct DistanceResolver {
    strategies: Vec<Box<dyn DistanceEstimator>>,
    cache: DistanceCache,
    clock: Arc<dyn Clock>,
    max_plausible_km: f64,
}

impl std::fmt::Debug for DistanceResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DistanceResolver")
            .field(
                "strategies",
                &self.strategies.iter().map(|s| s.name()).collect::<Vec<_>>(),
            )
            .field("cache", &self.cache)
            .field("max_plausible_km", &self.max_plausible_km)
            .finish_non_exhaustive()
    }
}

impl DistanceResolver {
    /// `max_plausible_km` is the cutoff used by the cache sanity check.
    pub fn new(
        strategies: Vec<Box<dyn DistanceEstimator>>,
        cache: DistanceCache,
        clock: Arc<dyn Clock>,
        max_plausible_km: f64,
    ) -> Self {
        Self {
            strategies,
            cache,
            clock,
            max_plausible_km,
        }
    }

    pub fn cache(&self) -> &DistanceCache {
        &self.cache
    }

    /// Write distances resolved since the last flush to the cache file.
    pub fn flush(&self) {
        self.cache.flush();
    }

    /// Distance in km from `from` to `to`. Never fails; worst case is infinity.
    pub fn distance(&self, from: Coordinate, to: Coordinate) -> f64 {
        if from == to {
            return 0.0;
        }
        if !from.is_valid() || !to.is_valid() {
            warn!(?from, ?to, "coordinate out of range, pair is unreachable");
            return f64::INFINITY;
        }

        let key = distance_key(from, to);
        if let Some(cached) = self.cache.get(&key, self.clock.now()) {
            let straight = checked_km(from, to, self.max_plausible_km);
            if straight > 0.0 && cached.distance > straight * 2.0 {
                warn!(
                    %key,
                    cached = cached.distance,
                    straight,
                    "cached distance far exceeds straight line, recomputing"
                );
            } else {
                return cached.distance;
            }
        }

        let km = self.estimate(from, to);
        if km.is_finite() {
            self.cache
                .insert_deferred(key, DistanceValue { distance: km }, self.clock.now());
        }
        km
    }

    fn estimate(&self, from: Coordinate, to: Coordinate) -> f64 {
        for strategy in &self.strategies {
            if let Some(km) = strategy.estimate_km(from, to) {
                debug!(strategy = strategy.name(), km, "distance estimated");
                return km;
            }
            debug!(strategy = strategy.name(), "strategy declined, trying next");
        }
        warn!(?from, ?to, "no strategy produced a distance");
        f64::INFINITY
    }
}
