//! Deterministic doubles for the planner's external collaborators.
//!
//! [`ManualClock`] replaces wall-clock time and sleeping, [`StubGeocoder`]
//! answers geocoding requests from a table, and [`FixedEstimator`] returns a
//! preset distance (or nothing) for every pair.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, TimeZone, Utc};

use crate::coordinate::Coordinate;
use crate::error::GeocodeError;
use crate::traits::{Clock, DistanceEstimator, Geocoder};

/// Virtual clock: `sleep` advances time instantly and records the delay.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
    sleeps: Mutex<Vec<Duration>>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::at(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).single().unwrap_or_default())
    }
}

impl ManualClock {
    pub fn at(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
            sleeps: Mutex::new(Vec::new()),
        }
    }

    /// Move time forward without recording a sleep.
    pub fn advance(&self, delta: TimeDelta) {
        if let Ok(mut now) = self.now.lock() {
            *now += delta;
        }
    }

    /// Every delay passed to [`Clock::sleep`], in call order.
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        self.now.lock().map(|now| *now).unwrap_or_default()
    }

    fn sleep(&self, duration: Duration) {
        if let Ok(mut sleeps) = self.sleeps.lock() {
            sleeps.push(duration);
        }
        if let Ok(delta) = TimeDelta::from_std(duration) {
            self.advance(delta);
        }
    }
}

/// Geocoder answering from a fixed table; unknown addresses get `NoResult`.
#[derive(Debug, Default)]
pub struct StubGeocoder {
    known: HashMap<String, Coordinate>,
    calls: AtomicUsize,
}

impl StubGeocoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, address: &str, coord: Coordinate) -> Self {
        self.known.insert(address.to_string(), coord);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Geocoder for StubGeocoder {
    fn geocode(&self, address: &str) -> Result<Coordinate, GeocodeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.known.get(address).copied().ok_or(GeocodeError::NoResult)
    }
}

/// Estimator returning the same answer for every pair and counting calls.
#[derive(Debug, Default)]
pub struct FixedEstimator {
    km: Option<f64>,
    calls: AtomicUsize,
}

impl FixedEstimator {
    pub fn returning(km: f64) -> Self {
        Self {
            km: Some(km),
            calls: AtomicUsize::new(0),
        }
    }

    /// An estimator that always declines.
    pub fn declining() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl DistanceEstimator for FixedEstimator {
    fn name(&self) -> &str {
        "fixed"
    }

    fn estimate_km(&self, _from: Coordinate, _to: Coordinate) -> Option<f64> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.km
    }
}

/// Manhattan-degree distances scaled to km-ish values, for planner tests.
#[derive(Debug, Default)]
pub struct GridEstimator;

impl DistanceEstimator for GridEstimator {
    fn name(&self) -> &str {
        "grid"
    }

    fn estimate_km(&self, from: Coordinate, to: Coordinate) -> Option<f64> {
        let km = ((from.lat - to.lat).abs() + (from.lon - to.lon).abs()) * 100.0;
        Some((km * 10.0).round() / 10.0)
    }
}
