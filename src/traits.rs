//! Core traits for the delivery planner.
//!
//! Each external collaborator (wall clock, geocoding service, routing
//! service, report output) sits behind one of these so the resolvers and the
//! planner can be driven by deterministic doubles in tests.

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::coordinate::Coordinate;
use crate::error::{GeocodeError, ReportError};
use crate::report::RoutePlan;

/// Source of the current time and of blocking waits.
///
/// Back-off delays and cache timestamps both go through this trait.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// Block the calling worker for `duration`.
    fn sleep(&self, duration: Duration);

    /// Block until `deadline`; returns immediately if it has passed.
    fn sleep_until(&self, deadline: DateTime<Utc>) {
        if let Ok(remaining) = (deadline - self.now()).to_std() {
            if !remaining.is_zero() {
                self.sleep(remaining);
            }
        }
    }
}

/// Wall clock backed by [`Utc::now`] and [`std::thread::sleep`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// A single geocoding attempt: free-text address to coordinate.
///
/// Implementations make exactly one request; retrying is the caller's job.
pub trait Geocoder: Send + Sync {
    fn geocode(&self, address: &str) -> Result<Coordinate, GeocodeError>;
}

/// A strategy for estimating the road distance between two points.
///
/// Returns `None` when the strategy could not produce an estimate, letting
/// the caller fall through to the next one. `Some(f64::INFINITY)` means the
/// pair is known to be unusable.
pub trait DistanceEstimator: Send + Sync {
    /// Short label used in logs.
    fn name(&self) -> &str;

    fn estimate_km(&self, from: Coordinate, to: Coordinate) -> Option<f64>;
}

/// Consumer of a finished plan (PDF writer, spreadsheet annotator, ...).
pub trait ReportSink {
    fn deliver(&mut self, plan: &RoutePlan) -> Result<(), ReportError>;
}

/// One input row: who receives the delivery and where.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryRecord {
    pub name: String,
    pub address: String,
}

impl DeliveryRecord {
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
        }
    }
}
