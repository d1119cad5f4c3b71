//! delivery-planner
//!
//! Turns a start address and a list of delivery records into an ordered
//! driving route: addresses are geocoded and pairwise road distances fetched
//! through expiring disk caches, lookups fan out over a bounded worker pool,
//! and the stops are ordered by a banded nearest-neighbor tour with
//! adjacent-swap refinement.

pub mod address;
pub mod batch;
pub mod cache;
pub mod config;
pub mod coordinate;
pub mod distance;
pub mod error;
pub mod geocode;
pub mod geodesic;
pub mod nominatim;
pub mod osrm;
pub mod planner;
pub mod report;
pub mod retry;
pub mod solver;
pub mod traits;
pub mod valhalla;

#[doc(hidden)]
pub mod test_support;

pub use config::PlannerConfig;
pub use coordinate::Coordinate;
pub use error::PlanError;
pub use planner::Planner;
pub use report::{JsonReportSink, RoutePlan};
pub use traits::{DeliveryRecord, ReportSink};
