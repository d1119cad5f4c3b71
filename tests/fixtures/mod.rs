//! Test fixtures for delivery-planner.
//!
//! Provides:
//! - Real locations around Jaú / Itapuí (São Paulo state)
//! - A loopback HTTP server that stands in for Nominatim, OSRM and Valhalla

#![allow(dead_code)]

pub mod jau_region_locations;
pub mod stub_server;

pub use jau_region_locations::*;
pub use stub_server::{CannedResponse, RecordedRequest, StubServer};
