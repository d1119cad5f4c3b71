//! Finished route plans and where they go.

use std::io::Write;

use serde::Serialize;

use crate::coordinate::Coordinate;
use crate::error::ReportError;
use crate::traits::ReportSink;

/// One stop on the planned route, in visiting order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlannedStop {
    /// Recipient name; `None` for the start point.
    pub name: Option<String>,
    pub address: String,
    pub coordinate: Coordinate,
    /// Distance driven to reach this stop; zero for the start.
    pub leg_km: f64,
    pub maps_url: String,
}

/// An input row that could not be placed on the map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnresolvedAddress {
    /// 1-based position in the input.
    pub row: usize,
    pub name: String,
    pub address: String,
}

/// A stop whose mean distance to the others stands out.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutlierStop {
    pub name: Option<String>,
    pub address: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoutePlan {
    pub stops: Vec<PlannedStop>,
    pub legs_km: Vec<f64>,
    pub total_km: f64,
    pub unresolved: Vec<UnresolvedAddress>,
    pub outliers: Vec<OutlierStop>,
}

impl RoutePlan {
    /// Delivery stops only, without the start point.
    pub fn deliveries(&self) -> &[PlannedStop] {
        self.stops.get(1..).unwrap_or(&[])
    }
}

/// Writes the plan as pretty-printed JSON.
#[derive(Debug)]
pub struct JsonReportSink<W: Write> {
    writer: W,
}

impl<W: Write> JsonReportSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> ReportSink for JsonReportSink<W> {
    fn deliver(&mut self, plan: &RoutePlan) -> Result<(), ReportError> {
        serde_json::to_writer_pretty(&mut self.writer, plan)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok(())
    }
}
