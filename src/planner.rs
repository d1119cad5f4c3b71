//! End-to-end planning run: resolve addresses, build the distance matrix,
//! flag outliers and order the stops.

use std::convert::Infallible;
use std::fmt;
use std::sync::Arc;

use tracing::{info, warn};

use crate::address::maps_search_url;
use crate::batch::{BatchOrchestrator, ItemStatus};
use crate::cache::{CacheStore, DistanceCache, GeoCache};
use crate::config::{DistanceSource, PlannerConfig};
use crate::coordinate::Coordinate;
use crate::distance::DistanceResolver;
use crate::error::PlanError;
use crate::geocode::{CoordinateResolver, ResolutionRecord, ResolutionStatus};
use crate::geodesic::GeodesicEstimator;
use crate::nominatim::NominatimClient;
use crate::osrm::{OsrmClient, OsrmEstimator};
use crate::report::{OutlierStop, PlannedStop, RoutePlan, UnresolvedAddress};
use crate::solver::{self, SolveOptions};
use crate::traits::{Clock, DeliveryRecord, DistanceEstimator, Geocoder, ReportSink, SystemClock};
use crate::valhalla::{ValhallaClient, ValhallaEstimator};

pub struct Planner {
    resolver: CoordinateResolver,
    distances: DistanceResolver,
    batch: BatchOrchestrator,
    solve: SolveOptions,
    outlier_deviations: f64,
}

impl fmt::Debug for Planner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Planner")
            .field("resolver", &self.resolver)
            .field("distances", &self.distances)
            .field("batch", &self.batch)
            .field("solve", &self.solve)
            .field("outlier_deviations", &self.outlier_deviations)
            .finish()
    }
}

/// A point on the map and the input row it came from (`None` for the start).
struct Point<'a> {
    coordinate: Coordinate,
    record: Option<&'a DeliveryRecord>,
}

impl Planner {
    /// Production wiring: Nominatim, the configured distance sources and the
    /// system clock.
    pub fn new(config: PlannerConfig) -> Result<Self, PlanError> {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let geocoder = NominatimClient::new(config.nominatim.clone()).map_err(PlanError::HttpClient)?;
        let strategies = distance_strategies(&config, clock.clone())?;
        Self::with_parts(&config, Box::new(geocoder), strategies, clock)
    }

    /// Wire a planner around caller-supplied collaborators.
    pub fn with_parts(
        config: &PlannerConfig,
        geocoder: Box<dyn Geocoder>,
        strategies: Vec<Box<dyn DistanceEstimator>>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, PlanError> {
        let ttl = config.cache.ttl();
        let now = clock.now();
        let geo_cache = GeoCache::open(CacheStore::new(config.cache.geocode_path.clone(), ttl), now);
        let distance_cache =
            DistanceCache::open(CacheStore::new(config.cache.distance_path.clone(), ttl), now);
        info!(
            geocoded = geo_cache.len(),
            distances = distance_cache.len(),
            "caches loaded"
        );

        let resolver = CoordinateResolver::new(
            geocoder,
            geo_cache,
            clock.clone(),
            config.geocoding.clone(),
        );
        let distances = DistanceResolver::new(
            strategies,
            distance_cache,
            clock,
            config.fallback.max_plausible_km,
        );

        Ok(Self {
            resolver,
            distances,
            batch: BatchOrchestrator::new(config.batch.workers)?,
            solve: config.solver.clone(),
            outlier_deviations: config.outliers.deviations,
        })
    }

    /// Plan a route from `start` through every resolvable record.
    pub fn plan(&self, start: &str, records: &[DeliveryRecord]) -> Result<RoutePlan, PlanError> {
        if records.is_empty() {
            return Err(PlanError::NoAddresses);
        }

        let start_record = self.resolver.resolve(0, start);
        let Some(start_coordinate) = start_record.coordinate else {
            return Err(PlanError::StartUnresolved(start.to_string()));
        };
        info!(address = start, status = %start_record.status, "start resolved");

        let resolved = self.resolve_records(records);

        let mut points = vec![Point {
            coordinate: start_coordinate,
            record: None,
        }];
        let mut unresolved = Vec::new();
        for (record, resolution) in records.iter().zip(&resolved) {
            match resolution.coordinate {
                Some(coordinate) => points.push(Point {
                    coordinate,
                    record: Some(record),
                }),
                None => unresolved.push(UnresolvedAddress {
                    row: resolution.index,
                    name: record.name.clone(),
                    address: record.address.clone(),
                }),
            }
        }
        if !unresolved.is_empty() {
            warn!(count = unresolved.len(), "addresses left off the route");
        }
        if points.len() < 2 {
            return Err(PlanError::TooFewPoints {
                resolved: points.len(),
            });
        }

        let coords: Vec<Coordinate> = points.iter().map(|p| p.coordinate).collect();
        let matrix = self
            .batch
            .distance_matrix(&coords, |from, to| self.distances.distance(from, to));
        self.distances.flush();

        let report = solver::find_outliers(&matrix, self.outlier_deviations);
        let outliers = report
            .outliers
            .iter()
            .map(|&idx| {
                let stop = describe(&points[idx], start);
                warn!(address = %stop.address, "stop is far from the rest of the route");
                stop
            })
            .collect();

        let route = solver::solve(&matrix, &self.solve);
        let stops: Vec<PlannedStop> = route
            .order
            .iter()
            .enumerate()
            .map(|(pos, &idx)| {
                let OutlierStop { name, address } = describe(&points[idx], start);
                let leg_km = if pos == 0 { 0.0 } else { route.legs[pos - 1] };
                if !leg_km.is_finite() {
                    warn!(%address, "no usable distance to this stop");
                }
                PlannedStop {
                    name,
                    maps_url: maps_search_url(&address),
                    address,
                    coordinate: points[idx].coordinate,
                    leg_km,
                }
            })
            .collect();

        info!(
            stops = stops.len(),
            unresolved = unresolved.len(),
            total_km = route.total_km,
            "route planned"
        );

        Ok(RoutePlan {
            stops,
            legs_km: route.legs,
            total_km: route.total_km,
            unresolved,
            outliers,
        })
    }

    /// Plan and hand the result to `sink`.
    pub fn plan_into(
        &self,
        start: &str,
        records: &[DeliveryRecord],
        sink: &mut dyn ReportSink,
    ) -> Result<RoutePlan, PlanError> {
        let plan = self.plan(start, records)?;
        sink.deliver(&plan)?;
        Ok(plan)
    }

    /// Resolve every record on the pool; `index` is the 1-based input row.
    fn resolve_records(&self, records: &[DeliveryRecord]) -> Vec<ResolutionRecord> {
        let items: Vec<(usize, &str)> = records
            .iter()
            .enumerate()
            .map(|(i, record)| (i + 1, record.address.as_str()))
            .collect();

        let statuses = self.batch.run(&items, |&(row, address)| {
            Ok::<_, Infallible>(self.resolver.resolve(row, address))
        });

        items
            .iter()
            .zip(statuses)
            .map(|(&(row, address), status)| {
                let record = match status {
                    ItemStatus::Succeeded(record) => record,
                    ItemStatus::Failed { reason } => {
                        warn!(row, address, %reason, "resolution aborted");
                        ResolutionRecord {
                            index: row,
                            address: address.to_string(),
                            coordinate: None,
                            status: ResolutionStatus::Failed,
                        }
                    }
                };
                info!(row, status = %record.status, address, "address");
                record
            })
            .collect()
    }
}

fn describe(point: &Point<'_>, start: &str) -> OutlierStop {
    match point.record {
        Some(record) => OutlierStop {
            name: Some(record.name.clone()),
            address: record.address.clone(),
        },
        None => OutlierStop {
            name: None,
            address: start.to_string(),
        },
    }
}

/// Estimators for `routing.sources`, in order.
pub fn distance_strategies(
    config: &PlannerConfig,
    clock: Arc<dyn Clock>,
) -> Result<Vec<Box<dyn DistanceEstimator>>, PlanError> {
    config
        .routing
        .sources
        .iter()
        .map(|source| -> Result<Box<dyn DistanceEstimator>, PlanError> {
            Ok(match source {
                DistanceSource::Osrm => {
                    let client =
                        OsrmClient::new(config.routing.osrm.clone()).map_err(PlanError::HttpClient)?;
                    Box::new(OsrmEstimator::new(client, clock.clone()))
                }
                DistanceSource::Valhalla => {
                    let client = ValhallaClient::new(config.routing.valhalla.clone())
                        .map_err(PlanError::HttpClient)?;
                    Box::new(ValhallaEstimator::new(client, clock.clone()))
                }
                DistanceSource::Geodesic => Box::new(GeodesicEstimator::new(config.fallback.clone())),
            })
        })
        .collect()
}
