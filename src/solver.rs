//! Route builder: banded nearest-neighbor construction plus adjacent-swap
//! refinement over a precomputed distance matrix.
//!
//! The start point is always index 0 and never moves. `f64::INFINITY` in the
//! matrix marks a pair with no usable edge.

use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SolveOptions {
    /// Distance bands in km, tightest first. The next stop is the nearest
    /// point inside the first non-empty band, else the nearest overall.
    pub bands_km: Vec<f64>,
    /// Upper bound on refinement passes; each applied swap strictly shortens
    /// the route, so this is only a backstop.
    pub max_refine_passes: usize,
}

impl Default for SolveOptions {
    fn default() -> Self {
        Self {
            bands_km: vec![5.0, 10.0, 20.0],
            max_refine_passes: 10_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteResult {
    /// Visiting order, starting with 0.
    pub order: Vec<usize>,
    /// `legs[k]` is the distance from `order[k]` to `order[k + 1]`.
    pub legs: Vec<f64>,
    pub total_km: f64,
}

/// Partition of points by how far they sit from everything else.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OutlierReport {
    pub main: Vec<usize>,
    pub outliers: Vec<usize>,
    pub global_mean_km: f64,
    pub global_stddev_km: f64,
}

pub fn solve(matrix: &[Vec<f64>], options: &SolveOptions) -> RouteResult {
    let initial = nearest_neighbor(matrix, &options.bands_km);
    let order = refine_adjacent_swaps(initial, matrix, options.max_refine_passes);
    let legs = leg_distances(&order, matrix);
    let total_km = legs.iter().sum();
    debug!(stops = order.len(), total_km, "route built");
    RouteResult {
        order,
        legs,
        total_km,
    }
}

/// Greedy tour from index 0, preferring the tightest non-empty band.
pub fn nearest_neighbor(matrix: &[Vec<f64>], bands_km: &[f64]) -> Vec<usize> {
    let n = matrix.len();
    match n {
        0 => return Vec::new(),
        1 => return vec![0],
        _ => {}
    }

    let mut route = Vec::with_capacity(n);
    route.push(0);
    let mut unvisited: Vec<usize> = (1..n).collect();

    while !unvisited.is_empty() {
        let current = route[route.len() - 1];
        let row = &matrix[current];
        let next = next_stop(row, &unvisited, bands_km);
        unvisited.retain(|&p| p != next);
        debug!(from = current, to = next, km = row[next], "next stop");
        route.push(next);
    }

    route
}

/// Nearest point within the first band that has any; nearest overall if none.
/// Ties go to the lower index since `unvisited` is kept sorted.
fn next_stop(row: &[f64], unvisited: &[usize], bands_km: &[f64]) -> usize {
    for &band in bands_km {
        if let Some(p) = nearest(row, unvisited.iter().copied().filter(|&p| row[p] < band)) {
            return p;
        }
    }
    nearest(row, unvisited.iter().copied()).unwrap_or(unvisited[0])
}

fn nearest(row: &[f64], candidates: impl Iterator<Item = usize>) -> Option<usize> {
    candidates.fold(None, |best, p| match best {
        Some(b) if row[b] <= row[p] => Some(b),
        _ => Some(p),
    })
}

/// Swap adjacent stops while doing so strictly shortens the route.
///
/// Position 0 stays fixed. A swap of `a, b` is judged on the full window
/// `prev -> a -> b -> next` against `prev -> b -> a -> next`, so the total
/// never goes up. Stops after a pass with no swap.
pub fn refine_adjacent_swaps(mut route: Vec<usize>, matrix: &[Vec<f64>], max_passes: usize) -> Vec<usize> {
    if route.len() < 3 {
        return route;
    }

    for _ in 0..max_passes {
        let mut improved = false;
        for i in 1..route.len() - 1 {
            let prev = route[i - 1];
            let a = route[i];
            let b = route[i + 1];
            let next = route.get(i + 2).copied();

            let tail = |from: usize| next.map_or(0.0, |n| matrix[from][n]);
            let current = matrix[prev][a] + matrix[a][b] + tail(b);
            let swapped = matrix[prev][b] + matrix[b][a] + tail(a);

            if swapped < current {
                route.swap(i, i + 1);
                improved = true;
                debug!(position = i, saved_km = current - swapped, "swapped adjacent stops");
            }
        }
        if !improved {
            break;
        }
    }

    route
}

/// Matrix entries along consecutive stops of `order`.
pub fn leg_distances(order: &[usize], matrix: &[Vec<f64>]) -> Vec<f64> {
    order
        .windows(2)
        .map(|pair| matrix[pair[0]][pair[1]])
        .collect()
}

pub fn route_length(order: &[usize], matrix: &[Vec<f64>]) -> f64 {
    leg_distances(order, matrix).iter().sum()
}

/// Flag points whose mean distance to the others exceeds
/// `global_mean + deviations * global_stddev`.
///
/// Only finite off-diagonal entries count. A point with no finite entries in
/// its row lands in neither list.
pub fn find_outliers(matrix: &[Vec<f64>], deviations: f64) -> OutlierReport {
    let n = matrix.len();
    if n <= 1 {
        return OutlierReport::default();
    }

    let finite_row = |i: usize| {
        matrix[i]
            .iter()
            .enumerate()
            .filter(move |&(j, d)| j != i && d.is_finite())
            .map(|(_, &d)| d)
    };

    let all: Vec<f64> = (0..n).flat_map(finite_row).collect();
    if all.is_empty() {
        return OutlierReport::default();
    }

    let mean = all.iter().sum::<f64>() / all.len() as f64;
    let variance = all.iter().map(|d| (d - mean).powi(2)).sum::<f64>() / all.len() as f64;
    let stddev = variance.sqrt();
    let threshold = mean + deviations * stddev;

    let mut report = OutlierReport {
        global_mean_km: mean,
        global_stddev_km: stddev,
        ..OutlierReport::default()
    };
    for i in 0..n {
        let row: Vec<f64> = finite_row(i).collect();
        if row.is_empty() {
            continue;
        }
        let own_mean = row.iter().sum::<f64>() / row.len() as f64;
        if own_mean > threshold {
            debug!(point = i, own_mean, threshold, "outlier");
            report.outliers.push(i);
        } else {
            report.main.push(i);
        }
    }
    report
}
