use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use serde::{Deserialize, Serialize};

use super::{Demand, DemandId, Location};

/// Process-wide route counter; ids start at 1.
static ROUTE_SEQ: AtomicU64 = AtomicU64::new(1);

/// Coordinator-generated route identifier, unique for the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RouteId(pub u64);

impl RouteId {
    pub(crate) fn next() -> Self {
        RouteId(ROUTE_SEQ.fetch_add(1, AtomicOrdering::Relaxed))
    }
}

impl fmt::Display for RouteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An ordered tour owned by exactly one worker.
///
/// Immutable once dispatched.
#[derive(Debug, Clone, PartialEq)]
pub struct Route {
    pub id: RouteId,
    /// Name of the worker the route was planned for.
    pub worker: String,
    /// 1-based index of the worker in the capability list handed to the solver.
    pub worker_index: u32,
    pub demands: Vec<Demand>,
    pub total_quantity: u32,
    /// Length of `depot → demands (in order) → depot`.
    pub total_distance: f64,
}

impl Route {
    /// Builds a route and computes its totals against `depot`.
    pub fn new(
        id: RouteId,
        worker: impl Into<String>,
        worker_index: u32,
        demands: Vec<Demand>,
        depot: Location,
    ) -> Self {
        let total_quantity = demands.iter().map(|d| d.quantity).sum();
        let total_distance = tour_length(depot, demands.iter().map(|d| d.location));
        Self {
            id,
            worker: worker.into(),
            worker_index,
            demands,
            total_quantity,
            total_distance,
        }
    }

    pub fn demand_ids(&self) -> impl Iterator<Item = DemandId> + '_ {
        self.demands.iter().map(|d| d.id)
    }
}

/// Closed tour length starting and ending at `depot`.
pub(crate) fn tour_length(depot: Location, stops: impl IntoIterator<Item = Location>) -> f64 {
    let mut total = 0.0;
    let mut at = depot;
    for stop in stops {
        total += at.distance_to(&stop);
        at = stop;
    }
    total + at.distance_to(&depot)
}
