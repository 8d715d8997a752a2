//! # Route solver boundary.
//!
//! A [`RouteSolver`] turns a depot, a set of demands and the capabilities of
//! the workers that answered this round into planned routes plus the demands
//! it could not place. Objective: maximize served quantity, then minimize
//! total distance. Every planned route must respect its worker's capacity and
//! maximum distance (workers re-check both and refuse violations).
//!
//! The coordinator calls the solver inline from its control loop, assigns route
//! ids, and reconciles whatever the plan leaves out.
//!
//! [`GreedySolver`] is a reference implementation; plug a real optimizer by
//! implementing the trait.

mod greedy;

pub use greedy::GreedySolver;

use crate::error::SolveError;
use crate::model::{Demand, Location, WorkerCapability};

/// One planned route before the coordinator assigns it an id.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedRoute {
    /// 0-based index into the `workers` slice handed to the solver.
    pub worker: usize,
    /// Stops in visiting order.
    pub demands: Vec<Demand>,
}

/// Output of a solve.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Solution {
    pub routes: Vec<PlannedRoute>,
    pub unplaced: Vec<Demand>,
}

/// Pluggable routing optimizer.
pub trait RouteSolver: Send + Sync + 'static {
    fn solve(
        &self,
        depot: Location,
        demands: &[Demand],
        workers: &[WorkerCapability],
    ) -> Result<Solution, SolveError>;

    /// Human-readable name (for logs).
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}
