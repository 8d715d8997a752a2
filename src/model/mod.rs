//! Domain data shared by the coordinator, the workers and the batch boundary.
//!
//! ## Contents
//! - [`Location`] planar point with euclidean distance
//! - [`Demand`], [`DemandId`] a customer request for some quantity at a location
//! - [`WorkerCapability`] what a worker reported about itself in the last discovery round
//! - [`Route`], [`RouteId`] an ordered tour `depot → demands → depot` owned by one worker
//! - [`Batch`], [`BatchId`] demands submitted together (fresh) or recycled (synthetic)
//! - [`SolutionReport`] the result submitted back to the batch source for one round

mod batch;
mod capability;
mod demand;
mod geo;
mod report;
mod route;

pub use batch::{Batch, BatchId};
pub use capability::WorkerCapability;
pub use demand::{Demand, DemandId};
pub use geo::Location;
pub use report::{DemandRecord, RouteReport, SolutionReport};
pub use route::{Route, RouteId};
pub(crate) use route::tour_length;
