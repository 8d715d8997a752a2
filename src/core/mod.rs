//! Runtime shell: assembles and runs a fleet.
//!
//! - [`builder`]: [`FleetBuilder`] validates the config and wires the actors;
//! - [`fleet`]: [`Fleet`] runs them, fans events out to subscribers and shuts down with a grace period;
//! - [`handle`]: [`FleetHandle`] talks to a running fleet;
//! - [`shutdown`]: cross-platform termination signals.

mod builder;
mod fleet;
mod handle;
mod shutdown;

pub use builder::FleetBuilder;
pub use fleet::Fleet;
pub use handle::{FleetHandle, WorkerSpec};
