use serde::{Deserialize, Serialize};

use super::Location;

/// Capability record of one worker, refreshed on every capability response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerCapability {
    /// Directory name of the worker (unique).
    pub name: String,
    /// Maximum quantity carried on one route.
    pub capacity: u32,
    /// Maximum closed-tour length of one route.
    pub max_distance: f64,
    /// Position reported with the capability.
    pub position: Location,
}
