use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::Location;

/// Stable identifier of a demand, kept across planning rounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DemandId(pub u64);

impl fmt::Display for DemandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for DemandId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(DemandId)
    }
}

/// A request to deliver `quantity` units to `location`.
///
/// A later copy with the same [`DemandId`] supersedes an earlier one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Demand {
    pub id: DemandId,
    pub name: String,
    pub quantity: u32,
    pub location: Location,
}

impl Demand {
    /// Creates a demand named `C<id>`.
    pub fn new(id: u64, quantity: u32, location: Location) -> Self {
        Self {
            id: DemandId(id),
            name: format!("C{id}"),
            quantity,
            location,
        }
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// A demand can be planned when it asks for something at a real place.
    pub fn is_plannable(&self) -> bool {
        self.quantity > 0 && self.location.is_finite()
    }
}
