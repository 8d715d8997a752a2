use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::Demand;

/// Identifier assigned to a batch by its source.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BatchId(Arc<str>);

impl BatchId {
    pub fn new(id: impl Into<Arc<str>>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BatchId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for BatchId {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

/// A set of demands processed in one planning round.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    pub id: BatchId,
    pub demands: Vec<Demand>,
    /// Built from previously unplaced demands rather than submitted by the source.
    pub synthetic: bool,
    /// For synthetic batches: the most recent fresh batch, used as the submission id.
    pub origin: Option<BatchId>,
}

impl Batch {
    /// A batch as submitted by a source.
    pub fn fresh(id: impl Into<BatchId>, demands: Vec<Demand>) -> Self {
        Self {
            id: id.into(),
            demands,
            synthetic: false,
            origin: None,
        }
    }

    /// A batch recycled from the accumulation buffer.
    pub fn synthetic(seq: u64, demands: Vec<Demand>, origin: Option<BatchId>) -> Self {
        Self {
            id: BatchId::new(format!("unplaced-{seq}")),
            demands,
            synthetic: true,
            origin,
        }
    }

    /// The id results of this batch are reported under, if any.
    pub fn submission_id(&self) -> Option<&BatchId> {
        if self.synthetic {
            self.origin.as_ref()
        } else {
            Some(&self.id)
        }
    }

    pub fn total_quantity(&self) -> u64 {
        self.demands.iter().map(|d| u64::from(d.quantity)).sum()
    }
}
