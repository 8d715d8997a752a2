use serde::{Deserialize, Serialize};

/// What the coordinator does with the demands of a route that was rejected,
/// lost in transit, or addressed to a worker that cannot be resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RejectionPolicy {
    /// Put the demands back into the accumulation buffer for a later round.
    #[default]
    Requeue,
    /// Forget the demands; they are only logged.
    Drop,
}

impl RejectionPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectionPolicy::Requeue => "requeue",
            RejectionPolicy::Drop => "drop",
        }
    }
}

impl std::str::FromStr for RejectionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "requeue" => Ok(RejectionPolicy::Requeue),
            "drop" => Ok(RejectionPolicy::Drop),
            other => Err(format!("unknown rejection policy {other:?}")),
        }
    }
}
