//! # Fleet configuration.
//!
//! [`Config`] centralizes every knob of the runtime. All fields are public and
//! have defaults; a config can also be loaded from TOML with
//! [`Config::from_file`] / [`str::parse`] and adjusted from `ROUTEVISOR_*`
//! environment variables with [`Config::with_env_overrides`].
//!
//! Durations are written as integer milliseconds in TOML (`*_ms` keys):
//! ```toml
//! grace_ms = 10000
//!
//! [coordinator]
//! flush_threshold = 6
//! capability_min_wait_ms = 5000
//! capability_timeout_ms = 10000
//! rejection_policy = "requeue"
//! max_unplaced_rounds = 0
//! depot = { x = 0.0, y = 0.0 }
//!
//! [worker]
//! tick_ms = 1000
//! speed = 1.0
//!
//! [poll]
//! first_ms = 500
//! max_ms = 5000
//! jitter = "equal"
//! ```
//!
//! ## Sentinel values
//! - `max_unplaced_rounds = 0` → demands are retried forever
//! - `bus_capacity` / `mailbox_capacity` are clamped to at least 1

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::model::Location;
use crate::policies::{BackoffPolicy, JitterPolicy, RejectionPolicy};

/// Global configuration for the fleet runtime.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Maximum time to wait for actors to stop after shutdown was requested.
    #[serde(rename = "grace_ms", with = "millis")]
    pub grace: Duration,

    /// Capacity of the event bus broadcast ring buffer.
    pub bus_capacity: usize,

    /// Capacity of every actor mailbox. A message to a full mailbox is dropped and logged.
    pub mailbox_capacity: usize,

    pub coordinator: CoordinatorConfig,
    pub worker: WorkerConfig,
    pub poll: PollConfig,
}

/// Coordinator scheduling, discovery and dispatch settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// Directory name of the coordinator.
    pub name: String,

    /// Depot every route starts from and returns to.
    pub depot: Location,

    /// Buffer size that forces a synthetic round ahead of queued batches.
    pub flush_threshold: usize,

    /// Period of the scheduler tick.
    #[serde(rename = "schedule_interval_ms", with = "millis")]
    pub schedule_interval: Duration,

    /// Capability collection never completes earlier than this.
    #[serde(rename = "capability_min_wait_ms", with = "millis")]
    pub capability_min_wait: Duration,

    /// Capability collection proceeds with whatever arrived after this.
    #[serde(rename = "capability_timeout_ms", with = "millis")]
    pub capability_timeout: Duration,

    /// Minimum time a round stays open after dispatch to collect answers.
    #[serde(rename = "settle_ms", with = "millis")]
    pub settle: Duration,

    /// Unanswered proposals are considered lost after this.
    #[serde(rename = "proposal_timeout_ms", with = "millis")]
    pub proposal_timeout: Duration,

    /// Fate of demands on rejected, lost, or unresolvable routes.
    pub rejection_policy: RejectionPolicy,

    /// Consecutive unplaced rounds before a demand is abandoned (`0` = never).
    pub max_unplaced_rounds: u32,
}

/// Worker movement settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Movement tick period.
    #[serde(rename = "tick_ms", with = "millis")]
    pub tick: Duration,

    /// Distance covered per tick.
    pub speed: f64,

    /// A target is reached when closer than this.
    pub arrival_threshold: f64,

    /// Period of the idle-position check.
    #[serde(rename = "drift_check_ms", with = "millis")]
    pub drift_check: Duration,
}

/// Source poll backoff, see [`BackoffPolicy`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    #[serde(rename = "first_ms", with = "millis")]
    pub first: Duration,
    #[serde(rename = "max_ms", with = "millis")]
    pub max: Duration,
    pub factor: f64,
    pub jitter: JitterPolicy,
}

impl Default for Config {
    /// - `grace = 10s`
    /// - `bus_capacity = 1024`
    /// - `mailbox_capacity = 256`
    fn default() -> Self {
        Self {
            grace: Duration::from_secs(10),
            bus_capacity: 1024,
            mailbox_capacity: 256,
            coordinator: CoordinatorConfig::default(),
            worker: WorkerConfig::default(),
            poll: PollConfig::default(),
        }
    }
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            name: "coordinator".to_string(),
            depot: Location::ORIGIN,
            flush_threshold: 6,
            schedule_interval: Duration::from_secs(1),
            capability_min_wait: Duration::from_secs(5),
            capability_timeout: Duration::from_secs(10),
            settle: Duration::from_secs(1),
            proposal_timeout: Duration::from_secs(5),
            rejection_policy: RejectionPolicy::Requeue,
            max_unplaced_rounds: 0,
        }
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            tick: Duration::from_secs(1),
            speed: 1.0,
            arrival_threshold: 1.0,
            drift_check: Duration::from_secs(5),
        }
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        let b = BackoffPolicy::default();
        Self {
            first: b.first,
            max: b.max,
            factor: b.factor,
            jitter: b.jitter,
        }
    }
}

impl PollConfig {
    pub fn backoff(&self) -> BackoffPolicy {
        BackoffPolicy {
            first: self.first,
            max: self.max,
            factor: self.factor,
            jitter: self.jitter,
        }
    }
}

impl CoordinatorConfig {
    /// Rounds after which an unplaced demand is abandoned, if bounded.
    #[inline]
    pub fn abandon_after(&self) -> Option<u32> {
        match self.max_unplaced_rounds {
            0 => None,
            n => Some(n),
        }
    }
}

impl Config {
    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }

    /// Returns a mailbox capacity clamped to a minimum of 1.
    #[inline]
    pub fn mailbox_capacity_clamped(&self) -> usize {
        self.mailbox_capacity.max(1)
    }

    /// Loads, parses and validates a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let cfg: Config = text.parse()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Checks values that would make the runtime misbehave.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let c = &self.coordinator;
        if c.name.is_empty() {
            return Err(ConfigError::invalid("coordinator.name must not be empty"));
        }
        if !c.depot.is_finite() {
            return Err(ConfigError::invalid("coordinator.depot must be finite"));
        }
        if c.flush_threshold == 0 {
            return Err(ConfigError::invalid("coordinator.flush_threshold must be > 0"));
        }
        if c.schedule_interval.is_zero() {
            return Err(ConfigError::invalid("coordinator.schedule_interval_ms must be > 0"));
        }
        if c.capability_min_wait > c.capability_timeout {
            return Err(ConfigError::invalid(
                "coordinator.capability_min_wait_ms must not exceed capability_timeout_ms",
            ));
        }
        if c.settle > c.proposal_timeout {
            return Err(ConfigError::invalid(
                "coordinator.settle_ms must not exceed proposal_timeout_ms",
            ));
        }

        let w = &self.worker;
        if w.tick.is_zero() || w.drift_check.is_zero() {
            return Err(ConfigError::invalid("worker.tick_ms and worker.drift_check_ms must be > 0"));
        }
        if !(w.speed.is_finite() && w.speed > 0.0) {
            return Err(ConfigError::invalid("worker.speed must be a positive number"));
        }
        if !(w.arrival_threshold.is_finite() && w.arrival_threshold >= 0.0) {
            return Err(ConfigError::invalid("worker.arrival_threshold must be >= 0"));
        }

        if self.poll.first.is_zero() {
            return Err(ConfigError::invalid("poll.first_ms must be > 0"));
        }
        if !(self.poll.factor.is_finite() && self.poll.factor > 0.0) {
            return Err(ConfigError::invalid("poll.factor must be a positive number"));
        }
        Ok(())
    }

    /// Applies `ROUTEVISOR_*` environment overrides. Unparsable values are ignored.
    ///
    /// - `ROUTEVISOR_GRACE_MS`
    /// - `ROUTEVISOR_FLUSH_THRESHOLD`
    /// - `ROUTEVISOR_MAX_UNPLACED_ROUNDS`
    /// - `ROUTEVISOR_REJECTION_POLICY` (`requeue` / `drop`)
    /// - `ROUTEVISOR_CAPABILITY_TIMEOUT_MS`
    /// - `ROUTEVISOR_WORKER_TICK_MS`
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(ms) = env_parse::<u64>("ROUTEVISOR_GRACE_MS") {
            self.grace = Duration::from_millis(ms);
        }
        if let Some(v) = env_parse("ROUTEVISOR_FLUSH_THRESHOLD") {
            self.coordinator.flush_threshold = v;
        }
        if let Some(v) = env_parse("ROUTEVISOR_MAX_UNPLACED_ROUNDS") {
            self.coordinator.max_unplaced_rounds = v;
        }
        if let Some(v) = env_parse("ROUTEVISOR_REJECTION_POLICY") {
            self.coordinator.rejection_policy = v;
        }
        if let Some(ms) = env_parse::<u64>("ROUTEVISOR_CAPABILITY_TIMEOUT_MS") {
            self.coordinator.capability_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = env_parse::<u64>("ROUTEVISOR_WORKER_TICK_MS") {
            self.worker.tick = Duration::from_millis(ms);
        }
        self
    }
}

impl FromStr for Config {
    type Err = ConfigError;

    /// Parses configuration from a TOML string (without validating it).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(toml::from_str(s)?)
    }
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok()?.parse().ok()
}

/// Serde adapter storing a [`Duration`] as integer milliseconds.
mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}
