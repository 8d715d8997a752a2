use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::coordinator::{CoordinatorHandle, CoordinatorSnapshot};
use crate::directory::Directory;
use crate::error::{ConfigError, RuntimeError};
use crate::events::{Bus, Event};
use crate::model::{Batch, Location};
use crate::protocol::is_valid_name;
use crate::worker::WorkerParams;

/// A vehicle to add to the fleet.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerSpec {
    pub name: String,
    pub capacity: u32,
    pub max_distance: f64,
    /// Home depot; the coordinator's depot when `None`.
    pub depot: Option<Location>,
}

impl WorkerSpec {
    pub fn new(name: impl Into<String>, capacity: u32, max_distance: f64) -> Self {
        Self {
            name: name.into(),
            capacity,
            max_distance,
            depot: None,
        }
    }

    #[must_use]
    pub fn with_depot(mut self, depot: Location) -> Self {
        self.depot = Some(depot);
        self
    }

    pub(crate) fn params(&self, cfg: &Config) -> WorkerParams {
        WorkerParams::with_config(
            self.name.as_str(),
            self.capacity,
            self.max_distance,
            self.depot.unwrap_or(cfg.coordinator.depot),
            &cfg.worker,
        )
    }
}

/// Cloneable handle to a fleet, usable before and during [`Fleet::run`](super::Fleet::run).
#[derive(Clone)]
pub struct FleetHandle {
    pub(crate) coordinator: CoordinatorHandle,
    pub(crate) directory: Directory,
    pub(crate) bus: Bus,
    pub(crate) stop: CancellationToken,
    pub(crate) spawn_tx: mpsc::UnboundedSender<WorkerSpec>,
}

impl FleetHandle {
    /// Receiver for every event published after this call.
    pub fn events(&self) -> broadcast::Receiver<Event> {
        self.bus.subscribe()
    }

    /// Queues a batch for planning.
    pub async fn submit(&self, batch: Batch) -> Result<(), RuntimeError> {
        self.coordinator.submit(batch).await
    }

    pub async fn snapshot(&self) -> Result<CoordinatorSnapshot, RuntimeError> {
        self.coordinator.snapshot().await
    }

    /// Adds a worker to the running fleet.
    ///
    /// A name already taken in the directory surfaces later as a
    /// `registration_failed` event.
    pub fn spawn_worker(&self, spec: WorkerSpec) -> Result<(), RuntimeError> {
        if !is_valid_name(&spec.name) {
            return Err(ConfigError::invalid(format!("worker name {:?} is not usable", spec.name)).into());
        }
        self.spawn_tx.send(spec).map_err(|_| RuntimeError::FleetStopped)
    }

    pub fn directory(&self) -> &Directory {
        &self.directory
    }

    /// Asks the fleet to stop, as an OS signal would.
    pub fn shutdown(&self) {
        self.stop.cancel();
    }
}
