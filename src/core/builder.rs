use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::fleet::Fleet;
use super::handle::WorkerSpec;
use crate::config::Config;
use crate::coordinator::CoordinatorActor;
use crate::directory::Directory;
use crate::error::{ConfigError, RuntimeError};
use crate::events::Bus;
use crate::protocol::is_valid_name;
use crate::solver::{GreedySolver, RouteSolver};
use crate::source::BatchSource;
use crate::subscribers::Subscribe;

/// Assembles a [`Fleet`].
///
/// Without [`with_solver`](Self::with_solver) the fleet plans with [`GreedySolver`].
/// Without [`with_source`](Self::with_source) batches only arrive through
/// [`FleetHandle::submit`](super::FleetHandle::submit) and no reports are delivered.
pub struct FleetBuilder {
    cfg: Config,
    solver: Option<Arc<dyn RouteSolver>>,
    source: Option<Arc<dyn BatchSource>>,
    workers: Vec<WorkerSpec>,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

impl FleetBuilder {
    pub fn new(cfg: Config) -> Self {
        Self {
            cfg,
            solver: None,
            source: None,
            workers: Vec::new(),
            subscribers: Vec::new(),
        }
    }

    pub fn with_solver(mut self, solver: impl RouteSolver) -> Self {
        self.solver = Some(Arc::new(solver));
        self
    }

    pub fn with_source(mut self, source: Arc<dyn BatchSource>) -> Self {
        self.source = Some(source);
        self
    }

    pub fn with_worker(mut self, spec: WorkerSpec) -> Self {
        self.workers.push(spec);
        self
    }

    pub fn with_workers(mut self, specs: impl IntoIterator<Item = WorkerSpec>) -> Self {
        self.workers.extend(specs);
        self
    }

    /// Event subscribers, each fed through its own bounded queue.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Validates the configuration and agent names and wires the actors.
    ///
    /// Nothing is spawned until [`Fleet::run`].
    pub fn build(self) -> Result<Fleet, RuntimeError> {
        self.cfg.validate()?;
        check_names(&self.cfg, &self.workers)?;

        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let directory = Directory::new();
        let solver = self
            .solver
            .unwrap_or_else(|| Arc::new(GreedySolver::new()) as Arc<dyn RouteSolver>);
        let (coordinator, coordinator_handle) = CoordinatorActor::new(
            self.cfg.coordinator.clone(),
            solver,
            self.source.clone(),
            directory.clone(),
            bus.clone(),
            self.cfg.mailbox_capacity_clamped(),
        );
        let (spawn_tx, spawn_rx) = mpsc::unbounded_channel();

        Ok(Fleet {
            cfg: self.cfg,
            bus,
            directory,
            subscribers: self.subscribers,
            coordinator,
            coordinator_handle,
            source: self.source,
            workers: self.workers,
            stop: CancellationToken::new(),
            spawn_tx,
            spawn_rx,
        })
    }
}

fn check_names(cfg: &Config, workers: &[WorkerSpec]) -> Result<(), ConfigError> {
    let coordinator = cfg.coordinator.name.as_str();
    if !is_valid_name(coordinator) {
        return Err(ConfigError::invalid(format!(
            "coordinator name {coordinator:?} is empty or contains | : , ;"
        )));
    }
    let mut seen = std::collections::HashSet::new();
    seen.insert(coordinator);
    for w in workers {
        if !is_valid_name(&w.name) {
            return Err(ConfigError::invalid(format!(
                "worker name {:?} is empty or contains | : , ;",
                w.name
            )));
        }
        if !seen.insert(w.name.as_str()) {
            return Err(ConfigError::invalid(format!("duplicate agent name {:?}", w.name)));
        }
        if !(w.max_distance.is_finite() && w.max_distance >= 0.0) {
            return Err(ConfigError::invalid(format!(
                "worker {:?} max_distance must be a finite non-negative number",
                w.name
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_reserved_and_duplicate_names() {
        let bad = FleetBuilder::new(Config::default())
            .with_worker(WorkerSpec::new("truck|1", 10, 10.0))
            .build();
        assert!(matches!(bad, Err(RuntimeError::Config(ConfigError::Invalid(_)))));

        let dup = FleetBuilder::new(Config::default())
            .with_workers([WorkerSpec::new("t", 10, 10.0), WorkerSpec::new("t", 5, 5.0)])
            .build();
        assert!(dup.is_err());

        let clash = FleetBuilder::new(Config::default())
            .with_worker(WorkerSpec::new("coordinator", 10, 10.0))
            .build();
        assert!(clash.is_err());
    }

    #[test]
    fn builds_outside_a_runtime() {
        let fleet = FleetBuilder::new(Config::default())
            .with_worker(WorkerSpec::new("truck-1", 10, 100.0))
            .build()
            .unwrap();
        assert_eq!(fleet.config().coordinator.name, "coordinator");
        let _handle = fleet.handle();
    }
}
