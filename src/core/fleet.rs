//! # Fleet: runs the coordinator, the poller and the workers.
//!
//! The [`Fleet`] owns the event bus, the subscriber list, the directory and the
//! root cancellation token. [`Fleet::run`] spawns every actor into one `JoinSet`
//! and keeps going until an OS signal, [`FleetHandle::shutdown`], or the
//! coordinator stopping on its own.
//!
//! ```text
//! run()
//!   ├─► listener: Bus.subscribe() ─► SubscriberSet::emit()
//!   ├─► spawn CoordinatorActor::run(child token)
//!   ├─► spawn run_poller(source, ...)              (if a source is set)
//!   ├─► spawn WorkerActor::run(child token) × N
//!   │
//!   ├─ loop select! {
//!   │     signal / stop token / coordinator exit → break
//!   │     spawn request                          → spawn WorkerActor
//!   │     actor joined                           → forget its name
//!   │  }
//!   │
//!   └─► ShutdownRequested → token.cancel() → wait_all_with_grace(cfg.grace)
//!             ├─ all joined → AllStoppedWithin
//!             └─ timeout    → GraceExceeded{stuck}, abort the rest
//! ```
//!
//! The subscriber set is drained before `run` returns, so the final events
//! reach every subscriber.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use tokio::task::{Id, JoinSet};
use tokio_util::sync::CancellationToken;

use super::handle::{FleetHandle, WorkerSpec};
use super::shutdown;
use crate::config::Config;
use crate::coordinator::{CoordinatorActor, CoordinatorHandle};
use crate::directory::Directory;
use crate::error::RuntimeError;
use crate::events::{Bus, Event, EventKind};
use crate::source::{BatchSource, run_poller};
use crate::subscribers::{Subscribe, SubscriberSet};
use crate::worker::WorkerActor;

/// Names of running actors, by task id.
type Roster = HashMap<Id, String>;

/// An assembled fleet, ready to [`run`](Fleet::run). Built by [`FleetBuilder`](super::FleetBuilder).
pub struct Fleet {
    pub(crate) cfg: Config,
    pub(crate) bus: Bus,
    pub(crate) directory: Directory,
    pub(crate) subscribers: Vec<Arc<dyn Subscribe>>,
    pub(crate) coordinator: CoordinatorActor,
    pub(crate) coordinator_handle: CoordinatorHandle,
    pub(crate) source: Option<Arc<dyn BatchSource>>,
    pub(crate) workers: Vec<WorkerSpec>,
    pub(crate) stop: CancellationToken,
    pub(crate) spawn_tx: mpsc::UnboundedSender<WorkerSpec>,
    pub(crate) spawn_rx: mpsc::UnboundedReceiver<WorkerSpec>,
}

impl Fleet {
    /// Handle for submitting batches, adding workers, watching events and stopping.
    pub fn handle(&self) -> FleetHandle {
        FleetHandle {
            coordinator: self.coordinator_handle.clone(),
            directory: self.directory.clone(),
            bus: self.bus.clone(),
            stop: self.stop.clone(),
            spawn_tx: self.spawn_tx.clone(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.cfg
    }

    /// Runs until shutdown is requested, then stops every actor within `cfg.grace`.
    ///
    /// Returns [`RuntimeError::GraceExceeded`] if some actors had to be aborted.
    pub async fn run(self) -> Result<(), RuntimeError> {
        let Fleet {
            cfg,
            bus,
            directory,
            subscribers,
            coordinator,
            coordinator_handle,
            source,
            workers,
            stop,
            spawn_tx,
            mut spawn_rx,
        } = self;
        drop(spawn_tx);

        let listener_stop = CancellationToken::new();
        let listener = tokio::spawn(subscriber_listener(
            bus.subscribe(),
            SubscriberSet::new(subscribers, bus.clone()),
            listener_stop.clone(),
        ));

        let token = CancellationToken::new();
        let mut set: JoinSet<()> = JoinSet::new();
        let mut roster = Roster::new();

        let coordinator_name = coordinator.name().to_string();
        let coordinator_id = set.spawn(coordinator.run(token.child_token())).id();
        roster.insert(coordinator_id, coordinator_name);

        if let Some(source) = source {
            let name = format!("poller:{}", source.name());
            let poller = run_poller(
                source,
                coordinator_handle.clone(),
                cfg.poll.backoff(),
                bus.clone(),
                token.child_token(),
            );
            roster.insert(set.spawn(poller).id(), name);
        }

        for spec in &workers {
            spawn_worker(&mut set, &mut roster, spec, &cfg, &directory, &bus, &token);
        }

        let signal = shutdown::wait_for_shutdown_signal();
        tokio::pin!(signal);
        let mut signal_armed = true;

        let reason = loop {
            tokio::select! {
                res = &mut signal, if signal_armed => match res {
                    Ok(()) => break "signal",
                    Err(error) => {
                        tracing::warn!(%error, "cannot listen for termination signals");
                        signal_armed = false;
                    }
                },
                _ = stop.cancelled() => break "requested",
                Some(spec) = spawn_rx.recv() => {
                    spawn_worker(&mut set, &mut roster, &spec, &cfg, &directory, &bus, &token);
                }
                Some(joined) = set.join_next_with_id(), if !set.is_empty() => {
                    let id = match joined {
                        Ok((id, ())) => id,
                        Err(e) => {
                            tracing::error!(error = %e, "actor task failed");
                            e.id()
                        }
                    };
                    roster.remove(&id);
                    if id == coordinator_id {
                        break "coordinator stopped";
                    }
                }
            }
        };

        bus.publish(Event::new(EventKind::ShutdownRequested).with_reason(reason));
        token.cancel();
        spawn_rx.close();
        let result = wait_all_with_grace(&mut set, &mut roster, &cfg, &bus).await;

        listener_stop.cancel();
        if listener.await.is_err() {
            tracing::warn!("subscriber listener ended abnormally");
        }
        result
    }
}

fn spawn_worker(
    set: &mut JoinSet<()>,
    roster: &mut Roster,
    spec: &WorkerSpec,
    cfg: &Config,
    directory: &Directory,
    bus: &Bus,
    token: &CancellationToken,
) {
    let actor = WorkerActor::new(
        spec.params(cfg),
        directory.clone(),
        bus.clone(),
        cfg.mailbox_capacity_clamped(),
    );
    let id = set.spawn(actor.run(token.child_token())).id();
    roster.insert(id, spec.name.clone());
}

/// Forwards bus events to the subscriber set until stopped, then drains both.
async fn subscriber_listener(
    mut rx: broadcast::Receiver<Event>,
    set: SubscriberSet,
    stop: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            received = rx.recv() => match received {
                Ok(ev) => set.emit(ev),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "subscriber listener lagged behind the bus");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            _ = stop.cancelled() => break,
        }
    }
    while let Ok(ev) = rx.try_recv() {
        set.emit(ev);
    }
    set.shutdown().await;
}

/// Waits for every actor within the grace period; aborts the stragglers.
async fn wait_all_with_grace(
    set: &mut JoinSet<()>,
    roster: &mut Roster,
    cfg: &Config,
    bus: &Bus,
) -> Result<(), RuntimeError> {
    let grace = cfg.grace;
    let done = async {
        while let Some(joined) = set.join_next_with_id().await {
            let id = match joined {
                Ok((id, ())) => id,
                Err(e) => e.id(),
            };
            roster.remove(&id);
        }
    };

    if tokio::time::timeout(grace, done).await.is_ok() {
        bus.publish(Event::new(EventKind::AllStoppedWithin));
        return Ok(());
    }

    let mut stuck: Vec<String> = roster.drain().map(|(_, name)| name).collect();
    stuck.sort();
    set.abort_all();
    bus.publish(
        Event::new(EventKind::GraceExceeded)
            .with_count(stuck.len())
            .with_reason(stuck.join(",")),
    );
    Err(RuntimeError::GraceExceeded { grace, stuck })
}
