use std::collections::BTreeMap;

use tokio::sync::{mpsc, oneshot};

use crate::error::RuntimeError;
use crate::model::{Batch, DemandId, RouteId, WorkerCapability};

/// Requests accepted by the coordinator from outside the message protocol.
#[derive(Debug)]
pub(crate) enum Command {
    Submit(Batch),
    Snapshot(oneshot::Sender<CoordinatorSnapshot>),
}

/// Point-in-time view of the coordinator state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CoordinatorSnapshot {
    /// Batches waiting in the queue.
    pub queued: usize,
    /// Ids in the accumulation buffer, ascending.
    pub buffered: Vec<DemandId>,
    /// A round is in progress.
    pub busy: bool,
    pub rounds_completed: u64,
    /// Accepted routes not yet reported back at the depot, per worker, oldest first.
    pub active_routes: BTreeMap<String, Vec<RouteId>>,
    pub capabilities: Vec<WorkerCapability>,
    /// Ids given up on after too many unplaced rounds.
    pub abandoned: Vec<DemandId>,
}

/// Cloneable handle to a running coordinator.
#[derive(Debug, Clone)]
pub struct CoordinatorHandle {
    tx: mpsc::Sender<Command>,
}

impl CoordinatorHandle {
    pub(crate) fn new(tx: mpsc::Sender<Command>) -> Self {
        Self { tx }
    }

    /// Queues a batch for planning. Waits while the command channel is full.
    pub async fn submit(&self, batch: Batch) -> Result<(), RuntimeError> {
        self.tx
            .send(Command::Submit(batch))
            .await
            .map_err(|_| RuntimeError::CoordinatorGone)
    }

    pub async fn snapshot(&self) -> Result<CoordinatorSnapshot, RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.tx
            .send(Command::Snapshot(tx))
            .await
            .map_err(|_| RuntimeError::CoordinatorGone)?;
        rx.await.map_err(|_| RuntimeError::CoordinatorGone)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}
