//! # routevisor
//!
//! **Routevisor** runs a small fleet of delivery agents: one coordinator that
//! plans capacitated vehicle routes and any number of vehicle workers that accept
//! and drive them. Agents talk through typed mailboxes using a compact
//! `KEY:value|KEY:value` message protocol; every step of the negotiation is
//! published as an [`Event`] on a broadcast [`Bus`].
//!
//! ## Architecture
//! ### Overview
//! ```text
//!   BatchSource (HTTP, in-memory, snapshot)     FleetHandle::submit()
//!          │ poll_next_batch()                          │
//!          ▼                                            │
//!   ┌──────────────┐   Command::Submit                  │
//!   │    poller    ├──────────────────────┐             │
//!   └──────────────┘                      ▼             ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  CoordinatorActor                                                 │
//! │  - FIFO batch queue + unplaced buffer (Reconciler)                │
//! │  - capability round (CapabilityCollector)                         │
//! │  - RouteSolver::solve()                                           │
//! │  - proposals (Dispatch) + rejection policy                        │
//! └──────┬──────────────────┬──────────────────┬───────────────┬──────┘
//!        │ Envelope         │ Envelope         │ Envelope      │ SolutionReport
//!        ▼                  ▼                  ▼               ▼
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐  submit_solution()
//!     │ WorkerActor  │   │ WorkerActor  │   │ WorkerActor  │
//!     │ (Execution)  │   │ (Execution)  │   │ (Execution)  │
//!     └┬─────────────┘   └┬─────────────┘   └┬─────────────┘
//!      │ Events           │                  │
//!      ▼                  ▼                  ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                        Bus (broadcast channel)                    │
//! │                    (capacity: Config::bus_capacity)               │
//! └─────────────────────────────────┬─────────────────────────────────┘
//!                                   ▼
//!                       ┌────────────────────────┐
//!                       │  subscriber_listener   │
//!                       │       (in Fleet)       │
//!                       └───────────┬────────────┘
//!                                   ▼
//!                             SubscriberSet
//!                           (per-sub queues)
//!                        ┌──────────┼──────────┐
//!                        ▼          ▼          ▼
//!                    LogWriter JournalWriter  custom
//! ```
//!
//! ### Planning round
//! ```text
//! tick ──► scheduler::decide(busy, queue, buffer)
//!   ├─ Busy        ─► wait
//!   ├─ FlushBuffer ─► synthetic batch from the unplaced buffer
//!   ├─ NextBatch   ─► pop the queue front
//!   └─ Idle        ─► wait
//!
//! QUERY_CAPABILITY ─► every registered worker
//!   └─ collect until all answered, or the timeout with at least one answer
//! solve(depot, demands, capabilities)
//!   ├─ reconcile: unplaced ─► buffer, repeat offenders ─► abandoned
//!   ├─ submit SolutionReport to the source
//!   └─ ROUTE_ASSIGNMENT ─► each chosen worker
//!        ├─ ROUTE_ACCEPTED ─► RouteAccepted
//!        └─ ROUTE_REJECTED ─► rejection policy (buffer or drop)
//! settle ─► RoundCompleted
//! ```
//!
//! ## Features
//! | Area              | Description                                                      | Key types / traits                        |
//! |-------------------|------------------------------------------------------------------|-------------------------------------------|
//! | **Runtime**       | Assemble, run and stop a fleet with a shutdown grace period.     | [`FleetBuilder`], [`Fleet`], [`FleetHandle`] |
//! | **Planning**      | Pluggable route solver, greedy nearest-neighbour by default.     | [`RouteSolver`], [`GreedySolver`]         |
//! | **Sources**       | Where batches come from and where reports go.                    | [`BatchSource`], [`InMemorySource`], [`SnapshotSource`] |
//! | **Protocol**      | Typed agent messages over the `KEY:value` wire format.           | [`Envelope`], [`Content`]                 |
//! | **Subscriber API**| Hook into fleet events (logging, journaling, custom sinks).      | [`Subscribe`], [`JournalWriter`]          |
//! | **Policies**      | Poll backoff, jitter and rejection handling.                     | [`BackoffPolicy`], [`RejectionPolicy`]    |
//! | **Configuration** | Defaults, TOML loading, validation.                              | [`Config`]                                |
//!
//! ## Optional features
//! - `logging` (default): exports [`LogWriter`] and [`init_tracing`].
//! - `http`: exports [`HttpSource`], a `reqwest` client for the solve endpoint.
//!
//! ## Example
//! ```rust,no_run
//! use std::sync::Arc;
//! use routevisor::{Batch, Config, Demand, FleetBuilder, InMemorySource, Location, WorkerSpec};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let source = Arc::new(InMemorySource::new());
//!     source.push(Batch::fresh(
//!         "b-1",
//!         vec![
//!             Demand::new(1, 5, Location::new(10.0, 0.0)),
//!             Demand::new(2, 5, Location::new(0.0, 10.0)),
//!         ],
//!     ))
//!     .await;
//!
//!     let fleet = FleetBuilder::new(Config::default())
//!         .with_source(source.clone())
//!         .with_workers((1..=2).map(|i| WorkerSpec::new(format!("truck-{i}"), 20, 500.0)))
//!         .build()?;
//!
//!     // Ctrl-C or handle.shutdown() stops the fleet.
//!     fleet.run().await?;
//!     Ok(())
//! }
//! ```
mod config;
mod coordinator;
mod core;
mod directory;
mod error;
mod events;
mod model;
mod policies;
mod protocol;
mod solver;
mod source;
mod subscribers;
mod worker;

// ---- Public re-exports ----

pub use config::{Config, CoordinatorConfig, PollConfig, WorkerConfig};
pub use coordinator::{CoordinatorHandle, CoordinatorSnapshot};
pub use core::{Fleet, FleetBuilder, FleetHandle, WorkerSpec};
pub use directory::{AgentKind, Directory, Mailbox};
pub use error::{ConfigError, DirectoryError, ProtocolError, RuntimeError, SolveError, SourceError};
pub use events::{Bus, Event, EventKind};
pub use model::{
    Batch, BatchId, Demand, DemandId, DemandRecord, Location, Route, RouteId, RouteReport,
    SolutionReport, WorkerCapability,
};
pub use policies::{BackoffPolicy, JitterPolicy, RejectionPolicy};
pub use protocol::{
    CapabilityReport, Content, ConversationId, Envelope, Performative, ROUTE_ASSIGNMENT_ONTOLOGY,
    RejectReason, RouteAccepted, RouteProposal, RouteRejected, is_valid_name,
};
pub use solver::{GreedySolver, PlannedRoute, RouteSolver, Solution};
pub use source::{BatchSource, InMemorySource, SnapshotSource, run_poller};
pub use subscribers::{JournalWriter, Subscribe, SubscriberSet};

// Optional: `reqwest` client for the solve endpoint.
// Enable with: `--features http`
#[cfg(feature = "http")]
pub use source::HttpSource;

// Optional: tracing-backed subscriber and subscriber setup.
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use subscribers::{LogWriter, init_tracing};
