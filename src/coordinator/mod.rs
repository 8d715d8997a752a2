//! # Coordinator: planning rounds and route dispatch.
//!
//! One [`CoordinatorActor`] runs the whole planning cycle:
//!
//! ```text
//!  Idle ──decide()──► RoundStarted ──discover workers──► Collecting
//!   ▲                   │ none found: batch back to queue / buffer
//!   │                   ▼
//!   │    Collecting: QUERY_CAPABILITY to all, wait for (all ∧ min wait) ∨ timeout
//!   │                   ▼
//!   │    solve(batch ∪ buffer − active) ──► reconcile buffer ──► submit report
//!   │                   ▼
//!   │    Settling: PROPOSE each route, wait for (all answered ∧ settle) ∨ timeout
//!   └───────────────────┘ RoundCompleted
//! ```
//!
//! Messages keep flowing in every phase: capability answers refresh the table,
//! arrival notices retire active routes, and late accepts are honored.
//!
//! The pure pieces live in their own modules: [`scheduler`] decides what runs
//! next, [`collector`] tracks a capability round, [`reconcile`] owns the
//! accumulation buffer and coordinate cache, [`dispatcher`] tracks proposals.

mod actor;
mod collector;
mod dispatcher;
mod handle;
mod reconcile;
mod scheduler;

pub use actor::CoordinatorActor;
pub(crate) use handle::Command;
pub use handle::{CoordinatorHandle, CoordinatorSnapshot};
