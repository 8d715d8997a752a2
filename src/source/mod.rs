//! # Batch boundary.
//!
//! A [`BatchSource`] hands demand batches to the fleet and receives one
//! [`SolutionReport`](crate::model::SolutionReport) per completed round.
//! The fleet drives it from a single poller task (see [`run_poller`]):
//!
//! ```text
//!   BatchSource ──poll_next_batch──► poller ──Command::Submit──► Coordinator
//!        ▲                             │ empty / error → BackoffPolicy sleep
//!        └──────submit_solution────────┴──────────────── (spawned per round)
//! ```
//!
//! Built-ins:
//! - [`InMemorySource`]: a queue fed by the embedding code (tests, demos).
//! - [`SnapshotSource`]: decorator that stores each submitted report as pretty JSON.
//! - `HttpSource` (feature `http`): polls a backend over HTTP.

mod memory;
mod poller;
mod snapshot;

#[cfg(feature = "http")]
mod http;

pub use memory::InMemorySource;
pub use poller::run_poller;
pub use snapshot::SnapshotSource;

#[cfg(feature = "http")]
pub use http::HttpSource;

use async_trait::async_trait;

use crate::error::SourceError;
use crate::model::{Batch, SolutionReport};

/// Pull-based source of demand batches.
#[async_trait]
pub trait BatchSource: Send + Sync + 'static {
    /// Next batch, or `None` when nothing is waiting.
    async fn poll_next_batch(&self) -> Result<Option<Batch>, SourceError>;

    /// Delivers the result of one round.
    async fn submit_solution(&self, report: &SolutionReport) -> Result<(), SourceError>;

    /// Human-readable name (for logs).
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}
