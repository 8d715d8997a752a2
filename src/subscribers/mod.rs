//! # Event subscribers.
//!
//! Everything the fleet does is published as an [`Event`](crate::events::Event) on the
//! [`Bus`](crate::events::Bus). The fleet keeps one listener that hands each event to a
//! [`SubscriberSet`], which fans it out to the configured [`Subscribe`] implementations.
//!
//! ```text
//!   Bus ──► listener ──► SubscriberSet ──┬──► [queue] ──► LogWriter      (tracing)
//!                                        ├──► [queue] ──► JournalWriter  (append-only file)
//!                                        └──► [queue] ──► custom ...
//! ```
//!
//! Subscribers never block publishers or each other. A full queue drops the event for
//! that subscriber and publishes `SubscriberOverflow`; a panic is caught and published
//! as `SubscriberPanicked`.
//!
//! ## Custom subscribers
//! ```rust,ignore
//! use routevisor::{Event, EventKind, Subscribe};
//!
//! struct Rejections;
//!
//! #[async_trait::async_trait]
//! impl Subscribe for Rejections {
//!     async fn on_event(&self, ev: &Event) {
//!         if ev.kind == EventKind::RouteRejected {
//!             // page someone
//!         }
//!     }
//!     fn name(&self) -> &'static str { "rejections" }
//! }
//! ```

mod journal;
#[cfg(feature = "logging")]
mod log;
mod set;
mod subscribe;

pub use journal::JournalWriter;
#[cfg(feature = "logging")]
pub use log::{LogWriter, init_tracing};
pub use set::SubscriberSet;
pub use subscribe::Subscribe;
