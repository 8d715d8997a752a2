//! Runtime events: types and broadcast bus.
//!
//! This module groups the event **data model** and the **bus** used to
//! publish/subscribe to events emitted by the fleet runtime, the coordinator,
//! the workers, the source poller and subscriber workers.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: `Fleet`, `Coordinator`, `Worker`, the source poller,
//!   submission tasks, `SubscriberSet` workers (overflow/panic).
//! - **Consumers**: the fleet's subscriber listener (fans out to `SubscriberSet`),
//!   and anyone holding a receiver from [`FleetHandle::events`](crate::FleetHandle::events).

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
