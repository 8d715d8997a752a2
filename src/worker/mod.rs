//! Delivery workers.
//!
//! One [`WorkerActor`] per vehicle. It answers capability queries, validates and
//! queues route proposals, drives accepted routes one at a time through the
//! [`execution`] state machine and tells the coordinator when it is back at its
//! depot.

mod actor;
mod execution;

pub use actor::{WorkerActor, WorkerParams};
