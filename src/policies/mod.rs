//! Timing and recovery policies.
//!
//! ## Contents
//! - [`BackoffPolicy`] how the delay between empty or failed source polls evolves
//! - [`JitterPolicy`]  randomization strategy so many pollers do not hit a source in lockstep
//! - [`RejectionPolicy`] what happens to demands of a route that was not delivered
//!
//! ## Quick wiring
//! ```text
//! PollConfig ─► BackoffPolicy ─► source poller: delay = backoff.next(empty_streak)
//! CoordinatorConfig.rejection_policy ─► coordinator: rejected / lost / unresolved routes
//! ```
//!
//! ## Defaults
//! - `BackoffPolicy::default()` → first=500ms, factor=2.0, max=5s, jitter=Equal.
//! - `RejectionPolicy::Requeue` → undelivered demands go back to the accumulation buffer.

mod backoff;
mod jitter;
mod rejection;

pub use backoff::BackoffPolicy;
pub use jitter::JitterPolicy;
pub use rejection::RejectionPolicy;
