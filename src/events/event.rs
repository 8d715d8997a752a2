//! # Runtime events emitted by the fleet, the coordinator and the workers.
//!
//! The [`EventKind`] enum classifies event types across five groups:
//! - **Runtime events**: shutdown flow and subscriber health
//! - **Actor events**: actors joining and leaving the fleet
//! - **Source events**: batches arriving, polling backoff, result submission
//! - **Round events**: one planning round, from discovery to reconciliation
//! - **Worker events**: route execution on a single worker
//!
//! The [`Event`] struct carries the metadata (actor, worker, batch, route,
//! demand, counts, reasons) a subscriber needs to render or aggregate it.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//! Use `seq` to restore the exact order when events are delivered out of order.
//!
//! ## Example
//! ```rust
//! use routevisor::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::RouteRejected)
//!     .with_actor("coordinator")
//!     .with_worker("truck-2")
//!     .with_route(14)
//!     .with_reason("CAPACITY_EXCEEDED");
//!
//! assert_eq!(ev.kind, EventKind::RouteRejected);
//! assert_eq!(ev.worker.as_deref(), Some("truck-2"));
//! assert_eq!(ev.route, Some(14));
//! ```

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

use crate::model::Location;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
///
/// Every event sets `seq` and `at`; the lists below name the optional fields
/// each kind fills in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum EventKind {
    // === Runtime events ===
    /// Subscriber panicked during event processing.
    ///
    /// Sets: `actor` (subscriber name), `reason` (panic message)
    SubscriberPanicked,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets: `actor` (subscriber name), `reason` ("full" / "closed")
    SubscriberOverflow,

    /// Shutdown requested (OS signal or explicit request).
    ///
    /// Sets: `reason` ("signal" / "requested")
    ShutdownRequested,

    /// All actors stopped within the configured grace period.
    AllStoppedWithin,

    /// Grace period exceeded; some actors did not stop in time.
    ///
    /// Sets: `count` (stuck actors), `reason` (their names)
    GraceExceeded,

    // === Actor events ===
    /// An actor was registered and spawned.
    ///
    /// Sets: `actor`
    ActorStarted,

    /// An actor left its loop.
    ///
    /// Sets: `actor`
    ActorStopped,

    /// An actor could not be registered in the directory.
    ///
    /// Sets: `actor`, `reason`
    RegistrationFailed,

    /// An incoming message was dropped: unparsable, unexpected, or undeliverable.
    ///
    /// Sets: `actor` (receiver or sender), `worker` (peer, if known), `conversation`, `reason`
    MessageDropped,

    // === Source events ===
    /// A batch was accepted into the coordinator queue.
    ///
    /// Sets: `batch`, `count` (demands), `quantity`
    BatchQueued,

    /// A demand in an incoming batch was refused (non-positive quantity, bad location, repeated id).
    ///
    /// Sets: `batch`, `demand`, `reason`
    DemandRefused,

    /// The source had nothing to offer; next poll delayed.
    ///
    /// Sets: `attempt` (consecutive empty polls), `delay_ms`
    PollBackoff,

    /// Polling the source failed; next poll delayed.
    ///
    /// Sets: `attempt`, `delay_ms`, `reason`
    SourcePollFailed,

    /// A round result was accepted by the source.
    ///
    /// Sets: `batch` (submission id), `count` (routes), `quantity` (served)
    SolutionSubmitted,

    /// Submitting a round result failed.
    ///
    /// Sets: `batch`, `reason`
    SubmissionFailed,

    /// A synthetic round had no fresh batch to report under.
    ///
    /// Sets: `batch`
    SubmissionSkipped,

    // === Round events ===
    /// A planning round started.
    ///
    /// Sets: `batch`, `count` (demands), `reason` ("fresh" / "synthetic")
    RoundStarted,

    /// The accumulation buffer was drained into a synthetic batch.
    ///
    /// Sets: `batch`, `count`
    BufferFlushed,

    /// No worker could be discovered; the round was aborted and its demands kept.
    ///
    /// Sets: `batch`, `reason`
    DiscoveryFailed,

    /// Capability queries were sent.
    ///
    /// Sets: `batch`, `count` (workers queried)
    CapabilityQuerySent,

    /// First capability response of a worker in the current round.
    ///
    /// Sets: `worker`, `quantity` (capacity), `distance` (max distance), `location`
    CapabilityReceived,

    /// A repeated or out-of-round capability response refreshed the table in place.
    ///
    /// Sets: `worker`, `quantity`, `distance`, `location`
    CapabilityUpdated,

    /// The name inside a message differs from its sender; the sender wins.
    ///
    /// Sets: `worker` (sender), `reason` (claimed name)
    SenderMismatch,

    /// Every queried worker answered and the minimum wait elapsed.
    ///
    /// Sets: `batch`, `count` (responders)
    CapabilitiesReady,

    /// The collection timed out with missing responses; the round proceeds degraded.
    ///
    /// Sets: `batch`, `count` (responders), `reason` (missing workers)
    CapabilitiesPartial,

    /// Demands already travelling on an active route were left out of the round.
    ///
    /// Sets: `batch`, `count`
    ActiveDemandsSkipped,

    /// The solver returned an error; the batch is discarded.
    ///
    /// Sets: `batch`, `reason`
    SolveFailed,

    /// The solver produced a plan.
    ///
    /// Sets: `batch`, `count` (routes), `quantity` (served), `distance` (total), `delay_ms` (solve time)
    Solved,

    /// A route was proposed to a worker.
    ///
    /// Sets: `worker`, `route`, `conversation`, `quantity`, `distance`
    RouteProposed,

    /// A worker accepted a route.
    ///
    /// Sets: `worker`, `route`, `conversation`, `reason` ("late" when after the settle deadline)
    RouteAccepted,

    /// A worker refused a route.
    ///
    /// Sets: `worker`, `route`, `conversation`, `reason` (reject code and details)
    RouteRejected,

    /// A proposal got no answer before the proposal timeout.
    ///
    /// Sets: `worker`, `route`, `conversation`
    ProposalLost,

    /// The route's worker could not be resolved in the directory.
    ///
    /// Sets: `worker` (planned name), `route`
    WorkerNotFound,

    /// Demands of an undelivered route went back to the accumulation buffer.
    ///
    /// Sets: `route`, `count`
    DemandsRequeued,

    /// Demands of an undelivered route were dropped.
    ///
    /// Sets: `route`, `count`
    DemandsDropped,

    /// A demand stayed unplaced for too many rounds and was given up on.
    ///
    /// Sets: `demand`, `attempt` (unplaced rounds)
    DemandAbandoned,

    /// Every proposal of the round was answered or timed out.
    ///
    /// Sets: `batch`, `count` (accepted routes), `reason` (buffer size)
    RoundCompleted,

    /// A worker reported it is back at its depot.
    ///
    /// Sets: `worker`, `route` (the route it completed, if tracked)
    WorkerArrived,

    // === Worker events ===
    /// A worker accepted a route into its queue.
    ///
    /// Sets: `actor`, `route`, `count` (routes waiting, including this one)
    RouteQueued,

    /// A worker refused a proposal.
    ///
    /// Sets: `actor`, `route`, `reason`
    ProposalRefused,

    /// A worker left the depot on a route.
    ///
    /// Sets: `actor`, `route`, `count` (stops)
    RouteStarted,

    /// A worker reached a demand.
    ///
    /// Sets: `actor`, `route`, `demand`, `location`
    DemandVisited,

    /// A worker finished its last stop and heads home.
    ///
    /// Sets: `actor`, `route`
    ReturningToDepot,

    /// A worker is back at its depot and the route is complete.
    ///
    /// Sets: `actor`, `route`, `location`
    ReturnedToDepot,

    /// An idle worker away from its depot was snapped back.
    ///
    /// Sets: `actor`, `location` (position before correction)
    DriftCorrected,
}

impl EventKind {
    /// Stable snake_case label.
    pub fn as_label(&self) -> &'static str {
        match self {
            EventKind::SubscriberPanicked => "subscriber_panicked",
            EventKind::SubscriberOverflow => "subscriber_overflow",
            EventKind::ShutdownRequested => "shutdown_requested",
            EventKind::AllStoppedWithin => "all_stopped_within_grace",
            EventKind::GraceExceeded => "grace_exceeded",
            EventKind::ActorStarted => "actor_started",
            EventKind::ActorStopped => "actor_stopped",
            EventKind::RegistrationFailed => "registration_failed",
            EventKind::MessageDropped => "message_dropped",
            EventKind::BatchQueued => "batch_queued",
            EventKind::DemandRefused => "demand_refused",
            EventKind::PollBackoff => "poll_backoff",
            EventKind::SourcePollFailed => "source_poll_failed",
            EventKind::SolutionSubmitted => "solution_submitted",
            EventKind::SubmissionFailed => "submission_failed",
            EventKind::SubmissionSkipped => "submission_skipped",
            EventKind::RoundStarted => "round_started",
            EventKind::BufferFlushed => "buffer_flushed",
            EventKind::DiscoveryFailed => "discovery_failed",
            EventKind::CapabilityQuerySent => "capability_query_sent",
            EventKind::CapabilityReceived => "capability_received",
            EventKind::CapabilityUpdated => "capability_updated",
            EventKind::SenderMismatch => "sender_mismatch",
            EventKind::CapabilitiesReady => "capabilities_ready",
            EventKind::CapabilitiesPartial => "capabilities_partial",
            EventKind::ActiveDemandsSkipped => "active_demands_skipped",
            EventKind::SolveFailed => "solve_failed",
            EventKind::Solved => "solved",
            EventKind::RouteProposed => "route_proposed",
            EventKind::RouteAccepted => "route_accepted",
            EventKind::RouteRejected => "route_rejected",
            EventKind::ProposalLost => "proposal_lost",
            EventKind::WorkerNotFound => "worker_not_found",
            EventKind::DemandsRequeued => "demands_requeued",
            EventKind::DemandsDropped => "demands_dropped",
            EventKind::DemandAbandoned => "demand_abandoned",
            EventKind::RoundCompleted => "round_completed",
            EventKind::WorkerArrived => "worker_arrived",
            EventKind::RouteQueued => "route_queued",
            EventKind::ProposalRefused => "proposal_refused",
            EventKind::RouteStarted => "route_started",
            EventKind::DemandVisited => "demand_visited",
            EventKind::ReturningToDepot => "returning_to_depot",
            EventKind::ReturnedToDepot => "returned_to_depot",
            EventKind::DriftCorrected => "drift_corrected",
        }
    }
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Actor that emitted the event (coordinator, worker, subscriber).
    pub actor: Option<Arc<str>>,
    /// Worker the event is about, when emitted by someone else.
    pub worker: Option<Arc<str>>,
    /// Batch id.
    pub batch: Option<Arc<str>>,
    pub route: Option<u64>,
    pub demand: Option<u64>,
    /// Conversation id of the message involved.
    pub conversation: Option<u64>,
    /// Generic count (demands, routes, workers) depending on kind.
    pub count: Option<u32>,
    /// Quantity (capacity, served quantity) depending on kind.
    pub quantity: Option<u64>,
    /// Distance depending on kind.
    pub distance: Option<f64>,
    pub location: Option<Location>,
    /// Attempt or streak counter.
    pub attempt: Option<u32>,
    /// Delay in milliseconds (compact).
    pub delay_ms: Option<u32>,
    /// Human-readable reason (errors, overflow details, etc.).
    pub reason: Option<Arc<str>>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            actor: None,
            worker: None,
            batch: None,
            route: None,
            demand: None,
            conversation: None,
            count: None,
            quantity: None,
            distance: None,
            location: None,
            attempt: None,
            delay_ms: None,
            reason: None,
        }
    }

    #[inline]
    pub fn with_actor(mut self, actor: impl Into<Arc<str>>) -> Self {
        self.actor = Some(actor.into());
        self
    }

    #[inline]
    pub fn with_worker(mut self, worker: impl Into<Arc<str>>) -> Self {
        self.worker = Some(worker.into());
        self
    }

    #[inline]
    pub fn with_batch(mut self, batch: impl fmt::Display) -> Self {
        self.batch = Some(batch.to_string().into());
        self
    }

    #[inline]
    pub fn with_route(mut self, route: u64) -> Self {
        self.route = Some(route);
        self
    }

    #[inline]
    pub fn with_demand(mut self, demand: u64) -> Self {
        self.demand = Some(demand);
        self
    }

    #[inline]
    pub fn with_conversation(mut self, conversation: u64) -> Self {
        self.conversation = Some(conversation);
        self
    }

    /// Attaches a count, saturating at `u32::MAX`.
    #[inline]
    pub fn with_count(mut self, count: usize) -> Self {
        self.count = Some(u32::try_from(count).unwrap_or(u32::MAX));
        self
    }

    #[inline]
    pub fn with_quantity(mut self, quantity: u64) -> Self {
        self.quantity = Some(quantity);
        self
    }

    #[inline]
    pub fn with_distance(mut self, distance: f64) -> Self {
        self.distance = Some(distance);
        self
    }

    #[inline]
    pub fn with_location(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }

    #[inline]
    pub fn with_attempt(mut self, n: u32) -> Self {
        self.attempt = Some(n);
        self
    }

    /// Attaches a delay (stored as milliseconds).
    #[inline]
    pub fn with_delay(mut self, d: Duration) -> Self {
        let ms = d.as_millis().min(u128::from(u32::MAX)) as u32;
        self.delay_ms = Some(ms);
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_actor(subscriber)
            .with_reason(reason)
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_actor(subscriber)
            .with_reason(info)
    }

    #[inline]
    pub fn is_subscriber_overflow(&self) -> bool {
        matches!(self.kind, EventKind::SubscriberOverflow)
    }

    #[inline]
    pub fn is_subscriber_panic(&self) -> bool {
        matches!(self.kind, EventKind::SubscriberPanicked)
    }
}

/// One line: `kind key=value ...` with only the fields that are set.
impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.kind.as_label())?;
        if let Some(v) = &self.actor {
            write!(f, " actor={v}")?;
        }
        if let Some(v) = &self.worker {
            write!(f, " worker={v}")?;
        }
        if let Some(v) = &self.batch {
            write!(f, " batch={v}")?;
        }
        if let Some(v) = self.route {
            write!(f, " route={v}")?;
        }
        if let Some(v) = self.demand {
            write!(f, " demand={v}")?;
        }
        if let Some(v) = self.conversation {
            write!(f, " conv={v}")?;
        }
        if let Some(v) = self.count {
            write!(f, " count={v}")?;
        }
        if let Some(v) = self.quantity {
            write!(f, " qty={v}")?;
        }
        if let Some(v) = self.distance {
            write!(f, " distance={v:.2}")?;
        }
        if let Some(v) = self.location {
            write!(f, " at=({:.2}, {:.2})", v.x, v.y)?;
        }
        if let Some(v) = self.attempt {
            write!(f, " attempt={v}")?;
        }
        if let Some(v) = self.delay_ms {
            write!(f, " delay_ms={v}")?;
        }
        if let Some(v) = &self.reason {
            write!(f, " reason={v:?}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_is_monotonic() {
        let a = Event::new(EventKind::RoundStarted);
        let b = Event::new(EventKind::RoundCompleted);
        assert!(b.seq > a.seq);
    }

    #[test]
    fn display_lists_only_set_fields() {
        let ev = Event::new(EventKind::DemandVisited)
            .with_actor("truck-1")
            .with_route(3)
            .with_demand(8)
            .with_location(Location::new(1.0, 2.5));
        assert_eq!(
            ev.to_string(),
            "demand_visited actor=truck-1 route=3 demand=8 at=(1.00, 2.50)"
        );
    }
}
