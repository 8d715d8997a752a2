//! # LogWriter: events as `tracing` records.
//!
//! Each event becomes one record on the `routevisor::events` target, with the
//! event kind as the message and every set field as a structured field:
//!
//! ```text
//! INFO routevisor::events: route_accepted seq=41 actor="coordinator" worker="truck-2" route=7 qty=45
//! WARN routevisor::events: route_rejected seq=44 actor="coordinator" worker="truck-3" route=8 reason="CAPACITY: ..."
//! ```
//!
//! Levels: failures and dropped work are `warn`, a subscriber panic is `error`,
//! chatty per-tick kinds are `debug`, everything else is `info`.

use async_trait::async_trait;
use tracing::Level;
use tracing_subscriber::EnvFilter;

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Subscriber that forwards every event to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogWriter;

impl LogWriter {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

fn level_of(kind: EventKind) -> Level {
    use EventKind::*;
    match kind {
        SubscriberPanicked => Level::ERROR,
        DiscoveryFailed | CapabilitiesPartial | RouteRejected | ProposalLost | WorkerNotFound
        | MessageDropped | SolveFailed | SubmissionFailed | SourcePollFailed
        | SubscriberOverflow | GraceExceeded | DemandAbandoned | DemandRefused
        | RegistrationFailed | SenderMismatch | DemandsDropped => Level::WARN,
        PollBackoff | CapabilityReceived | CapabilityQuerySent | DemandVisited
        | DriftCorrected => Level::DEBUG,
        _ => Level::INFO,
    }
}

macro_rules! emit_at {
    ($level:expr, $ev:expr) => {{
        let level = $level;
        let ev = $ev;
        let kind = ev.kind.as_label();
        let at = ev.location.map(|l| format!("({:.2}, {:.2})", l.x, l.y));
        if level == Level::ERROR {
            emit_at!(@ error, ev, kind, at)
        } else if level == Level::WARN {
            emit_at!(@ warn, ev, kind, at)
        } else if level == Level::DEBUG {
            emit_at!(@ debug, ev, kind, at)
        } else {
            emit_at!(@ info, ev, kind, at)
        }
    }};
    (@ $mac:ident, $ev:ident, $kind:ident, $at:ident) => {
        tracing::$mac!(
            target: "routevisor::events",
            seq = $ev.seq,
            actor = $ev.actor.as_deref(),
            worker = $ev.worker.as_deref(),
            batch = $ev.batch.as_deref(),
            route = $ev.route,
            demand = $ev.demand,
            conv = $ev.conversation,
            count = $ev.count,
            qty = $ev.quantity,
            distance = $ev.distance,
            at = $at.as_deref(),
            attempt = $ev.attempt,
            delay_ms = $ev.delay_ms,
            reason = $ev.reason.as_deref(),
            "{}",
            $kind
        )
    };
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        emit_at!(level_of(e.kind), e);
    }

    fn name(&self) -> &'static str {
        "log"
    }
}

/// Installs a global `fmt` subscriber filtered by `RUST_LOG`, falling back to `default`.
///
/// Returns `false` if a global subscriber was already set.
pub fn init_tracing(default: &str) -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .is_ok()
}
