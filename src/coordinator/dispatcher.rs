use std::collections::HashMap;

use tokio::time::{Duration, Instant};

use crate::model::Route;
use crate::protocol::ConversationId;

/// Proposals of one round awaiting an answer.
#[derive(Debug)]
pub(crate) struct Dispatch {
    pending: HashMap<ConversationId, Route>,
    accepted: usize,
    settle_at: Instant,
    expires_at: Instant,
}

impl Dispatch {
    pub(crate) fn new(now: Instant, settle: Duration, timeout: Duration) -> Self {
        Self {
            pending: HashMap::new(),
            accepted: 0,
            settle_at: now + settle,
            expires_at: now + timeout.max(settle),
        }
    }

    pub(crate) fn propose(&mut self, conversation: ConversationId, route: Route) {
        self.pending.insert(conversation, route);
    }

    /// Takes the route waiting on `conversation`, if it is still pending.
    pub(crate) fn answer(&mut self, conversation: ConversationId, accepted: bool) -> Option<Route> {
        let route = self.pending.remove(&conversation)?;
        if accepted {
            self.accepted += 1;
        }
        Some(route)
    }

    pub(crate) fn accepted(&self) -> usize {
        self.accepted
    }

    pub(crate) fn pending(&self) -> impl Iterator<Item = &Route> {
        self.pending.values()
    }

    pub(crate) fn is_settled(&self, now: Instant) -> bool {
        (self.pending.is_empty() && now >= self.settle_at) || now >= self.expires_at
    }

    pub(crate) fn deadline(&self) -> Instant {
        if self.pending.is_empty() {
            self.settle_at
        } else {
            self.expires_at
        }
    }

    /// Unanswered proposals, ordered by route id.
    pub(crate) fn drain_lost(&mut self) -> Vec<(ConversationId, Route)> {
        let mut lost: Vec<_> = self.pending.drain().collect();
        lost.sort_by_key(|(_, r)| r.id);
        lost
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Location, RouteId};

    fn route(id: u64) -> Route {
        Route::new(RouteId(id), "w", 1, vec![], Location::ORIGIN)
    }

    #[test]
    fn settles_after_answers_and_settle_time() {
        let t0 = Instant::now();
        let mut d = Dispatch::new(t0, Duration::from_secs(1), Duration::from_secs(5));
        d.propose(ConversationId(1), route(1));
        assert_eq!(d.deadline(), t0 + Duration::from_secs(5));

        assert!(d.answer(ConversationId(1), true).is_some());
        assert!(d.answer(ConversationId(1), true).is_none());
        assert_eq!(d.accepted(), 1);
        assert!(!d.is_settled(t0));
        assert!(d.is_settled(t0 + Duration::from_secs(1)));
    }

    #[test]
    fn timeout_turns_pending_into_lost() {
        let t0 = Instant::now();
        let mut d = Dispatch::new(t0, Duration::from_secs(1), Duration::from_secs(5));
        d.propose(ConversationId(7), route(2));
        d.propose(ConversationId(3), route(1));
        assert!(!d.is_settled(t0 + Duration::from_secs(4)));
        assert!(d.is_settled(t0 + Duration::from_secs(5)));

        let lost = d.drain_lost();
        assert_eq!(lost.iter().map(|(_, r)| r.id.0).collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(d.pending().count(), 0);
    }
}
