use std::collections::BTreeSet;

use tokio::time::{Duration, Instant};

/// Outcome of recording one capability response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Recorded {
    First,
    Duplicate,
    /// From a worker that was not queried this round.
    Unexpected,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Readiness {
    Pending,
    /// Everyone answered and the minimum wait elapsed.
    Complete,
    /// The timeout elapsed first.
    Partial { missing: Vec<String> },
}

/// Tracks who answered a capability query round.
#[derive(Debug)]
pub(crate) struct CapabilityCollector {
    expected: BTreeSet<String>,
    responded: BTreeSet<String>,
    started: Instant,
    min_wait: Duration,
    timeout: Duration,
}

impl CapabilityCollector {
    pub(crate) fn new(
        expected: impl IntoIterator<Item = String>,
        started: Instant,
        min_wait: Duration,
        timeout: Duration,
    ) -> Self {
        Self {
            expected: expected.into_iter().collect(),
            responded: BTreeSet::new(),
            started,
            min_wait,
            timeout: timeout.max(min_wait),
        }
    }

    pub(crate) fn record(&mut self, name: &str) -> Recorded {
        if !self.expected.contains(name) {
            Recorded::Unexpected
        } else if self.responded.insert(name.to_string()) {
            Recorded::First
        } else {
            Recorded::Duplicate
        }
    }

    pub(crate) fn responded(&self) -> impl Iterator<Item = &str> {
        self.responded.iter().map(String::as_str)
    }

    pub(crate) fn responded_count(&self) -> usize {
        self.responded.len()
    }

    pub(crate) fn readiness(&self, now: Instant) -> Readiness {
        let waited = now.saturating_duration_since(self.started);
        if waited >= self.min_wait && self.responded.len() == self.expected.len() {
            Readiness::Complete
        } else if waited >= self.timeout {
            Readiness::Partial {
                missing: self.expected.difference(&self.responded).cloned().collect(),
            }
        } else {
            Readiness::Pending
        }
    }

    /// Next instant at which [`readiness`](Self::readiness) can change without a new response.
    pub(crate) fn deadline(&self) -> Instant {
        if self.responded.len() == self.expected.len() {
            self.started + self.min_wait
        } else {
            self.started + self.timeout
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collector(now: Instant) -> CapabilityCollector {
        CapabilityCollector::new(
            ["a".to_string(), "b".to_string()],
            now,
            Duration::from_secs(5),
            Duration::from_secs(10),
        )
    }

    #[test]
    fn duplicates_are_not_counted_twice() {
        let mut c = collector(Instant::now());
        assert_eq!(c.record("a"), Recorded::First);
        assert_eq!(c.record("a"), Recorded::Duplicate);
        assert_eq!(c.record("z"), Recorded::Unexpected);
        assert_eq!(c.responded_count(), 1);
    }

    #[test]
    fn complete_needs_all_answers_and_min_wait() {
        let t0 = Instant::now();
        let mut c = collector(t0);
        c.record("a");
        c.record("b");
        assert_eq!(c.readiness(t0 + Duration::from_secs(1)), Readiness::Pending);
        assert_eq!(c.deadline(), t0 + Duration::from_secs(5));
        assert_eq!(c.readiness(t0 + Duration::from_secs(5)), Readiness::Complete);
    }

    #[test]
    fn timeout_yields_partial_with_missing_names() {
        let t0 = Instant::now();
        let mut c = collector(t0);
        c.record("b");
        assert_eq!(c.readiness(t0 + Duration::from_secs(7)), Readiness::Pending);
        assert_eq!(c.deadline(), t0 + Duration::from_secs(10));
        assert_eq!(
            c.readiness(t0 + Duration::from_secs(10)),
            Readiness::Partial {
                missing: vec!["a".to_string()]
            }
        );
    }
}
