//! # Backoff policy for source polling.
//!
//! [`BackoffPolicy`] controls how long the poller waits before asking the batch
//! source again after an empty answer or an error. It is parameterized by:
//! - [`BackoffPolicy::first`] the delay after the first empty poll;
//! - [`BackoffPolicy::factor`] the multiplicative growth factor;
//! - [`BackoffPolicy::max`] the maximum delay cap.
//!
//! The delay for streak `n` (consecutive empty/failed polls, 0-based) is
//! `first × factor^n`, clamped to `max`, then jitter is applied. The base is
//! derived from the streak alone, so a short jittered delay never drags the
//! next one down. A successful poll resets the streak.
//!
//! # Example
//! ```rust
//! use std::time::Duration;
//! use routevisor::{BackoffPolicy, JitterPolicy};
//!
//! let backoff = BackoffPolicy {
//!     first: Duration::from_millis(500),
//!     max: Duration::from_secs(5),
//!     factor: 2.0,
//!     jitter: JitterPolicy::None,
//! };
//!
//! assert_eq!(backoff.next(0), Duration::from_millis(500));
//! assert_eq!(backoff.next(1), Duration::from_secs(1));
//! assert_eq!(backoff.next(10), Duration::from_secs(5));
//! ```

use std::time::Duration;

use crate::policies::jitter::JitterPolicy;

/// Poll backoff policy.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BackoffPolicy {
    /// Delay after the first empty poll.
    pub first: Duration,
    /// Upper bound for any delay.
    pub max: Duration,
    /// Multiplicative growth factor (`>= 1.0` recommended).
    pub factor: f64,
    /// Jitter applied on top of the computed delay.
    pub jitter: JitterPolicy,
}

impl Default for BackoffPolicy {
    /// Returns a policy with:
    /// - `first = 500ms`;
    /// - `factor = 2.0`;
    /// - `max = 5s`;
    /// - `jitter = Equal`.
    fn default() -> Self {
        Self {
            first: Duration::from_millis(500),
            max: Duration::from_secs(5),
            factor: 2.0,
            jitter: JitterPolicy::Equal,
        }
    }
}

impl BackoffPolicy {
    /// A fixed delay, polled at a steady rhythm.
    pub fn constant(every: Duration) -> Self {
        Self {
            first: every,
            max: every,
            factor: 1.0,
            jitter: JitterPolicy::None,
        }
    }

    /// Computes the delay for the given streak (0-indexed).
    ///
    /// # Notes
    /// - `factor == 1.0` keeps the delay at `first` (up to `max`).
    /// - Non-finite intermediate values clamp to `max`.
    pub fn next(&self, streak: u32) -> Duration {
        let max_secs = self.max.as_secs_f64();
        let exp = streak.min(i32::MAX as u32) as i32;
        let raw = self.first.as_secs_f64() * self.factor.powi(exp);

        let base = if raw.is_finite() && (0.0..=max_secs).contains(&raw) {
            Duration::from_secs_f64(raw)
        } else {
            self.max
        };

        match self.jitter {
            JitterPolicy::Decorrelated => {
                self.jitter
                    .apply_decorrelated(self.first.min(self.max), base, self.max)
            }
            _ => self.jitter.apply(base),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain(first_ms: u64, max_ms: u64, factor: f64) -> BackoffPolicy {
        BackoffPolicy {
            first: Duration::from_millis(first_ms),
            max: Duration::from_millis(max_ms),
            factor,
            jitter: JitterPolicy::None,
        }
    }

    #[test]
    fn grows_geometrically_until_the_cap() {
        let policy = plain(500, 5_000, 2.0);
        let delays: Vec<u64> = (0..6).map(|n| policy.next(n).as_millis() as u64).collect();
        assert_eq!(delays, vec![500, 1_000, 2_000, 4_000, 5_000, 5_000]);
    }

    #[test]
    fn constant_policy_never_moves() {
        let policy = BackoffPolicy::constant(Duration::from_secs(2));
        for streak in [0, 1, 7, 1_000] {
            assert_eq!(policy.next(streak), Duration::from_secs(2));
        }
    }

    #[test]
    fn first_above_max_is_clamped() {
        assert_eq!(plain(10_000, 5_000, 2.0).next(0), Duration::from_secs(5));
    }

    #[test]
    fn overflow_clamps_to_max() {
        let policy = plain(100, 10_000, 2.0);
        assert_eq!(policy.next(u32::MAX), Duration::from_secs(10));
    }

    #[test]
    fn equal_jitter_stays_in_upper_half() {
        let policy = BackoffPolicy::default();
        for streak in 0..20 {
            let base = plain(500, 5_000, 2.0).next(streak);
            let delay = policy.next(streak);
            assert!(delay >= base / 2, "streak {streak}: {delay:?} < half of {base:?}");
            assert!(delay <= base, "streak {streak}: {delay:?} > {base:?}");
        }
    }

    #[test]
    fn decorrelated_jitter_respects_floor_and_cap() {
        let policy = BackoffPolicy {
            jitter: JitterPolicy::Decorrelated,
            ..plain(100, 3_000, 2.0)
        };
        for _ in 0..100 {
            let delay = policy.next(6);
            assert!(delay >= Duration::from_millis(100));
            assert!(delay <= Duration::from_secs(3));
        }
    }
}
