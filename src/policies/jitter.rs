//! # Jitter policy for poll delays.
//!
//! [`JitterPolicy`] adds randomness to backoff delays so that several pollers
//! sharing one source do not wake up in lockstep.
//!
//! | Policy         | Delay drawn from                       |
//! |----------------|----------------------------------------|
//! | `None`         | `d`                                    |
//! | `Full`         | `[0, d]`                               |
//! | `Equal`        | `[d/2, d]`                             |
//! | `Decorrelated` | `[floor, min(3·d, max)]`               |

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Randomization applied on top of a computed backoff delay.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JitterPolicy {
    /// Exact delays; deterministic in tests.
    #[default]
    None,
    /// Anywhere between zero and the delay.
    Full,
    /// At least half of the delay.
    Equal,
    /// Between a floor and three times the delay, capped.
    ///
    /// Needs the floor and cap, see [`apply_decorrelated`](Self::apply_decorrelated).
    Decorrelated,
}

impl JitterPolicy {
    /// Applies jitter to `delay`.
    ///
    /// `Decorrelated` returns `delay` unchanged here.
    pub fn apply(&self, delay: Duration) -> Duration {
        let ms = delay.as_millis() as u64;
        match self {
            JitterPolicy::None | JitterPolicy::Decorrelated => delay,
            JitterPolicy::Full => draw(0, ms),
            JitterPolicy::Equal => draw(ms / 2, ms / 2 * 2),
        }
    }

    /// Decorrelated jitter: uniform in `[floor, min(3·delay, max)]`.
    ///
    /// Other policies fall back to [`apply`](Self::apply).
    pub fn apply_decorrelated(&self, floor: Duration, delay: Duration, max: Duration) -> Duration {
        if *self != JitterPolicy::Decorrelated {
            return self.apply(delay);
        }
        let lo = floor.as_millis() as u64;
        let hi = (delay.as_millis() as u64)
            .saturating_mul(3)
            .min(max.as_millis() as u64)
            .max(lo);
        draw(lo, hi)
    }
}

/// Uniform draw in `[lo, hi]` milliseconds.
fn draw(lo: u64, hi: u64) -> Duration {
    if hi <= lo {
        return Duration::from_millis(lo);
    }
    Duration::from_millis(rand::rng().random_range(lo..=hi))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_is_identity() {
        let d = Duration::from_millis(1234);
        assert_eq!(JitterPolicy::None.apply(d), d);
    }

    #[test]
    fn full_and_equal_bounds() {
        let d = Duration::from_millis(1000);
        for _ in 0..200 {
            assert!(JitterPolicy::Full.apply(d) <= d);
            let eq = JitterPolicy::Equal.apply(d);
            assert!(eq >= Duration::from_millis(500) && eq <= d, "{eq:?}");
        }
    }

    #[test]
    fn zero_delay_stays_zero() {
        for p in [JitterPolicy::Full, JitterPolicy::Equal] {
            assert_eq!(p.apply(Duration::ZERO), Duration::ZERO);
        }
    }

    #[test]
    fn decorrelated_collapses_when_floor_exceeds_cap() {
        let d = JitterPolicy::Decorrelated.apply_decorrelated(
            Duration::from_secs(2),
            Duration::from_millis(10),
            Duration::from_secs(1),
        );
        assert_eq!(d, Duration::from_secs(2));
    }
}
