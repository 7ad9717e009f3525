//! Retry policy for part downloads.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use modelpack::manager::download::RetryPolicy;
//!
//! let policy = RetryPolicy::exponential(8);
//!
//! assert_eq!(policy.delay_for_attempt(1), Some(Duration::from_secs(1)));
//! assert_eq!(policy.delay_for_attempt(2), Some(Duration::from_secs(2)));
//! assert_eq!(policy.delay_for_attempt(5), Some(Duration::from_secs(12)));
//! assert_eq!(policy.delay_for_attempt(8), None);
//! ```

use std::time::Duration;

// =============================================================================
// Retry Policy Constants
// =============================================================================

/// Default initial delay for exponential backoff (1 second).
pub const DEFAULT_INITIAL_DELAY_MS: u64 = 1_000;

/// Default maximum delay for exponential backoff (12 seconds).
pub const DEFAULT_MAX_DELAY_SECS: u64 = 12;

/// Default multiplier for exponential backoff.
pub const DEFAULT_BACKOFF_MULTIPLIER: f64 = 2.0;

/// Default number of attempts per part.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 8;

/// Largest accepted attempt count.
pub const MAX_ATTEMPTS_LIMIT: u32 = 12;

/// How a part download handles transient failures.
#[derive(Clone, Debug, PartialEq)]
pub enum RetryPolicy {
    /// A single attempt per part.
    None,

    /// Constant pause between attempts.
    Fixed {
        /// Attempt bound, first try included.
        max_attempts: u32,
        /// Pause before each retry.
        delay: Duration,
    },

    /// Pause grows by `multiplier` per failure until it reaches `max_delay`.
    ExponentialBackoff {
        /// Attempt bound, first try included.
        max_attempts: u32,
        /// Pause after the first failure.
        initial_delay: Duration,
        /// Plateau for the pause.
        max_delay: Duration,
        /// Growth factor per failure.
        multiplier: f64,
    },
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::exponential(DEFAULT_MAX_ATTEMPTS)
    }
}

impl RetryPolicy {
    /// Doubling backoff from 1s up to 12s, bounded by `max_attempts`.
    pub fn exponential(max_attempts: u32) -> Self {
        Self::ExponentialBackoff {
            max_attempts,
            initial_delay: Duration::from_millis(DEFAULT_INITIAL_DELAY_MS),
            max_delay: Duration::from_secs(DEFAULT_MAX_DELAY_SECS),
            multiplier: DEFAULT_BACKOFF_MULTIPLIER,
        }
    }

    /// Doubling backoff between the given bounds.
    pub fn exponential_with(
        max_attempts: u32,
        initial_delay: Duration,
        max_delay: Duration,
    ) -> Self {
        Self::ExponentialBackoff {
            max_attempts,
            initial_delay,
            max_delay,
            multiplier: DEFAULT_BACKOFF_MULTIPLIER,
        }
    }

    /// Same pause before every retry.
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self::Fixed {
            max_attempts,
            delay,
        }
    }

    /// Pause before the retry that follows failed `attempt` (1-based).
    ///
    /// `None` once the attempt bound is reached.
    pub fn delay_for_attempt(&self, attempt: u32) -> Option<Duration> {
        match self {
            Self::None => None,
            Self::Fixed {
                max_attempts,
                delay,
            } => {
                if attempt < *max_attempts {
                    Some(*delay)
                } else {
                    None
                }
            }
            Self::ExponentialBackoff {
                max_attempts,
                initial_delay,
                max_delay,
                multiplier,
            } => {
                if attempt < *max_attempts {
                    // initial_delay * multiplier^(attempt-1), capped
                    let factor = multiplier.powi(attempt.saturating_sub(1) as i32);
                    let delay_ms = initial_delay.as_millis() as f64 * factor;
                    let capped = delay_ms.min(max_delay.as_millis() as f64);
                    Some(Duration::from_millis(capped as u64).min(*max_delay))
                } else {
                    None
                }
            }
        }
    }

    /// Attempt bound, first try included.
    pub fn max_attempts(&self) -> u32 {
        match self {
            Self::None => 1,
            Self::Fixed { max_attempts, .. } => *max_attempts,
            Self::ExponentialBackoff { max_attempts, .. } => *max_attempts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts(), DEFAULT_MAX_ATTEMPTS);
        assert_eq!(policy.delay_for_attempt(1), Some(Duration::from_secs(1)));
    }

    #[test]
    fn test_none_policy() {
        assert_eq!(RetryPolicy::None.delay_for_attempt(1), None);
        assert_eq!(RetryPolicy::None.max_attempts(), 1);
    }

    #[test]
    fn test_fixed_policy() {
        let policy = RetryPolicy::fixed(3, Duration::from_millis(50));
        assert_eq!(policy.delay_for_attempt(1), Some(Duration::from_millis(50)));
        assert_eq!(policy.delay_for_attempt(2), Some(Duration::from_millis(50)));
        assert_eq!(policy.delay_for_attempt(3), None);
    }

    #[test]
    fn test_exponential_sequence() {
        let policy = RetryPolicy::exponential(8);
        let delays: Vec<u64> = (1..8)
            .map(|a| policy.delay_for_attempt(a).unwrap().as_secs())
            .collect();
        assert_eq!(delays, vec![1, 2, 4, 8, 12, 12, 12]);
        assert_eq!(policy.delay_for_attempt(8), None);
    }

    #[test]
    fn test_exponential_monotonic_until_cap() {
        let policy = RetryPolicy::exponential(MAX_ATTEMPTS_LIMIT);
        let cap = Duration::from_secs(DEFAULT_MAX_DELAY_SECS);
        let mut previous = Duration::ZERO;

        for attempt in 1..MAX_ATTEMPTS_LIMIT {
            let delay = policy.delay_for_attempt(attempt).unwrap();
            assert!(delay <= cap);
            if previous < cap {
                assert!(delay > previous, "attempt {} did not grow", attempt);
            } else {
                assert_eq!(delay, cap);
            }
            previous = delay;
        }
    }

    #[test]
    fn test_terminal_only_after_bound() {
        for max in 1..=MAX_ATTEMPTS_LIMIT {
            let policy = RetryPolicy::exponential(max);
            for attempt in 1..max {
                assert!(policy.delay_for_attempt(attempt).is_some());
            }
            assert!(policy.delay_for_attempt(max).is_none());
        }
    }

    #[test]
    fn test_exponential_with_custom_delays() {
        let policy =
            RetryPolicy::exponential_with(4, Duration::from_millis(5), Duration::from_millis(12));
        assert_eq!(policy.delay_for_attempt(1), Some(Duration::from_millis(5)));
        assert_eq!(policy.delay_for_attempt(2), Some(Duration::from_millis(10)));
        assert_eq!(policy.delay_for_attempt(3), Some(Duration::from_millis(12)));
    }
}
