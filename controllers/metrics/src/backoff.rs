//! # Fibonacci Backoff
//!
//! Backoff schedule for retryable call failures against the metrics service.
//! Grows more slowly than exponential backoff, which suits a control plane
//! that throttles rather than rejects: the sequence at a 5 second minimum is
//! 5s, 5s, 10s, 15s, 25s, 40s, 65s, ... capped at the configured maximum.
//!
//! The reconcilers use the stateless [`FibonacciBackoff::for_error_count`]
//! form, driven by the per-object consecutive-error counter kept in the
//! observed-state cache. The counter resets on the first successful call, so
//! the schedule restarts from the minimum after recovery.

use std::time::Duration;

/// Fibonacci backoff calculator
#[derive(Debug, Clone)]
pub struct FibonacciBackoff {
    /// Minimum backoff value in seconds (for reset)
    min_secs: u64,
    /// Previous backoff value in seconds
    prev_secs: u64,
    /// Current backoff value in seconds
    current_secs: u64,
    /// Maximum backoff value in seconds
    max_secs: u64,
}

impl FibonacciBackoff {
    /// Create a new Fibonacci backoff with the given bounds in seconds
    #[must_use]
    pub fn new(min_secs: u64, max_secs: u64) -> Self {
        Self {
            min_secs,
            prev_secs: 0,
            current_secs: min_secs,
            max_secs,
        }
    }

    /// Get the next backoff duration and advance the sequence
    pub fn next_backoff(&mut self) -> Duration {
        let result = Duration::from_secs(self.current_secs);

        let next_secs = self.prev_secs + self.current_secs;
        self.prev_secs = self.current_secs;
        self.current_secs = std::cmp::min(next_secs, self.max_secs);

        result
    }

    /// Reset the backoff to the initial state
    pub fn reset(&mut self) {
        self.prev_secs = 0;
        self.current_secs = self.min_secs;
    }

    /// Calculate the backoff duration for a given consecutive-error count.
    ///
    /// Stateless companion to the iterator form: the nth value of the same
    /// sequence, capped at `max_secs`. The first two failures both get the
    /// minimum.
    #[must_use]
    pub fn for_error_count(error_count: u32, min_secs: u64, max_secs: u64) -> Duration {
        if error_count <= 2 {
            return Duration::from_secs(std::cmp::min(min_secs, max_secs));
        }

        let mut prev_secs = min_secs;
        let mut current_secs = min_secs;
        for _ in 3..=error_count {
            let next_secs = prev_secs + current_secs;
            prev_secs = current_secs;
            current_secs = std::cmp::min(next_secs, max_secs);
            if current_secs >= max_secs {
                break;
            }
        }

        Duration::from_secs(std::cmp::min(current_secs, max_secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fibonacci_backoff_sequence() {
        let mut backoff = FibonacciBackoff::new(5, 300);

        assert_eq!(backoff.next_backoff(), Duration::from_secs(5));
        assert_eq!(backoff.next_backoff(), Duration::from_secs(5));
        assert_eq!(backoff.next_backoff(), Duration::from_secs(10));
        assert_eq!(backoff.next_backoff(), Duration::from_secs(15));
        assert_eq!(backoff.next_backoff(), Duration::from_secs(25));
        assert_eq!(backoff.next_backoff(), Duration::from_secs(40));
        assert_eq!(backoff.next_backoff(), Duration::from_secs(65));
    }

    #[test]
    fn test_fibonacci_backoff_max_cap() {
        let mut backoff = FibonacciBackoff::new(60, 300);

        assert_eq!(backoff.next_backoff(), Duration::from_secs(60));
        assert_eq!(backoff.next_backoff(), Duration::from_secs(60));
        assert_eq!(backoff.next_backoff(), Duration::from_secs(120));
        assert_eq!(backoff.next_backoff(), Duration::from_secs(180));
        assert_eq!(backoff.next_backoff(), Duration::from_secs(300));
        // Next would be 480, but the sequence is capped
        assert_eq!(backoff.next_backoff(), Duration::from_secs(300));
        assert_eq!(backoff.next_backoff(), Duration::from_secs(300));
    }

    #[test]
    fn test_fibonacci_backoff_reset() {
        let mut backoff = FibonacciBackoff::new(5, 300);

        assert_eq!(backoff.next_backoff(), Duration::from_secs(5));
        assert_eq!(backoff.next_backoff(), Duration::from_secs(5));
        assert_eq!(backoff.next_backoff(), Duration::from_secs(10));

        backoff.reset();

        assert_eq!(backoff.next_backoff(), Duration::from_secs(5));
        assert_eq!(backoff.next_backoff(), Duration::from_secs(5));
        assert_eq!(backoff.next_backoff(), Duration::from_secs(10));
    }

    #[test]
    fn test_stateless_matches_iterator_form() {
        let mut backoff = FibonacciBackoff::new(5, 300);
        // Error counts are 1-indexed: the first failure gets the first value
        for count in 1..=10u32 {
            assert_eq!(
                FibonacciBackoff::for_error_count(count, 5, 300),
                backoff.next_backoff(),
                "mismatch at error count {count}"
            );
        }
    }
}
