//! Reconnection retry policy
//!
//! The first attempt waits 100ms; every later delay is twice the average of
//! the delays granted so far, which makes the sequence grow linearly. The
//! attempt budget is 3 + max(times connected, 5), so a connection that has
//! proven itself earns a longer reconnect budget.

use std::io;
use std::time::Duration;

const FIRST_DELAY: Duration = Duration::from_millis(100);

pub(crate) struct RetryPolicy {
    /// Attempts granted so far.
    attempt: u32,
    /// Successful connections over the life of the process.
    times_connected: u32,
    /// Sum of the delays granted so far.
    elapsed: Duration,
    /// Most recent connection failure, reported when the budget runs out.
    last_error: Option<io::Error>,
}

impl RetryPolicy {
    pub fn new(times_connected: u32) -> Self {
        RetryPolicy {
            attempt: 0,
            times_connected,
            elapsed: Duration::ZERO,
            last_error: None,
        }
    }

    /// Delay before the next attempt, or `None` once the budget is spent.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.attempt + 1 > 3 + self.times_connected.max(5) {
            return None;
        }
        self.attempt += 1;

        let delay = if self.attempt == 1 {
            FIRST_DELAY
        } else {
            self.elapsed / (self.attempt - 1) * 2
        };
        self.elapsed += delay;
        Some(delay)
    }

    /// Number of attempts granted so far.
    pub fn attempts(&self) -> u32 {
        self.attempt
    }

    /// Remember the outcome of a failed attempt.
    pub fn record_failure(&mut self, error: io::Error) {
        self.last_error = Some(error);
    }

    /// The failure to report when giving up.
    pub fn give_up(self) -> io::Error {
        self.last_error
            .unwrap_or_else(|| io::Error::new(io::ErrorKind::Other, "no connection attempt was made"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delays(mut policy: RetryPolicy) -> Vec<u64> {
        let mut out = Vec::new();
        while let Some(delay) = policy.next_delay() {
            out.push(delay.as_millis() as u64);
        }
        out
    }

    #[test]
    fn test_delays_grow_linearly() {
        // 100, then elapsed/(n-1)*2: twice the running average.
        assert_eq!(
            delays(RetryPolicy::new(0)),
            vec![100, 200, 300, 400, 500, 600, 700, 800]
        );
    }

    #[test]
    fn test_budget_is_eight_attempts_for_a_fresh_connection() {
        let mut policy = RetryPolicy::new(0);
        for _ in 0..8 {
            assert!(policy.next_delay().is_some());
        }
        assert!(policy.next_delay().is_none());
        assert_eq!(policy.attempts(), 8);
    }

    #[test]
    fn test_budget_grows_with_successful_connections() {
        // max(times_connected, 5) floors the budget at 8 attempts.
        assert_eq!(delays(RetryPolicy::new(3)).len(), 8);
        assert_eq!(delays(RetryPolicy::new(5)).len(), 8);
        assert_eq!(delays(RetryPolicy::new(7)).len(), 10);
    }

    #[test]
    fn test_give_up_reports_the_last_failure() {
        let mut policy = RetryPolicy::new(0);
        policy.next_delay();
        policy.record_failure(io::Error::new(io::ErrorKind::ConnectionRefused, "refused"));
        assert_eq!(policy.give_up().kind(), io::ErrorKind::ConnectionRefused);
    }
}
