//! Exponential backoff for resolution attempts and stream reconnects.
//!
//! Grounded on the teacher's `ds/conn/backoff.rs::ExponentialBackoff`, which
//! has the same attempt-counter/reset shape but grows `20u64.pow(attempt)` —
//! that formula reaches its own cap after two attempts and disagrees with
//! this spec's required 100 ms start, doubling growth, 2000 ms cap. This
//! type keeps the teacher's state machine (attempt counter, `reset()` on
//! success) and replaces only the growth formula.

use std::time::Duration;

const START: Duration = Duration::from_millis(100);
const CAP: Duration = Duration::from_millis(2000);

/// Doubling backoff: 100ms, 200ms, 400ms, 800ms, 1600ms, 2000ms, 2000ms, ...
#[derive(Debug, Clone, Copy)]
pub struct Backoff {
    attempt: u32,
}

impl Backoff {
    pub const fn new() -> Backoff {
        Backoff { attempt: 0 }
    }

    /// The delay to wait before the next attempt, then advances the counter.
    pub fn next_delay(&mut self) -> Duration {
        let shift = self.attempt.min(31);
        let delay = START.checked_mul(1u32 << shift).unwrap_or(CAP).min(CAP);
        self.attempt = self.attempt.saturating_add(1);
        delay
    }

    /// Call on success; the next failure starts the sequence over at `START`.
    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Backoff::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doubles_from_100ms_and_caps_at_2000ms() {
        let mut backoff = Backoff::new();
        let delays: Vec<Duration> = (0..8).map(|_| backoff.next_delay()).collect();
        assert_eq!(
            delays,
            vec![
                Duration::from_millis(100),
                Duration::from_millis(200),
                Duration::from_millis(400),
                Duration::from_millis(800),
                Duration::from_millis(1600),
                Duration::from_millis(2000),
                Duration::from_millis(2000),
                Duration::from_millis(2000),
            ]
        );
    }

    #[test]
    fn reset_restarts_the_sequence() {
        let mut backoff = Backoff::new();
        backoff.next_delay();
        backoff.next_delay();
        backoff.reset();
        assert_eq!(backoff.next_delay(), Duration::from_millis(100));
    }
}
