//! Virtual clock.

use keypool_core::Clock;
use parking_lot::Mutex;
use std::time::Duration;

/// Default start time: 2023-11-14T22:13:20Z.
const DEFAULT_START: Duration = Duration::from_secs(1_700_000_000);

#[derive(Debug, Default)]
struct ClockState {
    now: Duration,
    sleeps: Vec<Duration>,
}

/// [`Clock`] whose `sleep` advances virtual time instantly.
///
/// Every sleep is recorded so tests can assert on generation pacing.
#[derive(Debug)]
pub struct SimClock {
    state: Mutex<ClockState>,
}

impl SimClock {
    pub fn new() -> Self {
        Self::starting_at(DEFAULT_START)
    }

    pub fn starting_at(now: Duration) -> Self {
        Self {
            state: Mutex::new(ClockState {
                now,
                sleeps: Vec::new(),
            }),
        }
    }

    /// Move time forward without recording a sleep.
    pub fn advance(&self, by: Duration) {
        let mut state = self.state.lock();
        state.now = state.now.saturating_add(by);
    }

    /// Every sleep requested so far, in order.
    pub fn sleeps(&self) -> Vec<Duration> {
        self.state.lock().sleeps.clone()
    }

    pub fn sleep_count(&self) -> usize {
        self.state.lock().sleeps.len()
    }

    pub fn total_slept(&self) -> Duration {
        self.state.lock().sleeps.iter().sum()
    }

    pub fn clear_sleeps(&self) {
        self.state.lock().sleeps.clear();
    }
}

impl Default for SimClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SimClock {
    fn now(&self) -> Duration {
        self.state.lock().now
    }

    fn sleep(&self, duration: Duration) {
        let mut state = self.state.lock();
        state.now = state.now.saturating_add(duration);
        state.sleeps.push(duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sleep_advances_and_records() {
        let clock = SimClock::starting_at(Duration::from_secs(10));
        clock.sleep(Duration::from_millis(1500));
        clock.advance(Duration::from_secs(1));

        assert_eq!(clock.now(), Duration::from_millis(12_500));
        assert_eq!(clock.sleeps(), vec![Duration::from_millis(1500)]);
        assert_eq!(clock.total_slept(), Duration::from_millis(1500));
    }
}
