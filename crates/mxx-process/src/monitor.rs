// monitor.rs - Lifetime monitor for kill-on-lifetime runs.
//
// Sleeps in steps of the poll interval until the profile's lifetime has
// elapsed. After every full interval the liveness check is asked whether the
// profile's processes are still alive:
//   - alive      => consecutive failure counter reset to 0
//   - not alive  => counter += 1; reaching the threshold ends monitoring
//                   early with MonitorOutcome::Failed
// A trailing partial interval is slept but not polled.

use std::thread;
use std::time::Duration;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);
pub const DEFAULT_MAX_FAILURES: u32 = 10;

/// Source of blocking waits. Tests substitute one that only records.
pub trait Sleeper {
    fn sleep(&mut self, duration: Duration);
}

/// Really sleeps.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&mut self, duration: Duration) {
        thread::sleep(duration);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorOutcome {
    LifetimeElapsed,
    Failed,
}

/// Loop counters, returned alongside the outcome.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MonitorState {
    pub elapsed: Duration,
    pub polls: u32,
    pub consecutive_failures: u32,
}

#[derive(Debug, Clone, Copy)]
pub struct Monitor {
    interval: Duration,
    max_failures: u32,
}

impl Default for Monitor {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL, DEFAULT_MAX_FAILURES)
    }
}

impl Monitor {
    /// A zero interval or threshold is bumped to one second / one failure.
    pub fn new(interval: Duration, max_failures: u32) -> Self {
        Self {
            interval: if interval.is_zero() {
                Duration::from_secs(1)
            } else {
                interval
            },
            max_failures: max_failures.max(1),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn max_failures(&self) -> u32 {
        self.max_failures
    }

    /// Watch for `lifetime`, calling `check_alive` after each full interval.
    pub fn run(
        &self,
        lifetime: Duration,
        sleeper: &mut (impl Sleeper + ?Sized),
        mut check_alive: impl FnMut() -> bool,
    ) -> (MonitorOutcome, MonitorState) {
        let mut state = MonitorState::default();

        while state.elapsed < lifetime {
            let step = self.interval.min(lifetime - state.elapsed);
            sleeper.sleep(step);
            state.elapsed += step;
            if step < self.interval {
                break;
            }

            state.polls += 1;
            if check_alive() {
                if state.consecutive_failures > 0 {
                    tracing::info!("processes recovered, resetting failure counter");
                }
                state.consecutive_failures = 0;
            } else {
                state.consecutive_failures += 1;
                tracing::warn!(
                    elapsed_secs = state.elapsed.as_secs(),
                    "profile processes not running (failure {}/{})",
                    state.consecutive_failures,
                    self.max_failures
                );
                if state.consecutive_failures >= self.max_failures {
                    return (MonitorOutcome::Failed, state);
                }
            }
        }

        (MonitorOutcome::LifetimeElapsed, state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct RecordingSleeper {
        naps: Vec<Duration>,
    }

    impl Sleeper for RecordingSleeper {
        fn sleep(&mut self, duration: Duration) {
            self.naps.push(duration);
        }
    }

    fn secs(n: u64) -> Duration {
        Duration::from_secs(n)
    }

    #[test]
    fn healthy_run_lasts_the_full_lifetime() {
        let mut sleeper = RecordingSleeper::default();
        let (outcome, state) = Monitor::default().run(secs(35), &mut sleeper, || true);

        assert_eq!(outcome, MonitorOutcome::LifetimeElapsed);
        assert_eq!(state.elapsed, secs(35));
        // The trailing 5s step isn't polled.
        assert_eq!(state.polls, 3);
        assert_eq!(sleeper.naps, vec![secs(10), secs(10), secs(10), secs(5)]);
    }

    #[test]
    fn short_lifetime_never_polls() {
        let mut sleeper = RecordingSleeper::default();
        let mut polled = false;
        let (outcome, state) = Monitor::default().run(secs(5), &mut sleeper, || {
            polled = true;
            false
        });
        assert_eq!(outcome, MonitorOutcome::LifetimeElapsed);
        assert_eq!(state.elapsed, secs(5));
        assert!(!polled);
    }

    #[test]
    fn dead_processes_fail_after_threshold() {
        let mut sleeper = RecordingSleeper::default();
        let (outcome, state) = Monitor::default().run(secs(3600), &mut sleeper, || false);

        assert_eq!(outcome, MonitorOutcome::Failed);
        assert_eq!(state.polls, 10);
        assert_eq!(state.elapsed, secs(100));
        assert_eq!(state.consecutive_failures, 10);
    }

    #[test]
    fn recovery_resets_the_counter() {
        let mut sleeper = RecordingSleeper::default();
        // Nine failures, one success, then healthy.
        let mut answers = (0..9).map(|_| false).chain(std::iter::repeat(true));
        let (outcome, state) =
            Monitor::default().run(secs(300), &mut sleeper, || answers.next().unwrap_or(true));

        assert_eq!(outcome, MonitorOutcome::LifetimeElapsed);
        assert_eq!(state.consecutive_failures, 0);
        assert_eq!(state.polls, 30);
    }

    #[test]
    fn zero_lifetime_returns_immediately() {
        let mut sleeper = RecordingSleeper::default();
        let (outcome, state) = Monitor::default().run(Duration::ZERO, &mut sleeper, || false);
        assert_eq!(outcome, MonitorOutcome::LifetimeElapsed);
        assert_eq!(state, MonitorState::default());
        assert!(sleeper.naps.is_empty());
    }

    #[test]
    fn degenerate_settings_are_clamped() {
        let monitor = Monitor::new(Duration::ZERO, 0);
        assert_eq!(monitor.interval(), secs(1));
        assert_eq!(monitor.max_failures(), 1);
    }
}
