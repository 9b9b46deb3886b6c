//! Watchdog guarding hardware codec sessions

use std::fmt;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// Bounds applied to one native segment run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchdogLimits {
    /// Hard wall-clock ceiling for the pull loop
    pub wall_clock: Duration,
    /// Consecutive loop cycles allowed without decoder or encoder progress
    pub max_idle_iterations: u32,
}

impl Default for WatchdogLimits {
    fn default() -> Self {
        Self {
            wall_clock: Duration::from_secs(300),
            max_idle_iterations: 1000,
        }
    }
}

/// Reason the watchdog fired
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchdogTrip {
    WallClock { elapsed: Duration, limit: Duration },
    Stalled { iterations: u32 },
}

impl fmt::Display for WatchdogTrip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WatchdogTrip::WallClock { elapsed, limit } => write!(
                f,
                "hardware session exceeded {:.1}s wall-clock limit ({:.1}s elapsed)",
                limit.as_secs_f64(),
                elapsed.as_secs_f64()
            ),
            WatchdogTrip::Stalled { iterations } => write!(
                f,
                "hardware session made no progress for {} consecutive iterations",
                iterations
            ),
        }
    }
}

/// Two independent guards: elapsed time and idle spin count
#[derive(Debug)]
pub struct Watchdog {
    limits: WatchdogLimits,
    started: Instant,
    idle_iterations: u32,
}

impl Watchdog {
    pub fn start(limits: WatchdogLimits) -> Self {
        Self::start_at(limits, Instant::now())
    }

    pub fn start_at(limits: WatchdogLimits, started: Instant) -> Self {
        Self {
            limits,
            started,
            idle_iterations: 0,
        }
    }

    /// Record one loop cycle
    pub fn check(&mut self, progressed: bool) -> Result<(), WatchdogTrip> {
        self.check_at(Instant::now(), progressed)
    }

    pub fn check_at(&mut self, now: Instant, progressed: bool) -> Result<(), WatchdogTrip> {
        let elapsed = now.saturating_duration_since(self.started);
        if elapsed > self.limits.wall_clock {
            return Err(WatchdogTrip::WallClock {
                elapsed,
                limit: self.limits.wall_clock,
            });
        }

        if progressed {
            self.idle_iterations = 0;
            return Ok(());
        }
        self.idle_iterations = self.idle_iterations.saturating_add(1);
        if self.idle_iterations >= self.limits.max_idle_iterations {
            return Err(WatchdogTrip::Stalled {
                iterations: self.idle_iterations,
            });
        }
        Ok(())
    }

    pub fn idle_iterations(&self) -> u32 {
        self.idle_iterations
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits(secs: u64, idle: u32) -> WatchdogLimits {
        WatchdogLimits {
            wall_clock: Duration::from_secs(secs),
            max_idle_iterations: idle,
        }
    }

    #[test]
    fn test_progress_resets_idle_counter() {
        let mut watchdog = Watchdog::start(limits(60, 3));
        assert!(watchdog.check(false).is_ok());
        assert!(watchdog.check(false).is_ok());
        assert_eq!(watchdog.idle_iterations(), 2);
        assert!(watchdog.check(true).is_ok());
        assert_eq!(watchdog.idle_iterations(), 0);
    }

    #[test]
    fn test_stall_trips_after_limit() {
        let mut watchdog = Watchdog::start(limits(60, 3));
        assert!(watchdog.check(false).is_ok());
        assert!(watchdog.check(false).is_ok());
        assert_eq!(
            watchdog.check(false),
            Err(WatchdogTrip::Stalled { iterations: 3 })
        );
    }

    #[test]
    fn test_wall_clock_trips_even_with_progress() {
        let started = Instant::now();
        let mut watchdog = Watchdog::start_at(limits(5, 100), started);
        assert!(watchdog.check_at(started + Duration::from_secs(4), true).is_ok());
        let trip = watchdog
            .check_at(started + Duration::from_secs(6), true)
            .unwrap_err();
        assert!(matches!(trip, WatchdogTrip::WallClock { .. }));
        assert!(trip.to_string().contains("wall-clock"));
    }
}
