use chrono::{DateTime, Utc};
use std::time::{Duration, Instant};

/// Mission-wide time base shared by every loop and the telemetry log.
#[derive(Debug, Clone, Copy)]
pub struct MissionClock {
    epoch: Instant,
    started_at: DateTime<Utc>,
}

impl MissionClock {
    pub fn start() -> Self {
        Self {
            epoch: Instant::now(),
            started_at: Utc::now(),
        }
    }

    /// Seconds since the mission started, monotonic.
    pub fn now(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64()
    }

    pub fn seconds_at(&self, instant: Instant) -> f64 {
        instant.saturating_duration_since(self.epoch).as_secs_f64()
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }
}

impl Default for MissionClock {
    fn default() -> Self {
        Self::start()
    }
}

/// Drift-corrected tick deadlines: tick `k` is due at `start + k * interval`
/// no matter how long earlier ticks took.
#[derive(Debug, Clone, Copy)]
pub struct TickSchedule {
    start: Instant,
    interval: Duration,
}

impl TickSchedule {
    pub fn new(start: Instant, interval_secs: f64) -> Self {
        Self {
            start,
            interval: Duration::from_secs_f64(interval_secs),
        }
    }

    pub fn start_now(interval_secs: f64) -> Self {
        Self::new(Instant::now(), interval_secs)
    }

    pub fn start(&self) -> Instant {
        self.start
    }

    pub fn deadline(&self, tick: u64) -> Instant {
        self.start + self.interval.mul_f64(tick as f64)
    }

    /// Index of the tick window `now` falls into.
    pub fn current_tick(&self, now: Instant) -> u64 {
        let elapsed = now.saturating_duration_since(self.start).as_secs_f64();
        (elapsed / self.interval.as_secs_f64()).floor() as u64
    }

    /// Nominal phase time of a tick (s)
    pub fn tick_time(&self, tick: u64) -> f64 {
        tick as f64 * self.interval.as_secs_f64()
    }
}
