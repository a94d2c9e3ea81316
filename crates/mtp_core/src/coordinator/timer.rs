//! Position poll timer.
//!
//! The shell owns the real clock and calls `PlaybackCoordinator::tick` every
//! [`PollTimer::interval`]. This type only tracks whether ticks should do
//! anything and when the drift check is due.

use std::time::Duration;

use crate::config::SyncSettings;

#[derive(Debug, Clone)]
pub struct PollTimer {
    interval: Duration,
    drift_every: u32,
    running: bool,
    ticks: u64,
}

impl PollTimer {
    pub fn new(interval: Duration, drift_every: u32) -> Self {
        Self {
            interval,
            drift_every: drift_every.max(1),
            running: false,
            ticks: 0,
        }
    }

    pub fn from_settings(settings: &SyncSettings) -> Self {
        Self::new(settings.tick_interval(), settings.drift_every_ticks)
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn start(&mut self) {
        if !self.running {
            self.running = true;
            self.ticks = 0;
        }
    }

    pub fn stop(&mut self) {
        self.running = false;
    }

    /// Count one tick; returns whether the drift check is due.
    pub fn on_tick(&mut self) -> bool {
        self.ticks += 1;
        self.ticks % u64::from(self.drift_every) == 0
    }
}

impl Default for PollTimer {
    fn default() -> Self {
        Self::from_settings(&SyncSettings::default())
    }
}
