//! Fixed-duration session countdown.

use crate::game_config::GameConfig;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ClockTick {
    Running { time_remaining_ms: u64 },
    /// Reached zero on this tick. Reported exactly once per start.
    Expired,
    /// Tick arrived while the clock was not running
    Idle,
}

#[derive(Debug, Clone)]
pub struct SessionClock {
    duration_ms: u64,
    step_ms: u64,
    time_remaining_ms: u64,
    running: bool,
}

impl SessionClock {
    pub fn new(config: &GameConfig) -> Self {
        Self {
            duration_ms: config.game_duration_ms,
            step_ms: config.clock_step_ms,
            time_remaining_ms: config.game_duration_ms,
            running: false,
        }
    }

    pub fn start(&mut self) {
        self.time_remaining_ms = self.duration_ms;
        self.running = true;
    }

    pub fn tick(&mut self) -> ClockTick {
        if !self.running {
            return ClockTick::Idle;
        }
        self.time_remaining_ms = self.time_remaining_ms.saturating_sub(self.step_ms);
        if self.time_remaining_ms == 0 {
            self.running = false;
            return ClockTick::Expired;
        }
        ClockTick::Running {
            time_remaining_ms: self.time_remaining_ms,
        }
    }

    /// Safe to call any number of times
    pub fn stop(&mut self) {
        self.running = false;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn time_remaining_ms(&self) -> u64 {
        self.time_remaining_ms
    }

    pub fn duration_ms(&self) -> u64 {
        self.duration_ms
    }
}
