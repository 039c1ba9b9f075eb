//! The three periodic timers of a running session.
//!
//! All three are started and dropped together; only the feed timer can be
//! restarted on its own (speed change).

use modsim_rust_core::GameConfig;
use std::time::Duration;
use tokio::time::{interval_at, Instant, Interval};

#[derive(Debug, Default)]
pub struct SessionTimers {
    pub(crate) clock: Option<Interval>,
    pub(crate) feed: Option<Interval>,
    pub(crate) time_score: Option<Interval>,
}

impl SessionTimers {
    pub fn idle() -> Self {
        Self::default()
    }

    /// First ticks land one period after now
    pub fn start(&mut self, config: &GameConfig, feed_period: Duration) {
        let now = Instant::now();
        self.clock = Some(periodic(now, config.clock_step()));
        self.feed = Some(periodic(now, feed_period));
        self.time_score = Some(periodic(now, config.time_score_interval()));
    }

    /// Replace the feed cadence. No-op unless the session timers are running.
    pub fn restart_feed(&mut self, period: Duration) {
        if self.clock.is_some() {
            self.feed = Some(periodic(Instant::now(), period));
        }
    }

    pub fn stop_all(&mut self) {
        self.clock = None;
        self.feed = None;
        self.time_score = None;
    }

    pub fn is_running(&self) -> bool {
        self.clock.is_some()
    }
}

fn periodic(start: Instant, period: Duration) -> Interval {
    interval_at(start + period, period)
}

/// Next tick of `timer`, or never when it is not running
pub(crate) async fn next_tick(timer: &mut Option<Interval>) -> Instant {
    match timer {
        Some(interval) => interval.tick().await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_first_tick_after_one_period() {
        let mut timers = SessionTimers::idle();
        timers.start(&GameConfig::default(), Duration::from_millis(8_000));
        let started = Instant::now();

        let at = next_tick(&mut timers.clock).await;
        assert_eq!(at - started, Duration::from_millis(1_000));
        let at = next_tick(&mut timers.feed).await;
        assert_eq!(at - started, Duration::from_millis(8_000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_all_silences_every_timer() {
        let mut timers = SessionTimers::idle();
        timers.start(&GameConfig::default(), Duration::from_millis(8_000));
        timers.stop_all();
        timers.stop_all();
        assert!(!timers.is_running());

        let fired = tokio::time::timeout(Duration::from_secs(120), next_tick(&mut timers.clock)).await;
        assert!(fired.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_feed_requires_running_session() {
        let mut timers = SessionTimers::idle();
        timers.restart_feed(Duration::from_millis(4_000));
        assert!(timers.feed.is_none());

        timers.start(&GameConfig::default(), Duration::from_millis(8_000));
        let restarted = Instant::now();
        timers.restart_feed(Duration::from_millis(4_000));
        let at = next_tick(&mut timers.feed).await;
        assert_eq!(at - restarted, Duration::from_millis(4_000));
    }
}
