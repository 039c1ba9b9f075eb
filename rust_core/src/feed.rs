//! Tweet feed scheduler.
//!
//! Reveals tweets from a pre-shuffled backlog into a bounded, newest-first
//! visible feed. Timing lives with the caller: the scheduler only reports
//! the refresh period from [`FeedScheduler::start`] and decides on each
//! [`FeedScheduler::tick`] whether a tweet may be injected.

use crate::game_config::GameConfig;
use crate::models::{FeedEntry, FeedSpeed, Tweet, TweetId};
use std::collections::VecDeque;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct FeedScheduler {
    backlog: Vec<Tweet>,
    /// Index of the next backlog tweet; everything before it has been shown
    cursor: usize,
    visible: VecDeque<FeedEntry>,
    capacity: usize,
    refresh_interval_ms: u64,
    insert_cutoff_ms: u64,
    /// Last injected entry that has not settled yet
    in_flight: Option<TweetId>,
    active: bool,
}

impl FeedScheduler {
    pub fn new(config: &GameConfig) -> Self {
        Self {
            backlog: Vec::new(),
            cursor: 0,
            visible: VecDeque::with_capacity(config.feed_capacity()),
            capacity: config.feed_capacity(),
            refresh_interval_ms: config.refresh_interval_ms,
            insert_cutoff_ms: config.insert_cutoff_ms,
            in_flight: None,
            active: false,
        }
    }

    /// Replace the backlog and forget everything shown so far
    pub fn load(&mut self, backlog: Vec<Tweet>) {
        self.backlog = backlog;
        self.cursor = 0;
        self.visible.clear();
        self.in_flight = None;
        self.active = false;
    }

    /// Refresh period for `speed`
    pub fn period(&self, speed: FeedSpeed) -> Duration {
        let ms = (self.refresh_interval_ms as f64 / speed.multiplier()).round() as u64;
        Duration::from_millis(ms.max(1))
    }

    /// (Re)start the schedule; any previous cadence is superseded by the returned period
    pub fn start(&mut self, speed: FeedSpeed) -> Duration {
        self.active = true;
        self.in_flight = None;
        let period = self.period(speed);
        debug!("Feed scheduler started at {:?} ({})", period, speed.as_str());
        period
    }

    /// Safe to call any number of times
    pub fn stop(&mut self) {
        self.active = false;
        self.in_flight = None;
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Inject the next backlog tweet if the feed allows it
    pub fn tick(&mut self, now_ms: u64, time_remaining_ms: u64) -> Option<TweetId> {
        if !self.active || self.in_flight.is_some() || time_remaining_ms < self.insert_cutoff_ms {
            return None;
        }
        let tweet = self.backlog.get(self.cursor)?.clone();
        self.cursor += 1;

        let id = tweet.id.clone();
        self.visible.push_front(FeedEntry::new(tweet, now_ms));
        while self.visible.len() > self.capacity {
            if let Some(dropped) = self.visible.pop_back() {
                debug!("Feed full, dropping {} from view", dropped.id());
            }
        }
        self.in_flight = Some(id.clone());
        Some(id)
    }

    /// Clear the `is_new` flag of `id` and release the in-flight guard it holds
    pub fn settle(&mut self, id: &str) -> bool {
        if self.in_flight.as_deref() == Some(id) {
            self.in_flight = None;
        }
        match self.visible.iter_mut().find(|e| e.id() == id) {
            Some(entry) => {
                entry.is_new = false;
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, id: &str) -> Option<FeedEntry> {
        let pos = self.visible.iter().position(|e| e.id() == id)?;
        self.visible.remove(pos)
    }

    /// Empty the visible feed, keeping the shown history
    pub fn clear_visible(&mut self) {
        self.visible.clear();
    }

    pub fn entry(&self, id: &str) -> Option<&FeedEntry> {
        self.visible.iter().find(|e| e.id() == id)
    }

    /// Visible entries, newest first
    pub fn visible(&self) -> impl Iterator<Item = &FeedEntry> {
        self.visible.iter()
    }

    pub fn visible_len(&self) -> usize {
        self.visible.len()
    }

    /// Every tweet that has appeared in the feed this session
    pub fn shown(&self) -> &[Tweet] {
        &self.backlog[..self.cursor]
    }

    pub fn remaining_backlog(&self) -> usize {
        self.backlog.len() - self.cursor
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn tweets(n: usize) -> Vec<Tweet> {
        (0..n)
            .map(|i| Tweet {
                id: format!("t{}", i),
                author: format!("user{}", i),
                content: format!("tweet number {}", i),
                timestamp: Utc::now(),
                likes: 0,
                shares: 0,
                profile_pic: String::new(),
                media_files: vec![],
                hashtags: String::new(),
                is_disinfo: i % 2 == 0,
            })
            .collect()
    }

    fn scheduler(n: usize) -> FeedScheduler {
        let mut feed = FeedScheduler::new(&GameConfig::default());
        feed.load(tweets(n));
        feed.start(FeedSpeed::Normal);
        feed
    }

    #[test]
    fn test_period_follows_speed() {
        let feed = FeedScheduler::new(&GameConfig::default());
        assert_eq!(feed.period(FeedSpeed::Normal), Duration::from_millis(8_000));
        assert_eq!(feed.period(FeedSpeed::Fast), Duration::from_millis(4_000));
        assert_eq!(feed.period(FeedSpeed::Slow), Duration::from_millis(16_000));
    }

    #[test]
    fn test_in_flight_guard_blocks_until_settled() {
        let mut feed = scheduler(3);
        assert_eq!(feed.tick(0, 60_000), Some("t0".to_string()));
        assert_eq!(feed.tick(100, 60_000), None);
        assert!(feed.settle("t0"));
        assert!(!feed.entry("t0").map(|e| e.is_new).unwrap_or(true));
        assert_eq!(feed.tick(8_000, 52_000), Some("t1".to_string()));
    }

    #[test]
    fn test_no_injection_near_time_up() {
        let mut feed = scheduler(3);
        assert_eq!(feed.tick(55_001, 4_999), None);
        assert_eq!(feed.tick(55_000, 5_000), Some("t0".to_string()));
    }

    #[test]
    fn test_newest_first_and_capped() {
        let mut feed = scheduler(12);
        for i in 0..12 {
            let id = feed.tick(i * 1_000, 60_000).unwrap();
            feed.settle(&id);
        }
        let ids: Vec<&str> = feed.visible().map(|e| e.id()).collect();
        assert_eq!(ids.len(), 10);
        assert_eq!(ids[0], "t11");
        assert_eq!(ids[9], "t2");
        assert_eq!(feed.shown().len(), 12);
        assert_eq!(feed.remaining_backlog(), 0);
        assert_eq!(feed.tick(20_000, 40_000), None);
    }

    #[test]
    fn test_removed_entry_still_releases_guard() {
        let mut feed = scheduler(2);
        feed.tick(0, 60_000);
        assert!(feed.remove("t0").is_some());
        assert!(!feed.settle("t0"));
        assert_eq!(feed.tick(10, 60_000), Some("t1".to_string()));
        assert_eq!(feed.shown().len(), 2);
    }

    #[test]
    fn test_restart_resets_guard_and_stop_is_idempotent() {
        let mut feed = scheduler(3);
        feed.tick(0, 60_000);
        feed.start(FeedSpeed::Fast);
        assert_eq!(feed.tick(10, 60_000), Some("t1".to_string()));

        feed.stop();
        feed.stop();
        assert!(!feed.is_active());
        assert_eq!(feed.tick(20, 60_000), None);
    }
}
