//! Game session state machine.
//!
//! `welcome -> loading -> playing -> gameover -> welcome`, plus
//! `loading -> welcome` when the backlog cannot be loaded.
//!
//! [`GameSession`] owns the clock, the feed scheduler and the scoring engine
//! and only lets them mutate while `playing`. It has no notion of wall time:
//! the caller drives it with ticks and session-relative milliseconds.

use crate::clock::{ClockTick, SessionClock};
use crate::error::SessionError;
use crate::feed::FeedScheduler;
use crate::game_config::GameConfig;
use crate::models::{
    FactCheckOutcome, FeedEntry, FeedSpeed, FinalGameStats, GamePhase, ModerationAction, Tweet,
    TweetId,
};
use crate::scoring::{ScoredAction, ScoringEngine};
use crate::upgrades::UpgradeEffects;
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info};

/// Result of entering `playing`
#[derive(Debug, Clone, PartialEq)]
pub struct SessionStart {
    pub feed_period: Duration,
    /// Tweet injected right away, before the first refresh
    pub first_tweet: Option<TweetId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModerationOutcome {
    pub tweet: Tweet,
    pub action: ModerationAction,
    pub scored: ScoredAction,
}

#[derive(Debug)]
pub struct GameSession {
    config: GameConfig,
    phase: GamePhase,
    hashtag: Option<String>,
    speed: FeedSpeed,
    clock: SessionClock,
    feed: FeedScheduler,
    scoring: ScoringEngine,
    fact_checks: HashMap<TweetId, FactCheckOutcome>,
    final_stats: Option<FinalGameStats>,
}

impl GameSession {
    pub fn new(config: GameConfig) -> Self {
        Self {
            clock: SessionClock::new(&config),
            feed: FeedScheduler::new(&config),
            scoring: ScoringEngine::new(&config, UpgradeEffects::default()),
            config,
            phase: GamePhase::Welcome,
            hashtag: None,
            speed: FeedSpeed::default(),
            fact_checks: HashMap::new(),
            final_stats: None,
        }
    }

    fn require(&self, phase: GamePhase, event: &'static str) -> Result<(), SessionError> {
        if self.phase != phase {
            return Err(SessionError::IllegalTransition {
                from: self.phase,
                event,
            });
        }
        Ok(())
    }

    /// welcome -> loading
    pub fn begin_loading(&mut self, hashtag: Option<String>) -> Result<(), SessionError> {
        self.require(GamePhase::Welcome, "start")?;
        self.hashtag = hashtag.filter(|h| !h.trim().is_empty());
        self.phase = GamePhase::Loading;
        info!(
            "Loading tweets for {}",
            self.hashtag.as_deref().unwrap_or("all hashtags")
        );
        Ok(())
    }

    /// loading -> playing, shuffling the backlog with the thread RNG
    pub fn ready(
        &mut self,
        tweets: Vec<Tweet>,
        effects: UpgradeEffects,
    ) -> Result<SessionStart, SessionError> {
        self.ready_with_rng(tweets, effects, &mut rand::thread_rng())
    }

    pub fn ready_with_rng<R: Rng + ?Sized>(
        &mut self,
        mut tweets: Vec<Tweet>,
        effects: UpgradeEffects,
        rng: &mut R,
    ) -> Result<SessionStart, SessionError> {
        self.require(GamePhase::Loading, "ready")?;
        if tweets.is_empty() {
            self.phase = GamePhase::Welcome;
            return Err(SessionError::EmptyBacklog);
        }
        tweets.shuffle(rng);
        let backlog_len = tweets.len();

        self.scoring = ScoringEngine::new(&self.config, effects);
        self.fact_checks.clear();
        self.final_stats = None;
        self.feed.load(tweets);
        self.clock.start();
        let feed_period = self.feed.start(self.speed);
        self.phase = GamePhase::Playing;

        let first_tweet = self.feed.tick(0, self.clock.time_remaining_ms());
        info!(
            "Session started: {} tweets, {} fact checks, feed every {:?}",
            backlog_len,
            self.scoring.fact_checks_remaining(),
            feed_period
        );
        Ok(SessionStart {
            feed_period,
            first_tweet,
        })
    }

    /// loading -> welcome
    pub fn abort_loading(&mut self) -> Result<(), SessionError> {
        self.require(GamePhase::Loading, "abort loading")?;
        self.phase = GamePhase::Welcome;
        Ok(())
    }

    /// One clock step. Expiry moves the session to gameover.
    pub fn tick_clock(&mut self) -> ClockTick {
        if self.phase != GamePhase::Playing {
            return ClockTick::Idle;
        }
        let tick = self.clock.tick();
        if tick == ClockTick::Expired {
            self.finish();
        }
        tick
    }

    pub fn tick_feed(&mut self, now_ms: u64) -> Option<TweetId> {
        if self.phase != GamePhase::Playing {
            return None;
        }
        self.feed.tick(now_ms, self.clock.time_remaining_ms())
    }

    pub fn tick_time_score(&mut self) -> Option<i64> {
        if self.phase != GamePhase::Playing {
            return None;
        }
        Some(self.scoring.tick_time_score())
    }

    /// Clear the `is_new` flag of a fresh entry
    pub fn settle(&mut self, id: &str) -> bool {
        self.phase == GamePhase::Playing && self.feed.settle(id)
    }

    /// Change the feed speed. Returns the new period when the schedule must restart.
    pub fn set_speed(&mut self, speed: FeedSpeed) -> Option<Duration> {
        self.speed = speed;
        if self.phase != GamePhase::Playing {
            return None;
        }
        Some(self.feed.start(speed))
    }

    /// Apply a player action to a visible tweet. `None` outside `playing` or for unknown ids.
    pub fn moderate(
        &mut self,
        id: &str,
        action: ModerationAction,
        now_ms: u64,
    ) -> Option<ModerationOutcome> {
        if self.phase != GamePhase::Playing {
            return None;
        }

        if action == ModerationAction::FactCheck {
            let entry = self.feed.entry(id)?;
            let tweet = entry.tweet.clone();
            let reaction_ms = entry.reaction_ms(now_ms);
            let scored = self.scoring.record_moderation(&tweet, action, reaction_ms);
            return Some(ModerationOutcome {
                tweet,
                action,
                scored,
            });
        }

        let entry = self.feed.remove(id)?;
        let scored = self
            .scoring
            .record_moderation(&entry.tweet, action, entry.reaction_ms(now_ms));
        debug!("{} {} -> {:?}", action, id, scored);
        Some(ModerationOutcome {
            tweet: entry.tweet,
            action,
            scored,
        })
    }

    /// Attach fact-check evidence. Ignored unless `playing`.
    pub fn record_fact_check(&mut self, id: &str, outcome: FactCheckOutcome) -> bool {
        if self.phase != GamePhase::Playing {
            debug!("Dropping fact check for {} outside of play", id);
            return false;
        }
        self.fact_checks.insert(id.to_string(), outcome);
        true
    }

    /// playing -> gameover
    pub fn expire(&mut self) -> Result<&FinalGameStats, SessionError> {
        self.require(GamePhase::Playing, "expire")?;
        self.clock.stop();
        Ok(self.finish())
    }

    fn finish(&mut self) -> &FinalGameStats {
        self.feed.stop();
        let missed = self.scoring.finalize(self.feed.shown().iter());
        self.feed.clear_visible();
        self.phase = GamePhase::GameOver;

        let breakdown = self.scoring.breakdown();
        let stats = FinalGameStats {
            score: self.scoring.score(),
            base_score: self.scoring.base_score(),
            time_score: self.scoring.time_score(),
            speed_bonus: breakdown.speed_bonus,
            messages_handled: self.scoring.messages_handled(),
            correct_flags: breakdown.correct_flags,
            incorrect_flags: breakdown.incorrect_flags,
            missed_misinformation: missed,
            total_messages: self.feed.shown().len() as u32,
            selected_hashtag: self.hashtag.clone(),
        };
        info!(
            "Session over: score {} ({} base + {} time), {} missed",
            stats.score, stats.base_score, stats.time_score, missed
        );
        self.final_stats.insert(stats)
    }

    /// gameover -> welcome, resetting all per-session state
    pub fn play_again(&mut self) -> Result<(), SessionError> {
        self.require(GamePhase::GameOver, "play again")?;
        let speed = self.speed;
        *self = Self::new(self.config.clone());
        self.speed = speed;
        Ok(())
    }

    pub fn phase(&self) -> GamePhase {
        self.phase
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn hashtag(&self) -> Option<&str> {
        self.hashtag.as_deref()
    }

    pub fn speed(&self) -> FeedSpeed {
        self.speed
    }

    pub fn time_remaining_ms(&self) -> u64 {
        self.clock.time_remaining_ms()
    }

    pub fn scoring(&self) -> &ScoringEngine {
        &self.scoring
    }

    pub fn feed(&self) -> impl Iterator<Item = &FeedEntry> {
        self.feed.visible()
    }

    pub fn fact_check(&self, id: &str) -> Option<&FactCheckOutcome> {
        self.fact_checks.get(id)
    }

    pub fn fact_checks(&self) -> &HashMap<TweetId, FactCheckOutcome> {
        &self.fact_checks
    }

    pub fn final_stats(&self) -> Option<&FinalGameStats> {
        self.final_stats.as_ref()
    }
}
