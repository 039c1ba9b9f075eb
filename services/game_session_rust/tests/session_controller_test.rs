//! Session controller tests
//!
//! Run on a paused tokio clock with in-memory collaborators, so a full
//! 25-second session completes instantly.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::Utc;
use game_session_rust::{Collaborators, SessionController, SessionHandle};
use modsim_rust_core::clients::{FactCheckService, ProfileStore, TweetSource};
use modsim_rust_core::{
    FactCheckOutcome, FeedSpeed, GameConfig, GamePhase, GameStatsUpdate, ModerationAction,
    ScoredAction, Tweet, UpgradeState, UserProfile, Wallet,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

// ============================================================================
// Fakes
// ============================================================================

struct FakeTweetSource {
    tweets: Result<Vec<Tweet>, String>,
}

impl FakeTweetSource {
    fn with(count: usize, is_disinfo: bool) -> Self {
        let tweets = (0..count)
            .map(|i| Tweet {
                id: format!("t{}", i),
                author: format!("user{}", i),
                content: format!("Vaccine claim number {}", i),
                timestamp: Utc::now(),
                likes: 0,
                shares: 0,
                profile_pic: String::new(),
                media_files: Vec::new(),
                hashtags: "#covid".to_string(),
                is_disinfo,
            })
            .collect();
        Self { tweets: Ok(tweets) }
    }

    fn failing(message: &str) -> Self {
        Self {
            tweets: Err(message.to_string()),
        }
    }
}

#[async_trait]
impl TweetSource for FakeTweetSource {
    async fn fetch_tweets(&self, _hashtag: Option<&str>) -> Result<Vec<Tweet>> {
        self.tweets.clone().map_err(|e| anyhow!(e))
    }
}

struct FakeFactChecker {
    delay: Duration,
    calls: AtomicUsize,
}

impl FakeFactChecker {
    fn new(delay: Duration) -> Self {
        Self {
            delay,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl FactCheckService for FakeFactChecker {
    async fn check_fact(&self, _claim: &str) -> Result<FactCheckOutcome> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        Ok(FactCheckOutcome::not_found("No fact-checks found for this claim."))
    }
}

#[derive(Default)]
struct FakeProfileStore {
    wallet: Mutex<Wallet>,
    stats: Mutex<Vec<GameStatsUpdate>>,
    fetch_delay: Duration,
}

impl FakeProfileStore {
    fn with_money(money: i64) -> Self {
        let store = Self::default();
        store.wallet.lock().money = money;
        store
    }

    fn slow(money: i64, fetch_delay: Duration) -> Self {
        Self {
            fetch_delay,
            ..Self::with_money(money)
        }
    }
}

#[async_trait]
impl ProfileStore for FakeProfileStore {
    async fn fetch_wallet(&self) -> Result<Wallet> {
        if !self.fetch_delay.is_zero() {
            tokio::time::sleep(self.fetch_delay).await;
        }
        Ok(self.wallet.lock().clone())
    }

    async fn update_user_upgrades(&self, money: i64, upgrades: &UpgradeState) -> Result<UserProfile> {
        let mut wallet = self.wallet.lock();
        wallet.money = money;
        wallet.upgrades = upgrades.clone();
        Ok(UserProfile {
            user_id: "player".to_string(),
            username: Some("player".to_string()),
            email: None,
            money,
            upgrades: upgrades.clone(),
        })
    }

    async fn update_user_stats(&self, stats: &GameStatsUpdate) -> Result<()> {
        self.stats.lock().push(*stats);
        Ok(())
    }
}

struct Harness {
    handle: SessionHandle,
    fact_checker: Arc<FakeFactChecker>,
    store: Arc<FakeProfileStore>,
}

fn spawn(config: GameConfig, tweets: FakeTweetSource, fact_check_delay: Duration) -> Harness {
    spawn_with_store(config, tweets, fact_check_delay, FakeProfileStore::default())
}

fn spawn_with_store(
    config: GameConfig,
    tweets: FakeTweetSource,
    fact_check_delay: Duration,
    store: FakeProfileStore,
) -> Harness {
    let fact_checker = Arc::new(FakeFactChecker::new(fact_check_delay));
    let store = Arc::new(store);
    let collaborators = Collaborators {
        tweets: Arc::new(tweets),
        fact_checks: fact_checker.clone(),
        profile: store.clone(),
    };
    Harness {
        handle: SessionController::spawn(config, FeedSpeed::Normal, collaborators).unwrap(),
        fact_checker,
        store,
    }
}

fn short_config(game_duration_ms: u64) -> GameConfig {
    GameConfig {
        game_duration_ms,
        ..GameConfig::default()
    }
}

// ============================================================================
// Timers and scoring
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_time_score_accumulates_until_expiry() {
    let config = GameConfig {
        game_duration_ms: 25_000,
        time_score_interval_ms: 2_000,
        time_score_amount: 5,
        ..GameConfig::default()
    };
    let mut h = spawn(config, FakeTweetSource::with(20, false), Duration::ZERO);

    h.handle.start(None).await.unwrap();
    h.handle.wait_for_phase(GamePhase::Playing).await.unwrap();
    let report = h.handle.next_report().await.unwrap();

    assert_eq!(report.stats.time_score, 60);
    assert_eq!(report.stats.base_score, 0);
    assert_eq!(report.stats.score, 60);

    let snapshot = h.handle.snapshot();
    assert_eq!(snapshot.phase, GamePhase::GameOver);
    assert_eq!(snapshot.time_remaining_ms, 0);
    assert!(snapshot.feed.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_no_injection_inside_cutoff() {
    // Feed ticks at 2.5s, 5s, 7.5s and 10s; the last one has 2s left
    let config = GameConfig {
        game_duration_ms: 12_000,
        refresh_interval_ms: 2_500,
        insert_cutoff_ms: 5_000,
        ..GameConfig::default()
    };
    let mut h = spawn(config, FakeTweetSource::with(20, false), Duration::ZERO);

    h.handle.start(None).await.unwrap();
    let report = h.handle.next_report().await.unwrap();

    assert_eq!(report.stats.total_messages, 4);
    assert_eq!(report.stats.missed_misinformation, 0);
}

#[tokio::test(start_paused = true)]
async fn test_new_flag_clears_after_delay() {
    let mut h = spawn(short_config(30_000), FakeTweetSource::with(5, false), Duration::ZERO);

    h.handle.start(None).await.unwrap();
    let snapshot = h.handle.wait_for_phase(GamePhase::Playing).await.unwrap();
    assert_eq!(snapshot.feed.len(), 1);
    assert!(snapshot.feed[0].is_new);

    tokio::time::sleep(Duration::from_millis(700)).await;
    let snapshot = h.handle.snapshot();
    assert!(!snapshot.feed[0].is_new);
}

#[tokio::test(start_paused = true)]
async fn test_correct_flag_scores_base_plus_time() {
    let mut h = spawn(short_config(10_000), FakeTweetSource::with(5, true), Duration::ZERO);

    h.handle.start(None).await.unwrap();
    let snapshot = h.handle.wait_for_phase(GamePhase::Playing).await.unwrap();
    let id = snapshot.feed[0].tweet.id.clone();

    let outcome = h
        .handle
        .moderate(&id, ModerationAction::Flag)
        .await
        .unwrap()
        .unwrap();
    match outcome.scored {
        ScoredAction::Moderated {
            correct,
            points,
            speed_bonus,
        } => {
            assert!(correct);
            assert!(speed_bonus > 0);
            assert_eq!(points, 10 + speed_bonus);
        }
        other => panic!("unexpected outcome {:?}", other),
    }

    // Flagging the same tweet again is a no-op
    assert!(h
        .handle
        .moderate(&id, ModerationAction::Flag)
        .await
        .unwrap()
        .is_none());

    let report = h.handle.next_report().await.unwrap();
    let stats = report.stats;
    assert_eq!(stats.correct_flags, 1);
    assert_eq!(stats.messages_handled, 1);
    assert_eq!(stats.score, stats.base_score + stats.time_score);
    assert_eq!(stats.base_score, 10 + stats.speed_bonus);
}

#[tokio::test(start_paused = true)]
async fn test_speed_change_while_playing() {
    let mut h = spawn(short_config(19_500), FakeTweetSource::with(20, false), Duration::ZERO);

    h.handle.start(None).await.unwrap();
    h.handle.wait_for_phase(GamePhase::Playing).await.unwrap();
    h.handle.set_speed(FeedSpeed::Fast).await.unwrap();

    let report = h.handle.next_report().await.unwrap();
    // First tweet, then every 4s while at least 5s remain: 4s, 8s, 12s
    assert_eq!(report.stats.total_messages, 4);
    assert_eq!(h.handle.snapshot().speed, FeedSpeed::Fast);
}

// ============================================================================
// Fact checks
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_late_fact_check_ignored_after_gameover() {
    let mut h = spawn(short_config(5_000), FakeTweetSource::with(5, true), Duration::from_secs(10));

    h.handle.start(None).await.unwrap();
    let snapshot = h.handle.wait_for_phase(GamePhase::Playing).await.unwrap();
    let id = snapshot.feed[0].tweet.id.clone();

    let outcome = h
        .handle
        .moderate(&id, ModerationAction::FactCheck)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        outcome.scored,
        ScoredAction::FactCheck {
            consumed: true,
            remaining: 4
        }
    );

    h.handle.next_report().await.unwrap();
    tokio::time::sleep(Duration::from_secs(20)).await;

    let snapshot = h.handle.snapshot();
    assert_eq!(snapshot.phase, GamePhase::GameOver);
    assert!(snapshot.fact_checks.is_empty());
    assert_eq!(h.fact_checker.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_fact_checks_never_go_negative() {
    let config = GameConfig {
        base_fact_checks: 1,
        ..short_config(30_000)
    };
    let mut h = spawn(config, FakeTweetSource::with(5, false), Duration::ZERO);

    h.handle.start(None).await.unwrap();
    let snapshot = h.handle.wait_for_phase(GamePhase::Playing).await.unwrap();
    let id = snapshot.feed[0].tweet.id.clone();

    h.handle.moderate(&id, ModerationAction::FactCheck).await.unwrap();
    let mut rx = h.handle.subscribe();
    rx.wait_for(|s| s.fact_checks.contains_key(&id)).await.unwrap();

    let second = h
        .handle
        .moderate(&id, ModerationAction::FactCheck)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        second.scored,
        ScoredAction::FactCheck {
            consumed: false,
            remaining: 0
        }
    );

    let snapshot = h.handle.snapshot();
    assert_eq!(snapshot.fact_checks_remaining, 0);
    assert_eq!(snapshot.fact_checks[&id], FactCheckOutcome::exhausted());
    // Fact-checked tweets stay in the feed
    assert!(snapshot.entry(&id).is_some());
    assert_eq!(h.fact_checker.calls.load(Ordering::SeqCst), 1);
}

// ============================================================================
// Lifecycle
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_stop_halts_timers() {
    let mut h = spawn(short_config(30_000), FakeTweetSource::with(5, false), Duration::ZERO);

    h.handle.start(None).await.unwrap();
    h.handle.wait_for_phase(GamePhase::Playing).await.unwrap();
    tokio::time::sleep(Duration::from_millis(3_500)).await;

    h.handle.stop();
    h.handle.stop();
    let frozen = h.handle.snapshot();
    tokio::time::sleep(Duration::from_secs(60)).await;

    assert!(h.handle.is_finished());
    let snapshot = h.handle.snapshot();
    assert_eq!(snapshot.phase, GamePhase::Playing);
    assert_eq!(snapshot.time_remaining_ms, frozen.time_remaining_ms);
    assert_eq!(snapshot.time_score, frozen.time_score);
    assert!(h.handle.next_report().await.is_none());
    assert!(h.handle.start(None).await.is_err());
}

#[tokio::test(start_paused = true)]
async fn test_load_failure_returns_to_welcome() {
    let mut h = spawn(
        short_config(30_000),
        FakeTweetSource::failing("You must be logged in to access the moderation panel"),
        Duration::ZERO,
    );

    h.handle.start(Some("#covid".to_string())).await.unwrap();

    let snapshot = h.handle.wait_for_phase(GamePhase::Welcome).await.unwrap();
    let error = snapshot.last_error.unwrap();
    assert!(error.contains("logged in"), "{}", error);

    // A new attempt is allowed from welcome
    h.handle.start(None).await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_empty_backlog_returns_to_welcome() {
    let mut h = spawn(short_config(30_000), FakeTweetSource::with(0, false), Duration::ZERO);

    h.handle.start(None).await.unwrap();
    let snapshot = h.handle.wait_for_phase(GamePhase::Welcome).await.unwrap();
    assert!(snapshot.last_error.is_some());
    assert!(snapshot.session_id.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_illegal_commands_rejected() {
    let mut h = spawn(short_config(5_000), FakeTweetSource::with(5, false), Duration::ZERO);

    assert!(h.handle.play_again().await.is_err());
    h.handle.start(None).await.unwrap();
    assert!(h.handle.start(None).await.is_err());

    h.handle.next_report().await.unwrap();
    h.handle.play_again().await.unwrap();
    let snapshot = h.handle.snapshot();
    assert_eq!(snapshot.phase, GamePhase::Welcome);
    assert_eq!(snapshot.score, 0);
    assert!(snapshot.final_stats.is_none());
}

// ============================================================================
// Rewards and shop
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_rewards_credited_once() {
    let mut h = spawn_with_store(
        short_config(10_000),
        FakeTweetSource::with(5, false),
        Duration::ZERO,
        FakeProfileStore::with_money(100),
    );

    h.handle.start(None).await.unwrap();
    let report = h.handle.next_report().await.unwrap();
    let expected = 100 + report.stats.score;

    let mut rx = h.handle.subscribe();
    rx.wait_for(|s| s.money == Some(expected)).await.unwrap();
    tokio::time::sleep(Duration::from_secs(5)).await;

    assert_eq!(h.store.wallet.lock().money, expected);
    assert_eq!(h.store.stats.lock().len(), 1);
    assert_eq!(h.store.stats.lock()[0].score, report.stats.score);
}

#[tokio::test(start_paused = true)]
async fn test_purchase_applies_to_next_session() {
    let mut h = spawn_with_store(
        short_config(10_000),
        FakeTweetSource::with(5, false),
        Duration::ZERO,
        FakeProfileStore::with_money(1_000),
    );

    let receipt = h.handle.purchase("fact_checker").await.unwrap();
    assert_eq!(receipt.new_level, 1);
    assert_eq!(receipt.money, 900);
    assert_eq!(h.store.wallet.lock().upgrades.get("fact_checker"), Some(&1));

    h.handle.start(None).await.unwrap();
    let snapshot = h.handle.wait_for_phase(GamePhase::Playing).await.unwrap();
    assert_eq!(snapshot.fact_checks_remaining, 7);
    assert_eq!(snapshot.money, Some(900));
}

#[tokio::test(start_paused = true)]
async fn test_purchase_rejects_unaffordable_upgrade() {
    let h = spawn_with_store(
        short_config(10_000),
        FakeTweetSource::with(5, false),
        Duration::ZERO,
        FakeProfileStore::with_money(50),
    );

    let err = h.handle.purchase("fact_checker").await.unwrap_err();
    assert!(err.to_string().contains("costs 100"), "{}", err);
    assert!(h.handle.purchase("gold_plating").await.is_err());
    assert_eq!(h.store.wallet.lock().money, 50);
}

#[tokio::test(start_paused = true)]
async fn test_purchase_during_settlement_keeps_reward() {
    let mut h = spawn_with_store(
        short_config(10_000),
        FakeTweetSource::with(5, false),
        Duration::ZERO,
        FakeProfileStore::slow(1_000, Duration::from_millis(500)),
    );

    h.handle.start(None).await.unwrap();
    let report = h.handle.next_report().await.unwrap();
    assert!(report.stats.score > 0);

    let receipt = h.handle.purchase("fact_checker").await.unwrap();
    assert_eq!(receipt.price, 100);
    tokio::time::sleep(Duration::from_secs(5)).await;

    let wallet = h.store.wallet.lock().clone();
    assert_eq!(wallet.money, 1_000 + report.stats.score - 100);
    assert_eq!(wallet.upgrades.get("fact_checker"), Some(&1));
}

// ============================================================================
// Config
// ============================================================================

#[tokio::test]
async fn test_spawn_rejects_zero_periods() {
    let collaborators = Collaborators {
        tweets: Arc::new(FakeTweetSource::with(1, false)),
        fact_checks: Arc::new(FakeFactChecker::new(Duration::ZERO)),
        profile: Arc::new(FakeProfileStore::default()),
    };

    let zero_clock = GameConfig {
        clock_step_ms: 0,
        ..GameConfig::default()
    };
    let err = SessionController::spawn(zero_clock, FeedSpeed::Normal, collaborators.clone())
        .err()
        .unwrap();
    assert!(err.to_string().contains("clock_step_ms"), "{}", err);

    let zero_time_score = GameConfig {
        time_score_interval_ms: 0,
        ..GameConfig::default()
    };
    assert!(SessionController::spawn(zero_time_score, FeedSpeed::Normal, collaborators).is_err());
}
