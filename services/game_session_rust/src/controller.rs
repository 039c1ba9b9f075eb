//! Session controller: one tokio task per player session.
//!
//! The task owns the [`GameSession`] and its [`SessionTimers`] outright.
//! Player commands arrive over an mpsc channel, deferred work (loading, the
//! `is_new` settle delay, fact checks, rewards) runs in spawned tasks that
//! report back over an internal channel, and every change is published as
//! a [`SessionSnapshot`] on a watch channel.

use crate::config::ServiceConfig;
use crate::rewards::RewardLedger;
use crate::timers::{next_tick, SessionTimers};
use crate::types::{SessionCommand, SessionReport, SessionSnapshot};
use anyhow::{anyhow, Result};
use chrono::Utc;
use log::{debug, info, warn};
use modsim_rust_core::clients::{
    AuthTokenProvider, EnvTokenProvider, FactCheckService, FactChecker, HttpProfileStore,
    HttpTweetSource, ProfileStore, StaticTokenProvider, TweetSource,
};
use modsim_rust_core::scoring::ScoredAction;
use modsim_rust_core::upgrades::PurchaseReceipt;
use modsim_rust_core::{
    ClockTick, FactCheckOutcome, FeedSpeed, GameConfig, GamePhase, GameSession, ModerationAction,
    ModerationOutcome, SessionError, Tweet, TweetId, UpgradeEffectResolver, UpgradeEffects,
    Wallet,
};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant};
use uuid::Uuid;

const COMMAND_BUFFER: usize = 64;

/// External services a session talks to
#[derive(Clone)]
pub struct Collaborators {
    pub tweets: Arc<dyn TweetSource>,
    pub fact_checks: Arc<dyn FactCheckService>,
    pub profile: Arc<dyn ProfileStore>,
}

impl Collaborators {
    /// HTTP-backed collaborators for `config`
    pub fn http(config: &ServiceConfig) -> Self {
        let auth: Arc<dyn AuthTokenProvider> = match &config.auth_token {
            Some(token) => Arc::new(StaticTokenProvider::new(token.clone())),
            None => Arc::new(EnvTokenProvider::default()),
        };
        Self {
            tweets: Arc::new(HttpTweetSource::new(
                &config.api_base_url,
                auth.clone(),
                config.circuit_breaker.clone(),
            )),
            fact_checks: Arc::new(FactChecker::from_keys(
                config.fact_check_api_key.clone(),
                config.news_api_key.clone(),
                config.circuit_breaker.clone(),
            )),
            profile: Arc::new(HttpProfileStore::new(
                &config.api_base_url,
                auth,
                config.circuit_breaker.clone(),
            )),
        }
    }
}

/// Results of deferred work, tagged with the session they belong to
enum Internal {
    Loaded {
        session_id: Uuid,
        tweets: Result<Vec<Tweet>>,
        wallet: Option<Wallet>,
    },
    Settle {
        session_id: Uuid,
        tweet_id: TweetId,
    },
    FactChecked {
        session_id: Uuid,
        tweet_id: TweetId,
        outcome: FactCheckOutcome,
    },
    WalletUpdated {
        money: i64,
    },
}

pub struct SessionController {
    session: GameSession,
    session_id: Option<Uuid>,
    timers: SessionTimers,
    started_at: Option<Instant>,
    collaborators: Collaborators,
    rewards: Arc<RewardLedger>,
    resolver: UpgradeEffectResolver,
    money: Option<i64>,
    last_error: Option<String>,
    snapshots: watch::Sender<SessionSnapshot>,
    reports: mpsc::UnboundedSender<SessionReport>,
    internal_tx: mpsc::UnboundedSender<Internal>,
}

impl SessionController {
    /// Spawn the session task and return its handle. Fails on an invalid config.
    pub fn spawn(
        config: GameConfig,
        speed: FeedSpeed,
        collaborators: Collaborators,
    ) -> Result<SessionHandle> {
        config.validate()?;
        let mut session = GameSession::new(config);
        session.set_speed(speed);

        let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
        let (internal_tx, internal_rx) = mpsc::unbounded_channel();
        let (report_tx, report_rx) = mpsc::unbounded_channel();
        let (snapshot_tx, snapshot_rx) =
            watch::channel(SessionSnapshot::capture(&session, None, None, None));

        let controller = Self {
            session,
            session_id: None,
            timers: SessionTimers::idle(),
            started_at: None,
            rewards: Arc::new(RewardLedger::new(collaborators.profile.clone())),
            collaborators,
            resolver: UpgradeEffectResolver::new(),
            money: None,
            last_error: None,
            snapshots: snapshot_tx,
            reports: report_tx,
            internal_tx,
        };
        let task = tokio::spawn(controller.run(command_rx, internal_rx));

        Ok(SessionHandle {
            commands: command_tx,
            snapshots: snapshot_rx,
            reports: report_rx,
            task,
        })
    }

    async fn run(
        mut self,
        mut commands: mpsc::Receiver<SessionCommand>,
        mut internal_rx: mpsc::UnboundedReceiver<Internal>,
    ) {
        info!("Session controller running");
        loop {
            tokio::select! {
                biased;

                _ = next_tick(&mut self.timers.clock) => self.on_clock_tick(),
                _ = next_tick(&mut self.timers.feed) => self.on_feed_tick(),
                _ = next_tick(&mut self.timers.time_score) => self.on_time_score_tick(),

                cmd = commands.recv() => match cmd {
                    Some(cmd) => self.handle_command(cmd),
                    None => {
                        info!("Session handle dropped, shutting down");
                        break;
                    }
                },

                Some(msg) = internal_rx.recv() => self.handle_internal(msg),
            }
        }
        self.timers.stop_all();
    }

    fn now_ms(&self) -> u64 {
        self.started_at
            .map(|t| t.elapsed().as_millis() as u64)
            .unwrap_or(0)
    }

    fn publish(&self) {
        self.snapshots.send_replace(SessionSnapshot::capture(
            &self.session,
            self.session_id,
            self.money,
            self.last_error.clone(),
        ));
    }

    // ------------------------------------------------------------------
    // Timers
    // ------------------------------------------------------------------

    fn on_clock_tick(&mut self) {
        match self.session.tick_clock() {
            ClockTick::Expired => self.finish_session(),
            ClockTick::Running { .. } => self.publish(),
            ClockTick::Idle => {}
        }
    }

    fn on_feed_tick(&mut self) {
        let now_ms = self.now_ms();
        if let Some(tweet_id) = self.session.tick_feed(now_ms) {
            debug!("Injected {} at {}ms", tweet_id, now_ms);
            self.schedule_settle(tweet_id);
            self.publish();
        }
    }

    fn on_time_score_tick(&mut self) {
        if self.session.tick_time_score().is_some() {
            self.publish();
        }
    }

    fn schedule_settle(&self, tweet_id: TweetId) {
        let Some(session_id) = self.session_id else {
            return;
        };
        let delay = self.session.config().new_flag_delay();
        let tx = self.internal_tx.clone();
        tokio::spawn(async move {
            sleep(delay).await;
            let _ = tx.send(Internal::Settle {
                session_id,
                tweet_id,
            });
        });
    }

    fn finish_session(&mut self) {
        self.timers.stop_all();
        self.started_at = None;
        self.publish();

        let (Some(session_id), Some(stats)) = (self.session_id, self.session.final_stats().cloned())
        else {
            return;
        };
        info!(
            "Session {} over: score {}, {} handled, {} missed",
            session_id, stats.score, stats.messages_handled, stats.missed_misinformation
        );

        let report = SessionReport {
            session_id,
            stats,
            finished_at: Utc::now(),
        };
        let _ = self.reports.send(report.clone());

        let rewards = self.rewards.clone();
        let tx = self.internal_tx.clone();
        tokio::spawn(async move {
            match rewards.settle(&report).await {
                Ok(Some(wallet)) => {
                    let _ = tx.send(Internal::WalletUpdated {
                        money: wallet.money,
                    });
                }
                Ok(None) => {}
                Err(e) => warn!("Failed to credit session {}: {:#}", report.session_id, e),
            }
        });
    }

    // ------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------

    fn handle_command(&mut self, cmd: SessionCommand) {
        match cmd {
            SessionCommand::Start { hashtag, reply } => {
                let _ = reply.send(self.start(hashtag));
            }
            SessionCommand::Moderate {
                tweet_id,
                action,
                reply,
            } => {
                let _ = reply.send(self.moderate(&tweet_id, action));
            }
            SessionCommand::SetSpeed { speed } => {
                if let Some(period) = self.session.set_speed(speed) {
                    info!("Feed speed set to {} ({:?})", speed.as_str(), period);
                    self.timers.restart_feed(period);
                }
                self.publish();
            }
            SessionCommand::Purchase { upgrade_id, reply } => self.purchase(upgrade_id, reply),
            SessionCommand::PlayAgain { reply } => {
                let result = self.session.play_again();
                if result.is_ok() {
                    self.session_id = None;
                    self.last_error = None;
                    self.publish();
                }
                let _ = reply.send(result);
            }
        }
    }

    fn start(&mut self, hashtag: Option<String>) -> Result<(), SessionError> {
        self.session.begin_loading(hashtag)?;
        let session_id = Uuid::new_v4();
        self.session_id = Some(session_id);
        self.last_error = None;
        self.publish();

        let hashtag = self.session.hashtag().map(str::to_string);
        let tweets = self.collaborators.tweets.clone();
        let profile = self.collaborators.profile.clone();
        let tx = self.internal_tx.clone();
        tokio::spawn(async move {
            let (tweets, wallet) =
                tokio::join!(tweets.fetch_tweets(hashtag.as_deref()), profile.fetch_wallet());
            let wallet = match wallet {
                Ok(wallet) => Some(wallet),
                Err(e) => {
                    warn!("Could not load upgrades, playing without them: {:#}", e);
                    None
                }
            };
            let _ = tx.send(Internal::Loaded {
                session_id,
                tweets,
                wallet,
            });
        });
        Ok(())
    }

    fn moderate(&mut self, tweet_id: &str, action: ModerationAction) -> Option<ModerationOutcome> {
        let now_ms = self.now_ms();
        let outcome = self.session.moderate(tweet_id, action, now_ms)?;

        if let ScoredAction::FactCheck { consumed, .. } = outcome.scored {
            if consumed {
                self.spawn_fact_check(outcome.tweet.id.clone(), outcome.tweet.content.clone());
            } else {
                self.session
                    .record_fact_check(tweet_id, FactCheckOutcome::exhausted());
            }
        }
        self.publish();
        Some(outcome)
    }

    fn spawn_fact_check(&self, tweet_id: TweetId, claim: String) {
        let Some(session_id) = self.session_id else {
            return;
        };
        let service = self.collaborators.fact_checks.clone();
        let tx = self.internal_tx.clone();
        tokio::spawn(async move {
            let outcome = match service.check_fact(&claim).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!("Fact check for {} failed: {:#}", tweet_id, e);
                    FactCheckOutcome::unavailable()
                }
            };
            let _ = tx.send(Internal::FactChecked {
                session_id,
                tweet_id,
                outcome,
            });
        });
    }

    fn purchase(&self, upgrade_id: String, reply: oneshot::Sender<Result<PurchaseReceipt>>) {
        let rewards = self.rewards.clone();
        let tx = self.internal_tx.clone();
        tokio::spawn(async move {
            let result = rewards.purchase(&upgrade_id).await;
            if let Ok(receipt) = &result {
                let _ = tx.send(Internal::WalletUpdated {
                    money: receipt.money,
                });
            }
            let _ = reply.send(result);
        });
    }

    // ------------------------------------------------------------------
    // Deferred results
    // ------------------------------------------------------------------

    fn is_current(&self, session_id: Uuid) -> bool {
        self.session_id == Some(session_id)
    }

    fn handle_internal(&mut self, msg: Internal) {
        match msg {
            Internal::Loaded {
                session_id,
                tweets,
                wallet,
            } => {
                if self.is_current(session_id) && self.session.phase() == GamePhase::Loading {
                    self.on_loaded(tweets, wallet);
                }
            }
            Internal::Settle {
                session_id,
                tweet_id,
            } => {
                if self.is_current(session_id) && self.session.settle(&tweet_id) {
                    self.publish();
                }
            }
            Internal::FactChecked {
                session_id,
                tweet_id,
                outcome,
            } => {
                if self.is_current(session_id) && self.session.record_fact_check(&tweet_id, outcome)
                {
                    self.publish();
                } else {
                    debug!("Discarding late fact check for {}", tweet_id);
                }
            }
            Internal::WalletUpdated { money } => {
                self.money = Some(money);
                self.publish();
            }
        }
    }

    fn on_loaded(&mut self, tweets: Result<Vec<Tweet>>, wallet: Option<Wallet>) {
        let effects = match &wallet {
            Some(wallet) => self.resolver.resolve(&wallet.upgrades),
            None => UpgradeEffects::default(),
        };
        if let Some(wallet) = &wallet {
            self.money = Some(wallet.money);
        }

        let result = tweets
            .map_err(|e| {
                warn!("Failed to load tweets: {:#}", e);
                format!("Failed to load tweets: {}", e)
            })
            .and_then(|tweets| {
                self.session
                    .ready(tweets, effects)
                    .map_err(|e| e.to_string())
            });

        match result {
            Ok(start) => {
                self.timers.start(self.session.config(), start.feed_period);
                self.started_at = Some(Instant::now());
                if let Some(first) = start.first_tweet {
                    self.schedule_settle(first);
                }
            }
            Err(message) => {
                if self.session.phase() == GamePhase::Loading {
                    let _ = self.session.abort_loading();
                }
                self.session_id = None;
                self.last_error = Some(message);
            }
        }
        self.publish();
    }
}

/// Owner-side handle of a running session task
pub struct SessionHandle {
    commands: mpsc::Sender<SessionCommand>,
    snapshots: watch::Receiver<SessionSnapshot>,
    reports: mpsc::UnboundedReceiver<SessionReport>,
    task: JoinHandle<()>,
}

impl SessionHandle {
    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> SessionCommand,
    ) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(build(tx))
            .await
            .map_err(|_| anyhow!("session controller has stopped"))?;
        rx.await
            .map_err(|_| anyhow!("session controller dropped the request"))
    }

    /// welcome -> loading. Playing begins once the backlog has loaded.
    pub async fn start(&self, hashtag: Option<String>) -> Result<()> {
        self.request(|reply| SessionCommand::Start { hashtag, reply })
            .await??;
        Ok(())
    }

    pub async fn moderate(
        &self,
        tweet_id: &str,
        action: ModerationAction,
    ) -> Result<Option<ModerationOutcome>> {
        let tweet_id = tweet_id.to_string();
        self.request(|reply| SessionCommand::Moderate {
            tweet_id,
            action,
            reply,
        })
        .await
    }

    pub async fn set_speed(&self, speed: FeedSpeed) -> Result<()> {
        self.commands
            .send(SessionCommand::SetSpeed { speed })
            .await
            .map_err(|_| anyhow!("session controller has stopped"))
    }

    pub async fn purchase(&self, upgrade_id: &str) -> Result<PurchaseReceipt> {
        let upgrade_id = upgrade_id.to_string();
        self.request(|reply| SessionCommand::Purchase { upgrade_id, reply })
            .await?
    }

    /// gameover -> welcome
    pub async fn play_again(&self) -> Result<()> {
        self.request(|reply| SessionCommand::PlayAgain { reply })
            .await??;
        Ok(())
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshots.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshots.clone()
    }

    /// Wait until the session reaches `phase`
    pub async fn wait_for_phase(&mut self, phase: GamePhase) -> Result<SessionSnapshot> {
        let snapshot = self
            .snapshots
            .wait_for(|s| s.phase == phase)
            .await
            .map_err(|_| anyhow!("session controller stopped before reaching {}", phase))?;
        Ok(snapshot.clone())
    }

    /// Next finished-session report; `None` once the controller has stopped
    pub async fn next_report(&mut self) -> Option<SessionReport> {
        self.reports.recv().await
    }

    /// Stop the session task and every timer it owns. Safe to call repeatedly.
    pub fn stop(&self) {
        self.task.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}
