use chrono::{DateTime, Utc};
use modsim_rust_core::upgrades::PurchaseReceipt;
use modsim_rust_core::{
    FactCheckOutcome, FeedEntry, FeedSpeed, FinalGameStats, GamePhase, GameSession,
    ModerationAction, ModerationOutcome, ScoreBreakdown, SessionError, TweetId,
};
use serde::Serialize;
use std::collections::HashMap;
use tokio::sync::oneshot;
use uuid::Uuid;

/// Player command sent to the session task
#[derive(Debug)]
pub enum SessionCommand {
    Start {
        hashtag: Option<String>,
        reply: oneshot::Sender<Result<(), SessionError>>,
    },
    Moderate {
        tweet_id: TweetId,
        action: ModerationAction,
        reply: oneshot::Sender<Option<ModerationOutcome>>,
    },
    SetSpeed {
        speed: FeedSpeed,
    },
    Purchase {
        upgrade_id: String,
        reply: oneshot::Sender<anyhow::Result<PurchaseReceipt>>,
    },
    PlayAgain {
        reply: oneshot::Sender<Result<(), SessionError>>,
    },
}

/// Read-only view of the session, published after every change
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub session_id: Option<Uuid>,
    pub phase: GamePhase,
    pub hashtag: Option<String>,
    pub speed: FeedSpeed,
    pub time_remaining_ms: u64,
    pub score: i64,
    pub base_score: i64,
    pub time_score: i64,
    pub breakdown: ScoreBreakdown,
    pub fact_checks_remaining: u32,
    /// Visible feed, newest first
    pub feed: Vec<FeedEntry>,
    pub fact_checks: HashMap<TweetId, FactCheckOutcome>,
    pub final_stats: Option<FinalGameStats>,
    pub money: Option<i64>,
    pub last_error: Option<String>,
}

impl SessionSnapshot {
    pub fn capture(
        session: &GameSession,
        session_id: Option<Uuid>,
        money: Option<i64>,
        last_error: Option<String>,
    ) -> Self {
        let scoring = session.scoring();
        Self {
            session_id,
            phase: session.phase(),
            hashtag: session.hashtag().map(str::to_string),
            speed: session.speed(),
            time_remaining_ms: session.time_remaining_ms(),
            score: scoring.score(),
            base_score: scoring.base_score(),
            time_score: scoring.time_score(),
            breakdown: scoring.breakdown(),
            fact_checks_remaining: scoring.fact_checks_remaining(),
            feed: session.feed().cloned().collect(),
            fact_checks: session.fact_checks().clone(),
            final_stats: session.final_stats().cloned(),
            money,
            last_error,
        }
    }

    pub fn entry(&self, tweet_id: &str) -> Option<&FeedEntry> {
        self.feed.iter().find(|e| e.id() == tweet_id)
    }
}

/// Emitted once per session when it reaches gameover
#[derive(Debug, Clone, Serialize)]
pub struct SessionReport {
    pub session_id: Uuid,
    pub stats: FinalGameStats,
    pub finished_at: DateTime<Utc>,
}
