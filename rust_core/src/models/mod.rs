// Shared models for the moderation simulator
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

pub mod raw;

pub use raw::RawTweetRecord;

/// Tweet identifier as handed out by the tweet source
pub type TweetId = String;

// ============================================================================
// Tweets & Feed
// ============================================================================

/// A tweet as served by the tweet source. Immutable for the length of a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tweet {
    pub id: TweetId,
    pub author: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub likes: u64,
    pub shares: u64,
    pub profile_pic: String,
    #[serde(default)]
    pub media_files: Vec<String>,
    #[serde(default)]
    pub hashtags: String,
    /// Ground-truth label used for scoring
    pub is_disinfo: bool,
}

/// A tweet that has been revealed in the visible feed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedEntry {
    pub tweet: Tweet,
    /// Display flag, cleared shortly after insertion
    pub is_new: bool,
    /// Session-relative milliseconds at which the entry was injected
    pub appeared_at_ms: u64,
}

impl FeedEntry {
    pub fn new(tweet: Tweet, appeared_at_ms: u64) -> Self {
        Self {
            tweet,
            is_new: true,
            appeared_at_ms,
        }
    }

    pub fn id(&self) -> &str {
        &self.tweet.id
    }

    /// Milliseconds between injection and `now_ms` (never negative)
    pub fn reaction_ms(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.appeared_at_ms)
    }
}

// ============================================================================
// Moderation
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModerationAction {
    Approve,
    Flag,
    #[serde(rename = "factcheck")]
    FactCheck,
}

impl ModerationAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModerationAction::Approve => "approve",
            ModerationAction::Flag => "flag",
            ModerationAction::FactCheck => "factcheck",
        }
    }
}

impl fmt::Display for ModerationAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModerationAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "approve" | "a" => Ok(ModerationAction::Approve),
            "flag" | "f" => Ok(ModerationAction::Flag),
            "factcheck" | "fact-check" | "check" | "c" => Ok(ModerationAction::FactCheck),
            other => Err(format!("unknown moderation action: {}", other)),
        }
    }
}

/// One entry per flag/approve decision
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessedRecord {
    pub tweet_id: TweetId,
    pub was_misinformation: bool,
    pub was_flagged: bool,
}

/// Per-session counters, reset at session start
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub correct_flags: u32,
    pub incorrect_flags: u32,
    pub missed_misinformation: u32,
    pub speed_bonus: i64,
}

// ============================================================================
// Session
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GamePhase {
    Welcome,
    Loading,
    Playing,
    GameOver,
}

impl GamePhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            GamePhase::Welcome => "welcome",
            GamePhase::Loading => "loading",
            GamePhase::Playing => "playing",
            GamePhase::GameOver => "gameover",
        }
    }
}

impl fmt::Display for GamePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// User-selectable feed cadence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedSpeed {
    Slow,
    Normal,
    Fast,
}

impl FeedSpeed {
    /// Multiplier applied to the refresh rate
    pub fn multiplier(&self) -> f64 {
        match self {
            FeedSpeed::Slow => 0.5,
            FeedSpeed::Normal => 1.0,
            FeedSpeed::Fast => 2.0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FeedSpeed::Slow => "slow",
            FeedSpeed::Normal => "normal",
            FeedSpeed::Fast => "fast",
        }
    }
}

impl Default for FeedSpeed {
    fn default() -> Self {
        FeedSpeed::Normal
    }
}

impl FromStr for FeedSpeed {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "slow" | "0.5" => Ok(FeedSpeed::Slow),
            "normal" | "1" | "1.0" => Ok(FeedSpeed::Normal),
            "fast" | "2" | "2.0" => Ok(FeedSpeed::Fast),
            other => Err(format!("unknown feed speed: {}", other)),
        }
    }
}

/// Stats reported once a session reaches gameover
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalGameStats {
    pub score: i64,
    pub base_score: i64,
    pub time_score: i64,
    pub speed_bonus: i64,
    pub messages_handled: u32,
    pub correct_flags: u32,
    pub incorrect_flags: u32,
    pub missed_misinformation: u32,
    /// Tweets that appeared in the feed at any point
    pub total_messages: u32,
    pub selected_hashtag: Option<String>,
}

// ============================================================================
// Fact checks
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactCheckKind {
    FactCheck,
    News,
    None,
}

/// A reviewed claim from the fact check service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimReview {
    pub claim_text: String,
    pub claimant: Option<String>,
    pub publisher: Option<String>,
    pub url: Option<String>,
    pub textual_rating: Option<String>,
}

/// A news article returned by the news fallback
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsArticle {
    pub title: String,
    pub description: Option<String>,
    pub source: Option<String>,
    pub url: String,
    pub published_at: Option<String>,
    pub image_url: Option<String>,
}

/// Evidence attached to a tweet after a fact check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactCheckOutcome {
    pub found: bool,
    pub kind: FactCheckKind,
    #[serde(default)]
    pub claims: Vec<ClaimReview>,
    #[serde(default)]
    pub articles: Vec<NewsArticle>,
    pub message: Option<String>,
}

impl FactCheckOutcome {
    pub fn claims(claims: Vec<ClaimReview>) -> Self {
        Self {
            found: !claims.is_empty(),
            kind: FactCheckKind::FactCheck,
            claims,
            articles: Vec::new(),
            message: None,
        }
    }

    pub fn articles(articles: Vec<NewsArticle>) -> Self {
        Self {
            found: !articles.is_empty(),
            kind: FactCheckKind::News,
            claims: Vec::new(),
            articles,
            message: None,
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            found: false,
            kind: FactCheckKind::None,
            claims: Vec::new(),
            articles: Vec::new(),
            message: Some(message.into()),
        }
    }

    /// The collaborator could not be reached
    pub fn unavailable() -> Self {
        Self::not_found("Fact check service unavailable.")
    }

    /// The player has no fact checks left
    pub fn exhausted() -> Self {
        Self::not_found("You've used all your fact checks! Make your best judgment.")
    }
}

// ============================================================================
// Profile
// ============================================================================

/// Upgrade id -> purchased level
pub type UpgradeState = BTreeMap<String, u32>;

/// Money and upgrade levels stored on the player profile
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Wallet {
    #[serde(default)]
    pub money: i64,
    #[serde(default)]
    pub upgrades: UpgradeState,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub user_id: String,
    pub username: Option<String>,
    pub email: Option<String>,
    #[serde(default)]
    pub money: i64,
    #[serde(default)]
    pub upgrades: UpgradeState,
}

/// Per-game stats sent to the profile store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameStatsUpdate {
    pub score: i64,
    pub correct_flags: u32,
    pub incorrect_flags: u32,
}

impl From<&FinalGameStats> for GameStatsUpdate {
    fn from(stats: &FinalGameStats) -> Self {
        Self {
            score: stats.score,
            correct_flags: stats.correct_flags,
            incorrect_flags: stats.incorrect_flags,
        }
    }
}
