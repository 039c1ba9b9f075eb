//! Scoring engine.
//!
//! All score numbers of a session are produced here. The total score is
//! never stored: it is always `base_score + time_score`, with moderation
//! points and speed bonuses folded into the base score.

use crate::game_config::GameConfig;
use crate::models::{ModerationAction, ProcessedRecord, ScoreBreakdown, Tweet};
use crate::upgrades::UpgradeEffects;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;

/// Points for a correct approve or flag
pub const CORRECT_POINTS: i64 = 10;
/// Penalty for a mistake before upgrade reduction
pub const MISTAKE_PENALTY: i64 = 5;
/// Speed bonus at zero reaction time
pub const MAX_SPEED_BONUS: i64 = 60;
/// Reaction time at which the speed bonus reaches zero
pub const SPEED_BONUS_WINDOW_MS: u64 = 10_000;

/// Linear decay from 60 points at 0 ms to 0 at the window, scaled and clamped to [0, 60]
pub fn speed_bonus(reaction_ms: u64, speed_multiplier: f64) -> i64 {
    let t = reaction_ms.min(SPEED_BONUS_WINDOW_MS) as f64;
    let max = MAX_SPEED_BONUS as f64;
    let raw = (max - max * t / SPEED_BONUS_WINDOW_MS as f64) * speed_multiplier;
    (raw.round() as i64).clamp(0, MAX_SPEED_BONUS)
}

/// Points lost for a mistake given the remaining-penalty fraction
pub fn mistake_penalty(mistake_penalty_reduction: f64) -> i64 {
    (MISTAKE_PENALTY as f64 * mistake_penalty_reduction).round() as i64
}

/// Misinformation tweets that were shown but never flagged
pub fn count_missed_misinformation<'a>(
    shown: impl IntoIterator<Item = &'a Tweet>,
    processed: &[ProcessedRecord],
) -> u32 {
    let flagged: HashSet<&str> = processed
        .iter()
        .filter(|r| r.was_flagged)
        .map(|r| r.tweet_id.as_str())
        .collect();

    shown
        .into_iter()
        .filter(|t| t.is_disinfo && !flagged.contains(t.id.as_str()))
        .count() as u32
}

/// Outcome of a single moderation action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScoredAction {
    Moderated {
        correct: bool,
        /// Change applied to the base score, speed bonus included
        points: i64,
        speed_bonus: i64,
    },
    FactCheck {
        consumed: bool,
        remaining: u32,
    },
}

#[derive(Debug, Clone)]
pub struct ScoringEngine {
    base_score: i64,
    time_score: i64,
    messages_handled: u32,
    breakdown: ScoreBreakdown,
    processed: Vec<ProcessedRecord>,
    fact_checks_remaining: u32,
    effects: UpgradeEffects,
    /// Captured at session start, not re-read per tick
    time_increment: i64,
}

impl ScoringEngine {
    pub fn new(config: &GameConfig, effects: UpgradeEffects) -> Self {
        let time_increment =
            (config.time_score_amount as f64 * (1.0 + effects.time_score_bonus())).round() as i64;
        Self {
            base_score: 0,
            time_score: 0,
            messages_handled: 0,
            breakdown: ScoreBreakdown::default(),
            processed: Vec::new(),
            fact_checks_remaining: config.base_fact_checks + effects.fact_checks_bonus(),
            effects,
            time_increment,
        }
    }

    pub fn score(&self) -> i64 {
        self.base_score + self.time_score
    }

    pub fn base_score(&self) -> i64 {
        self.base_score
    }

    pub fn time_score(&self) -> i64 {
        self.time_score
    }

    pub fn breakdown(&self) -> ScoreBreakdown {
        self.breakdown
    }

    pub fn processed(&self) -> &[ProcessedRecord] {
        &self.processed
    }

    pub fn messages_handled(&self) -> u32 {
        self.messages_handled
    }

    pub fn fact_checks_remaining(&self) -> u32 {
        self.fact_checks_remaining
    }

    pub fn effects(&self) -> &UpgradeEffects {
        &self.effects
    }

    /// Apply an action on `tweet`, `reaction_ms` after it appeared
    pub fn record_moderation(
        &mut self,
        tweet: &Tweet,
        action: ModerationAction,
        reaction_ms: u64,
    ) -> ScoredAction {
        let correct = match action {
            ModerationAction::FactCheck => return self.consume_fact_check(),
            ModerationAction::Approve => !tweet.is_disinfo,
            ModerationAction::Flag => tweet.is_disinfo,
        };

        self.processed.push(ProcessedRecord {
            tweet_id: tweet.id.clone(),
            was_misinformation: tweet.is_disinfo,
            was_flagged: action == ModerationAction::Flag,
        });
        self.messages_handled += 1;

        if !correct {
            let penalty = mistake_penalty(self.effects.mistake_penalty_reduction());
            self.base_score -= penalty;
            self.breakdown.incorrect_flags += 1;
            debug!("{} on {} was wrong: -{}", action, tweet.id, penalty);
            return ScoredAction::Moderated {
                correct: false,
                points: -penalty,
                speed_bonus: 0,
            };
        }

        let bonus = if action == ModerationAction::Flag {
            speed_bonus(reaction_ms, self.effects.speed_multiplier())
        } else {
            0
        };
        let points = CORRECT_POINTS + bonus;
        self.base_score += points;
        self.breakdown.correct_flags += 1;
        self.breakdown.speed_bonus += bonus;
        debug!(
            "{} on {} was correct: +{} (speed bonus {} after {}ms)",
            action, tweet.id, points, bonus, reaction_ms
        );

        ScoredAction::Moderated {
            correct: true,
            points,
            speed_bonus: bonus,
        }
    }

    fn consume_fact_check(&mut self) -> ScoredAction {
        let consumed = self.fact_checks_remaining > 0;
        if consumed {
            self.fact_checks_remaining -= 1;
        }
        ScoredAction::FactCheck {
            consumed,
            remaining: self.fact_checks_remaining,
        }
    }

    /// Passive time score increment; returns the new time score
    pub fn tick_time_score(&mut self) -> i64 {
        self.time_score += self.time_increment;
        self.time_score
    }

    /// Count missed misinformation among `shown`. Reported only, the score is unchanged.
    pub fn finalize<'a>(&mut self, shown: impl IntoIterator<Item = &'a Tweet>) -> u32 {
        let missed = count_missed_misinformation(shown, &self.processed);
        self.breakdown.missed_misinformation = missed;
        missed
    }
}
