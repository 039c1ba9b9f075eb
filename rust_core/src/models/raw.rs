//! Raw tweet records as served by the backend.
//!
//! The backend streams rows of the tweet CSV with their original column
//! names. Values arrive as strings or numbers depending on the source, so the
//! flexible columns are kept as `serde_json::Value` and normalised here.

use super::Tweet;
use crate::classifier::FallbackClassifier;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

/// Twitter's `created_at` layout, e.g. "Wed Oct 10 20:19:24 +0000 2018"
const TWITTER_DATE_FORMAT: &str = "%a %b %d %H:%M:%S %z %Y";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawTweetRecord {
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(rename = "Tweet_ID", default)]
    pub tweet_id: Option<Value>,
    #[serde(rename = "Username", default)]
    pub username: Option<String>,
    #[serde(rename = "Text", default)]
    pub text: Option<String>,
    #[serde(rename = "Created_At", default)]
    pub created_at: Option<String>,
    #[serde(rename = "Likes", default)]
    pub likes: Option<Value>,
    #[serde(rename = "Retweets", default)]
    pub retweets: Option<Value>,
    #[serde(rename = "Profile_Pic", default)]
    pub profile_pic: Option<String>,
    #[serde(rename = "Media_Files", default)]
    pub media_files: Option<String>,
    #[serde(rename = "Hashtags", default)]
    pub hashtags: Option<String>,
    #[serde(default)]
    pub is_disinfo: Option<Value>,
}

impl RawTweetRecord {
    /// Normalise into a [`Tweet`].
    ///
    /// `index` and `now` are used for the generated id when the record carries
    /// none. Records without an `is_disinfo` label are classified with the
    /// fallback heuristic.
    pub fn into_tweet(self, index: usize, now: DateTime<Utc>) -> Tweet {
        let id = id_from_value(self.id.as_ref())
            .or_else(|| id_from_value(self.tweet_id.as_ref()))
            .unwrap_or_else(|| format!("tweet_{}_{}", index, now.timestamp_millis()));

        let content = self.text.unwrap_or_default();

        let is_disinfo = match label_from_value(self.is_disinfo.as_ref()) {
            Some(label) => label,
            None => {
                let guess = FallbackClassifier::default().looks_like_misinformation(&content);
                debug!("Tweet {} has no label, fallback classifier says {}", id, guess);
                guess
            }
        };

        Tweet {
            author: self
                .username
                .filter(|u| !u.trim().is_empty())
                .unwrap_or_else(|| format!("User{}", index)),
            timestamp: parse_twitter_date(self.created_at.as_deref(), now),
            likes: count_from_value(self.likes.as_ref()),
            shares: count_from_value(self.retweets.as_ref()),
            profile_pic: self.profile_pic.unwrap_or_default(),
            media_files: self
                .media_files
                .map(|m| {
                    m.split('|')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
            hashtags: self.hashtags.unwrap_or_default(),
            id,
            content,
            is_disinfo,
        }
    }
}

fn id_from_value(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// `true` / `"true"` are disinformation, `false` / `"false"` are not, anything else is unlabeled
fn label_from_value(value: Option<&Value>) -> Option<bool> {
    match value? {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "true" | "1" => Some(true),
            "false" | "0" => Some(false),
            _ => None,
        },
        Value::Number(n) => n.as_i64().map(|v| v != 0),
        _ => None,
    }
}

fn count_from_value(value: Option<&Value>) -> u64 {
    match value {
        Some(Value::Number(n)) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
            .unwrap_or(0),
        Some(Value::String(s)) => s.trim().parse::<u64>().unwrap_or(0),
        _ => 0,
    }
}

/// Parse the backend's date column, falling back to `now`
pub fn parse_twitter_date(raw: Option<&str>, now: DateTime<Utc>) -> DateTime<Utc> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return now;
    };

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(dt) = DateTime::parse_from_str(raw, TWITTER_DATE_FORMAT) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return naive.and_utc();
    }

    warn!("Unparsable tweet date '{}', using current time", raw);
    now
}
