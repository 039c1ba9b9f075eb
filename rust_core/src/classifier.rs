//! Fallback misinformation heuristics.
//!
//! The `is_disinfo` label on a tweet is the only input to scoring. The
//! heuristics here exist for two narrow cases:
//! - records that arrive without a label ([`FallbackClassifier`])
//! - interpreting the textual rating of a fact-check review
//!   ([`rating_indicates_misinformation`])
//!
//! Neither is ever consulted when a label is present.

/// Topic -> trigger phrases commonly seen in misinformation posts
const TOPIC_KEYWORDS: &[(&str, &[&str])] = &[
    ("vaccines", &["vaccines", "autism", "vaccination", "immunization"]),
    ("climate", &["climate change", "global warming", "hoax"]),
    ("covid", &["covid", "coronavirus", "5g", "microchip"]),
    ("politics", &["election fraud", "stolen election", "voter fraud"]),
    ("health", &["cure cancer", "miracle cure", "weight loss", "belly fat"]),
    (
        "conspiracy",
        &["moon landing", "flat earth", "chemtrails", "government conspiracy"],
    ),
];

/// Rating fragments that mark a reviewed claim as misinformation
const MISINFO_RATINGS: &[&str] = &[
    "false",
    "pants on fire",
    "fake",
    "incorrect",
    "misleading",
    "mostly false",
    "untrue",
    "not true",
    "fiction",
    "deceptive",
    "misinformation",
    "hoax",
];

/// Keyword-based classifier for unlabeled tweets. Fallback only.
#[derive(Debug, Clone)]
pub struct FallbackClassifier {
    topics: &'static [(&'static str, &'static [&'static str])],
}

impl Default for FallbackClassifier {
    fn default() -> Self {
        Self {
            topics: TOPIC_KEYWORDS,
        }
    }
}

impl FallbackClassifier {
    /// First `(topic, phrase)` found in the content, in table order
    pub fn matched_topic(&self, content: &str) -> Option<(&'static str, &'static str)> {
        let lower = content.to_lowercase();
        self.topics.iter().find_map(|(topic, phrases)| {
            phrases
                .iter()
                .find(|phrase| lower.contains(*phrase))
                .map(|phrase| (*topic, *phrase))
        })
    }

    pub fn looks_like_misinformation(&self, content: &str) -> bool {
        self.matched_topic(content).is_some()
    }
}

/// Whether a fact-check textual rating says the claim is misinformation
pub fn rating_indicates_misinformation(textual_rating: &str) -> bool {
    let rating = textual_rating.to_lowercase();
    MISINFO_RATINGS.iter().any(|term| rating.contains(term))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matched_topic() {
        let classifier = FallbackClassifier::default();
        assert_eq!(
            classifier.matched_topic("New study: Vaccines linked to AUTISM"),
            Some(("vaccines", "vaccines"))
        );
        assert_eq!(
            classifier.matched_topic("The moon landing was staged"),
            Some(("conspiracy", "moon landing"))
        );
        assert_eq!(classifier.matched_topic("Great game last night"), None);
    }

    #[test]
    fn test_rating_terms() {
        assert!(rating_indicates_misinformation("Pants on Fire!"));
        assert!(rating_indicates_misinformation("Mostly False"));
        assert!(rating_indicates_misinformation("Misleading"));
        assert!(!rating_indicates_misinformation("True"));
        assert!(!rating_indicates_misinformation("Correct attribution"));
    }
}
