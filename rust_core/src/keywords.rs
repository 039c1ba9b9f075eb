//! Keyword extraction for fact-check queries.
//!
//! Picks a handful of search terms from a tweet, preferring medical, then
//! scientific, then claim vocabulary over general words.

use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

pub const DEFAULT_MAX_KEYWORDS: usize = 5;

const MAX_MEDICAL: usize = 3;
const MAX_SCIENTIFIC: usize = 2;
const MAX_CLAIM: usize = 2;

const MEDICAL_TERMS: &[&str] = &[
    "mask", "masks", "covid", "vaccine", "vaccines", "doctor", "doctors", "lung", "lungs",
    "oxygen", "damage", "health", "medical", "disease", "death", "deaths", "die", "dying",
    "kill", "killed", "kills", "killing", "virus", "hospital", "breathe", "breathing",
    "bioweapon", "autism",
];

const SCIENTIFIC_TERMS: &[&str] = &[
    "study", "studies", "research", "evidence", "science", "scientific", "data", "report",
    "analysis", "experiment", "trial", "clinical", "proof", "test", "testing", "laboratory",
    "lab", "peer", "review",
];

const CLAIM_TERMS: &[&str] = &[
    "admit", "admits", "admitted", "claim", "claims", "cause", "causes", "caused", "discover",
    "discovered", "announce", "announced", "reveal", "revealed", "prove", "proves", "proven",
    "confirm", "confirmed", "debunk", "debunked", "false", "true", "fake", "real", "hoax", "lie",
    "fact", "facts", "truth", "control", "conspiracy", "government",
];

const STOPWORDS: &[&str] = &[
    "about", "above", "after", "again", "all", "also", "am", "an", "and", "any", "are", "as",
    "at", "be", "been", "before", "being", "below", "between", "both", "but", "by", "can",
    "could", "did", "do", "does", "doing", "down", "during", "each", "few", "for", "from",
    "further", "had", "has", "have", "having", "he", "her", "here", "hers", "herself", "him",
    "himself", "his", "how", "i", "if", "in", "into", "is", "it", "its", "itself", "just", "me",
    "more", "most", "my", "myself", "no", "nor", "not", "now", "of", "off", "on", "once", "only",
    "or", "other", "our", "ours", "ourselves", "out", "over", "own", "same", "she", "should",
    "so", "some", "such", "than", "that", "the", "their", "theirs", "them", "themselves", "then",
    "there", "these", "they", "this", "those", "through", "to", "too", "under", "until", "up",
    "very", "was", "we", "were", "what", "when", "where", "which", "while", "who", "whom", "why",
    "will", "with", "would", "you", "your", "yours", "yourself", "yourselves", "don", "didn",
    "doesn", "isn", "wasn", "aren", "won", "can't", "via", "amp", "rt",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TermClass {
    Medical,
    Scientific,
    Claim,
    Other,
}

fn classify(word: &str) -> TermClass {
    if MEDICAL_TERMS.contains(&word) {
        TermClass::Medical
    } else if SCIENTIFIC_TERMS.contains(&word) {
        TermClass::Scientific
    } else if CLAIM_TERMS.contains(&word) {
        TermClass::Claim
    } else {
        TermClass::Other
    }
}

fn word_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[\p{L}\p{N}_]+").expect("word pattern is valid"))
}

fn hashtag_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"#(\w+)").expect("hashtag pattern is valid"))
}

fn mention_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"@(\w+)").expect("mention pattern is valid"))
}

fn camel_case_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"([a-z])([A-Z])").expect("camel case pattern is valid"))
}

/// Unique lowercase hashtags without the `#`, in order of appearance
pub fn extract_hashtags(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    hashtag_regex()
        .captures_iter(text)
        .map(|c| c[1].to_lowercase())
        .filter(|tag| seen.insert(tag.clone()))
        .collect()
}

/// Lowercase usernames without the `@`
pub fn extract_mentions(text: &str) -> Vec<String> {
    mention_regex()
        .captures_iter(text)
        .map(|c| c[1].to_lowercase())
        .collect()
}

/// Words hidden inside a hashtag: camelCase parts plus any known terms it contains
fn hashtag_words(raw_tag: &str) -> Vec<String> {
    let mut words = vec![raw_tag.to_lowercase()];
    words.extend(
        camel_case_regex()
            .replace_all(raw_tag, "$1 $2")
            .to_lowercase()
            .split(' ')
            .map(str::to_string),
    );

    let mut rest = raw_tag.to_lowercase();
    for term in MEDICAL_TERMS.iter().chain(SCIENTIFIC_TERMS).chain(CLAIM_TERMS) {
        if rest.contains(term) {
            words.push(term.to_string());
            rest = rest.replacen(term, "", 1);
        }
    }
    words
}

/// Up to `max_keywords` unique search terms for `text`
pub fn extract_key_terms(text: &str, max_keywords: usize) -> Vec<String> {
    if text.trim().is_empty() || max_keywords == 0 {
        return Vec::new();
    }
    let lower = text.to_lowercase();
    let mentions = extract_mentions(text);

    let mut tokens: Vec<String> = word_regex()
        .find_iter(&lower)
        .map(|m| m.as_str().to_string())
        .filter(|t| {
            t.chars().count() > 2
                && !STOPWORDS.contains(&t.as_str())
                && !t.chars().all(|c| c.is_ascii_digit())
                && !mentions.contains(t)
        })
        .collect();

    let mut seen_tag_words = HashSet::new();
    let mut raw_tags = HashSet::new();
    for caps in hashtag_regex().captures_iter(text) {
        if !raw_tags.insert(caps[1].to_lowercase()) {
            continue;
        }
        for word in hashtag_words(&caps[1]) {
            if word.chars().count() > 2 && seen_tag_words.insert(word.clone()) {
                tokens.push(word);
            }
        }
    }

    // frequencies, keeping first-seen order for stable tie-breaking
    let mut order: Vec<String> = Vec::new();
    let mut counts: HashMap<String, usize> = HashMap::new();
    for token in tokens {
        let count = counts.entry(token.clone()).or_insert(0);
        if *count == 0 {
            order.push(token);
        }
        *count += 1;
    }

    let top = |class: TermClass, limit: usize| -> Vec<String> {
        let mut words: Vec<&String> = order.iter().filter(|w| classify(w) == class).collect();
        words.sort_by(|a, b| counts[*b].cmp(&counts[*a]));
        words.into_iter().take(limit).cloned().collect()
    };

    let mut result = top(TermClass::Medical, MAX_MEDICAL);
    result.extend(top(TermClass::Scientific, MAX_SCIENTIFIC));
    result.extend(top(TermClass::Claim, MAX_CLAIM));
    if result.len() < max_keywords {
        let room = max_keywords - result.len();
        result.extend(top(TermClass::Other, room));
    }

    let mut unique = HashSet::new();
    result.retain(|w| unique.insert(w.clone()));
    result.truncate(max_keywords);
    result
}
