//! In-process duplicate detection for extracted events.
//!
//! Two layers:
//!   1. Exact key: normalized title + date + normalized location, a set
//!      membership test.
//!   2. Fuzzy: Jaccard similarity over stemmed title tokens against every
//!      previously seen event with a compatible date.
//!
//! The history lives for the process lifetime only; durable cross-run dedup
//! is the storage layer's fingerprint uniqueness. This layer additionally
//! catches near-duplicates (same event, reworded title) that fingerprinting
//! misses.

use std::collections::HashSet;

use regex::Regex;
use tracing::debug;

use crate::types::event::EventCandidate;

/// Jaccard similarity at or above this counts as a duplicate.
pub const SIMILARITY_THRESHOLD: f64 = 0.6;

/// Tokens are truncated to this many characters to absorb inflection.
const STEM_LEN: usize = 5;

struct SeenEvent {
    title: String,
    date: Option<String>,
    tokens: HashSet<String>,
}

/// Streaming two-layer duplicate detector.
///
/// [`EventDedup::is_duplicate`] is a mutating check-and-register: call it at
/// most once per candidate and trust the verdict.
pub struct EventDedup {
    exact: HashSet<String>,
    seen: Vec<SeenEvent>,
    threshold: f64,
    token_re: Regex,
}

impl Default for EventDedup {
    fn default() -> Self {
        Self::new()
    }
}

impl EventDedup {
    /// Create a detector with the default similarity threshold.
    pub fn new() -> Self {
        Self::with_threshold(SIMILARITY_THRESHOLD)
    }

    /// Create a detector with a custom similarity threshold.
    pub fn with_threshold(threshold: f64) -> Self {
        Self {
            exact: HashSet::new(),
            seen: Vec::new(),
            threshold,
            token_re: Regex::new(r"[a-zA-Zа-яА-ЯёЁ0-9]+").expect("token pattern"),
        }
    }

    /// Check whether `candidate` duplicates a previously seen event,
    /// registering it when it does not.
    ///
    /// The fuzzy pass is O(history size); acceptable because events are
    /// sparse relative to raw message volume.
    pub fn is_duplicate(&mut self, candidate: &EventCandidate) -> bool {
        // Layer 1: exact key.
        let key = self.exact_key(candidate);
        if self.exact.contains(&key) {
            return true;
        }
        self.exact.insert(key);

        // Layer 2: fuzzy token match on date-compatible history.
        let tokens = self.tokenize(&candidate.title);
        let date = candidate.date.clone();

        for stored in &self.seen {
            if !dates_compatible(date.as_deref(), stored.date.as_deref()) {
                continue;
            }
            let similarity = jaccard(&tokens, &stored.tokens);
            if similarity >= self.threshold {
                debug!(
                    title = %candidate.title,
                    matched = %stored.title,
                    similarity,
                    "fuzzy duplicate"
                );
                return true;
            }
        }

        self.seen.push(SeenEvent {
            title: candidate.title.clone(),
            date,
            tokens,
        });
        false
    }

    /// Number of distinct events registered so far.
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    /// Whether nothing has been registered yet.
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    fn exact_key(&self, candidate: &EventCandidate) -> String {
        format!(
            "{}|{}|{}",
            normalize(&candidate.title),
            candidate.date.as_deref().unwrap_or(""),
            normalize(candidate.location_name.as_deref().unwrap_or("")),
        )
    }

    /// Tokenize a title into short stems; single characters are noise.
    fn tokenize(&self, title: &str) -> HashSet<String> {
        let lowered = title.to_lowercase();
        self.token_re
            .find_iter(&lowered)
            .map(|m| m.as_str())
            .filter(|t| t.chars().count() > 1)
            .map(|t| t.chars().take(STEM_LEN).collect::<String>())
            .collect()
    }
}

fn normalize(text: &str) -> String {
    text.to_lowercase().trim().to_string()
}

/// Dates are compatible when equal or when either side is unknown.
fn dates_compatible(a: Option<&str>, b: Option<&str>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => a == b,
        _ => true,
    }
}

fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.union(b).count();
    intersection as f64 / union as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(title: &str, date: Option<&str>, location: Option<&str>) -> EventCandidate {
        let mut c = EventCandidate::new(title);
        c.date = date.map(str::to_string);
        c.location_name = location.map(str::to_string);
        c
    }

    #[test]
    fn exact_repeat_is_a_duplicate() {
        let mut dedup = EventDedup::new();
        let event = candidate("Sunset Yoga", Some("2026-08-05"), Some("Zen Beach"));
        assert!(!dedup.is_duplicate(&event));
        assert!(dedup.is_duplicate(&event));
    }

    #[test]
    fn casing_does_not_defeat_the_exact_layer() {
        let mut dedup = EventDedup::new();
        assert!(!dedup.is_duplicate(&candidate("Sunset Yoga", Some("2026-08-05"), Some("Zen"))));
        assert!(dedup.is_duplicate(&candidate("SUNSET YOGA", Some("2026-08-05"), Some("zen"))));
    }

    #[test]
    fn reworded_title_same_date_is_fuzzy_duplicate() {
        let mut dedup = EventDedup::new();
        // Russian inflection: five-character stems line up even though every
        // word ending differs.
        assert!(!dedup.is_duplicate(&candidate(
            "Вечерняя встреча художников",
            Some("2026-08-07"),
            None
        )));
        assert!(dedup.is_duplicate(&candidate(
            "Вечерние встречи художника",
            Some("2026-08-07"),
            None
        )));
    }

    #[test]
    fn disjoint_titles_are_not_duplicates() {
        let mut dedup = EventDedup::new();
        assert!(!dedup.is_duplicate(&candidate("Morning run club", Some("2026-08-07"), None)));
        assert!(!dedup.is_duplicate(&candidate("Техно вечеринка", Some("2026-08-07"), None)));
    }

    #[test]
    fn different_dates_skip_the_fuzzy_layer() {
        let mut dedup = EventDedup::new();
        assert!(!dedup.is_duplicate(&candidate("Sunset yoga flow", Some("2026-08-05"), None)));
        // Same stems, different concrete dates: not a duplicate.
        assert!(!dedup.is_duplicate(&candidate("Sunset yoga flow!", Some("2026-08-06"), None)));
    }

    #[test]
    fn unknown_date_is_compatible_with_any() {
        let mut dedup = EventDedup::new();
        assert!(!dedup.is_duplicate(&candidate("Sunset yoga flow", Some("2026-08-05"), None)));
        assert!(dedup.is_duplicate(&candidate("Sunset yoga flow class", None, None)));
    }

    #[test]
    fn history_grows_only_on_new_events() {
        let mut dedup = EventDedup::new();
        let event = candidate("Beach cleanup", Some("2026-08-10"), None);
        assert!(dedup.is_empty());
        dedup.is_duplicate(&event);
        dedup.is_duplicate(&event);
        assert_eq!(dedup.len(), 1);
    }
}
