//! Event candidate and persisted event types.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::types::venue::VenueRecord;

/// Placeholder strings the AI uses for fields it could not determine.
pub(crate) const PLACEHOLDERS: &[&str] = &["TBD", "N/A", "unknown", ""];

/// Whether a string is one of the unknown-field placeholders.
pub(crate) fn is_placeholder(value: &str) -> bool {
    PLACEHOLDERS
        .iter()
        .any(|p| p.eq_ignore_ascii_case(value.trim()))
}

/// The five fixed event categories.
///
/// Anything the AI returns outside this set is coerced to [`Category::Chill`]
/// rather than rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    Party,
    Sport,
    Business,
    Education,
    Chill,
}

impl Category {
    /// All valid categories, in display order.
    pub const ALL: [Category; 5] = [
        Category::Party,
        Category::Sport,
        Category::Business,
        Category::Education,
        Category::Chill,
    ];

    /// Parse a category name; `None` for anything outside the enum.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "Party" => Some(Category::Party),
            "Sport" => Some(Category::Sport),
            "Business" => Some(Category::Business),
            "Education" => Some(Category::Education),
            "Chill" => Some(Category::Chill),
            _ => None,
        }
    }

    /// Canonical string form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Party => "Party",
            Category::Sport => "Sport",
            Category::Business => "Business",
            Category::Education => "Education",
            Category::Chill => "Chill",
        }
    }
}

impl Default for Category {
    fn default() -> Self {
        Category::Chill
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A structured event produced by the extraction stage.
///
/// Fields the AI could not determine are `None`. A message that is not an
/// event at all never becomes a candidate.
#[derive(Debug, Clone, PartialEq)]
pub struct EventCandidate {
    /// Short catchy title.
    pub title: String,

    /// One of the five fixed categories.
    pub category: Category,

    /// Event date, `YYYY-MM-DD`.
    pub date: Option<String>,

    /// Start time, `HH:MM`.
    pub time: Option<String>,

    /// Free-text venue name as written in the message.
    pub location_name: Option<String>,

    /// Entry price in whole currency units; 0 when free.
    pub price: u32,

    /// One-sentence summary.
    pub summary: String,

    /// Listing description, a few sentences.
    pub description: String,

    /// Resolved venue, attached by the enricher on success only.
    pub venue: Option<VenueRecord>,
}

impl EventCandidate {
    /// Minimal candidate for composition in tests and adapters.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            category: Category::default(),
            date: None,
            time: None,
            location_name: None,
            price: 0,
            summary: String::new(),
            description: String::new(),
            venue: None,
        }
    }

    /// Set the date.
    pub fn with_date(mut self, date: impl Into<String>) -> Self {
        self.date = Some(date.into());
        self
    }

    /// Set the time.
    pub fn with_time(mut self, time: impl Into<String>) -> Self {
        self.time = Some(time.into());
        self
    }

    /// Set the free-text location.
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location_name = Some(location.into());
        self
    }

    /// Set the category.
    pub fn with_category(mut self, category: Category) -> Self {
        self.category = category;
        self
    }

    /// Set the price.
    pub fn with_price(mut self, price: u32) -> Self {
        self.price = price;
        self
    }
}

/// Provenance recorded alongside a persisted event.
#[derive(Debug, Clone, Default)]
pub struct EventMeta {
    pub chat_id: Option<i64>,
    pub chat_title: String,
    pub message_id: Option<i64>,
    pub sender: Option<String>,
    pub filter_score: i32,
    pub original_text: String,
    pub detected_at: Option<DateTime<Utc>>,
}

/// Final record handed to the storage collaborator.
///
/// The fingerprint is the only cross-run dedup guarantee; the storage layer
/// enforces its uniqueness transactionally.
#[derive(Debug, Clone)]
pub struct PersistedEvent {
    pub candidate: EventCandidate,
    pub meta: EventMeta,
    pub fingerprint: String,
}

impl PersistedEvent {
    /// Build a persisted event, computing the fingerprint.
    pub fn new(candidate: EventCandidate, meta: EventMeta) -> Self {
        let fingerprint = fingerprint(&candidate.title, candidate.date.as_deref());
        Self {
            candidate,
            meta,
            fingerprint,
        }
    }
}

/// Deterministic dedup fingerprint: SHA-256 of normalized title plus date.
///
/// The title is lowercased, stripped of everything outside Latin/Cyrillic
/// letters, digits and spaces, and whitespace-collapsed, so the same event
/// re-posted with different casing or emoji collides. Location does not
/// participate: venue spelling varies too much across chats.
pub fn fingerprint(title: &str, date: Option<&str>) -> String {
    let normalized = normalize_for_fingerprint(title);
    let raw = format!("{}|{}", normalized, date.unwrap_or("unknown"));
    let digest = Sha256::digest(raw.as_bytes());
    format!("{digest:x}")
}

fn normalize_for_fingerprint(text: &str) -> String {
    let lowered = text.to_lowercase();
    let kept: String = lowered
        .chars()
        .filter(|c| {
            c.is_ascii_alphanumeric() || ('а'..='я').contains(c) || *c == 'ё' || *c == ' '
        })
        .collect();
    kept.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_coercion() {
        assert_eq!(Category::parse("Sport"), Some(Category::Sport));
        assert_eq!(Category::parse("  Party "), Some(Category::Party));
        assert_eq!(Category::parse("Rave"), None);
        assert_eq!(Category::default(), Category::Chill);
    }

    #[test]
    fn fingerprint_ignores_case_and_punctuation() {
        let a = fingerprint("Sunset YOGA!!!", Some("2026-08-05"));
        let b = fingerprint("sunset yoga", Some("2026-08-05"));
        assert_eq!(a, b);
    }

    #[test]
    fn fingerprint_differs_by_date() {
        let a = fingerprint("sunset yoga", Some("2026-08-05"));
        let b = fingerprint("sunset yoga", Some("2026-08-06"));
        let c = fingerprint("sunset yoga", None);
        assert_ne!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn fingerprint_is_location_agnostic() {
        let mut first = EventCandidate::new("Beach Party").with_date("2026-08-09");
        first.location_name = Some("Zen Beach".to_string());
        let mut second = EventCandidate::new("BEACH PARTY").with_date("2026-08-09");
        second.location_name = Some("Secret Beach".to_string());

        let a = PersistedEvent::new(first, EventMeta::default());
        let b = PersistedEvent::new(second, EventMeta::default());
        assert_eq!(a.fingerprint, b.fingerprint);
    }

    #[test]
    fn cyrillic_titles_keep_their_letters() {
        let a = fingerprint("Йога на закате", Some("2026-08-05"));
        let b = fingerprint("йога на закате!", Some("2026-08-05"));
        assert_eq!(a, b);
    }
}
