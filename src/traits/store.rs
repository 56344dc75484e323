//! Durable storage collaborator trait.
//!
//! The storage engine itself lives outside this crate; the pipeline depends
//! only on this contract. Venue entries are keyed by the *normalized* query
//! string (see [`crate::venue::normalize_venue_name`]) so multiple surface
//! forms can alias one venue, or alias a remembered miss.

use async_trait::async_trait;

use crate::error::StoreError;
use crate::types::event::PersistedEvent;
use crate::types::venue::VenueLookup;

/// Result of persisting an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InsertOutcome {
    /// Storage-assigned event id.
    pub id: i64,

    /// Whether a new row was created (false on fingerprint merge).
    pub is_new: bool,

    /// Whether the stored event already has a cover image, so downstream
    /// cover generation can be skipped.
    pub has_cover: bool,
}

/// Durable storage collaborator.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Look up a venue alias by normalized query key.
    ///
    /// `Ok(None)` means the key was never attempted; a present
    /// [`VenueLookup::NotFound`] is a remembered miss.
    async fn get_venue(&self, key: &str) -> Result<Option<VenueLookup>, StoreError>;

    /// Write a venue alias entry (positive or negative) for a key.
    async fn upsert_venue(&self, key: &str, lookup: &VenueLookup) -> Result<(), StoreError>;

    /// All venue aliases, for warming the in-memory cache at startup.
    async fn all_venues(&self) -> Result<Vec<(String, VenueLookup)>, StoreError>;

    /// Insert an event, merging on fingerprint conflict.
    ///
    /// Merge contract: later non-empty description/summary/time/location/
    /// venue fill earlier empty ones; price and category always take the
    /// newer value. A conflict is an expected outcome, not an error.
    async fn insert_event(&self, event: &PersistedEvent) -> Result<InsertOutcome, StoreError>;

    /// Whether this exact raw text was already processed into an event.
    ///
    /// Cheap hash probe protecting the expensive AI path from re-posted spam.
    async fn text_already_seen(&self, text: &str) -> Result<bool, StoreError>;
}
