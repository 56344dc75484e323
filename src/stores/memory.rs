//! In-memory storage implementation for testing and development.
//!
//! Honors the full [`EventStore`] contract, including the fingerprint
//! merge-upsert semantics, so pipeline behavior against it matches a real
//! durable store. Data is lost on restart; not for production.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use crate::error::StoreError;
use crate::traits::store::{EventStore, InsertOutcome};
use crate::types::event::PersistedEvent;
use crate::types::venue::VenueLookup;

/// A stored event row.
#[derive(Debug, Clone)]
pub struct StoredEvent {
    pub id: i64,
    pub event: PersistedEvent,
    pub has_cover: bool,
}

/// In-memory event and venue store.
pub struct MemoryStore {
    venues: RwLock<HashMap<String, VenueLookup>>,
    events: RwLock<HashMap<String, StoredEvent>>,
    texts: RwLock<HashSet<String>>,
    next_id: AtomicI64,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            venues: RwLock::new(HashMap::new()),
            events: RwLock::new(HashMap::new()),
            texts: RwLock::new(HashSet::new()),
            next_id: AtomicI64::new(0),
        }
    }

    /// Number of stored events.
    pub fn event_count(&self) -> usize {
        self.events.read().unwrap().len()
    }

    /// Stored event by fingerprint.
    pub fn get_event(&self, fingerprint: &str) -> Option<StoredEvent> {
        self.events.read().unwrap().get(fingerprint).cloned()
    }

    /// All stored events in insertion order.
    pub fn events(&self) -> Vec<StoredEvent> {
        let mut rows: Vec<StoredEvent> = self.events.read().unwrap().values().cloned().collect();
        rows.sort_by_key(|row| row.id);
        rows
    }

    /// Mark an event as already having a cover image (test helper).
    pub fn set_cover(&self, fingerprint: &str) {
        if let Some(row) = self.events.write().unwrap().get_mut(fingerprint) {
            row.has_cover = true;
        }
    }

    fn text_hash(text: &str) -> String {
        format!("{:x}", Sha256::digest(text.as_bytes()))
    }
}

#[async_trait]
impl EventStore for MemoryStore {
    async fn get_venue(&self, key: &str) -> Result<Option<VenueLookup>, StoreError> {
        Ok(self.venues.read().unwrap().get(key).cloned())
    }

    async fn upsert_venue(&self, key: &str, lookup: &VenueLookup) -> Result<(), StoreError> {
        self.venues
            .write()
            .unwrap()
            .insert(key.to_string(), lookup.clone());
        Ok(())
    }

    async fn all_venues(&self) -> Result<Vec<(String, VenueLookup)>, StoreError> {
        Ok(self
            .venues
            .read()
            .unwrap()
            .iter()
            .map(|(key, lookup)| (key.clone(), lookup.clone()))
            .collect())
    }

    async fn insert_event(&self, event: &PersistedEvent) -> Result<InsertOutcome, StoreError> {
        let mut events = self.events.write().unwrap();

        if let Some(existing) = events.get_mut(&event.fingerprint) {
            // Merge: later non-empty fields fill earlier empty ones;
            // price and category always take the newer value.
            let stored = &mut existing.event.candidate;
            let incoming = &event.candidate;

            if !incoming.description.is_empty() {
                stored.description = incoming.description.clone();
            }
            if !incoming.summary.is_empty() {
                stored.summary = incoming.summary.clone();
            }
            if incoming.venue.is_some() {
                stored.venue = incoming.venue.clone();
            }
            if incoming.location_name.is_some() {
                stored.location_name = incoming.location_name.clone();
            }
            if incoming.time.is_some() {
                stored.time = incoming.time.clone();
            }
            stored.price = incoming.price;
            stored.category = incoming.category;

            return Ok(InsertOutcome {
                id: existing.id,
                is_new: false,
                has_cover: existing.has_cover,
            });
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        events.insert(
            event.fingerprint.clone(),
            StoredEvent {
                id,
                event: event.clone(),
                has_cover: false,
            },
        );
        self.texts
            .write()
            .unwrap()
            .insert(Self::text_hash(&event.meta.original_text));

        Ok(InsertOutcome {
            id,
            is_new: true,
            has_cover: false,
        })
    }

    async fn text_already_seen(&self, text: &str) -> Result<bool, StoreError> {
        if text.is_empty() {
            return Ok(false);
        }
        Ok(self.texts.read().unwrap().contains(&Self::text_hash(text)))
    }
}
