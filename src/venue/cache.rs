//! Two-tier venue cache: in-memory map over the durable store.
//!
//! Keys are normalized venue names. The memory tier is process-wide shared
//! state, read-mostly, written through to the durable store on every miss
//! resolution. Constructed explicitly and injected, so tests get isolated
//! instances.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::{debug, info, warn};

use crate::traits::store::EventStore;
use crate::types::venue::VenueLookup;
use crate::venue::normalize::normalize_venue_name;

/// Memory + durable venue cache keyed by normalized name.
pub struct VenueCache {
    entries: RwLock<HashMap<String, VenueLookup>>,
    store: Option<Arc<dyn EventStore>>,
}

impl Default for VenueCache {
    fn default() -> Self {
        Self::new()
    }
}

impl VenueCache {
    /// Memory-only cache (tests, tooling).
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            store: None,
        }
    }

    /// Cache backed by a durable store.
    pub fn with_store(store: Arc<dyn EventStore>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            store: Some(store),
        }
    }

    /// Warm the memory tier with every alias the store knows.
    pub async fn preload(&self) {
        let Some(store) = &self.store else {
            return;
        };
        match store.all_venues().await {
            Ok(rows) => {
                let mut entries = self.entries.write().unwrap();
                for (query, lookup) in rows {
                    entries.insert(normalize_venue_name(&query), lookup);
                }
                info!(aliases = entries.len(), "venue cache preloaded");
            }
            Err(err) => warn!(%err, "venue cache preload failed"),
        }
    }

    /// Memory-tier lookup.
    pub fn get(&self, name: &str) -> Option<VenueLookup> {
        let key = normalize_venue_name(name);
        self.entries.read().unwrap().get(&key).cloned()
    }

    /// Memory lookup, falling back to the durable store and warming the
    /// memory tier on a hit.
    pub async fn get_or_load(&self, name: &str) -> Option<VenueLookup> {
        let key = normalize_venue_name(name);
        if let Some(hit) = self.entries.read().unwrap().get(&key).cloned() {
            return Some(hit);
        }
        let store = self.store.as_ref()?;
        match store.get_venue(&key).await {
            Ok(Some(lookup)) => {
                self.entries
                    .write()
                    .unwrap()
                    .insert(key, lookup.clone());
                Some(lookup)
            }
            Ok(None) => None,
            Err(err) => {
                debug!(%err, name, "durable venue lookup failed");
                None
            }
        }
    }

    /// Write an entry to the memory tier only.
    pub fn put(&self, name: &str, lookup: VenueLookup) {
        let key = normalize_venue_name(name);
        self.entries.write().unwrap().insert(key, lookup);
    }

    /// Write an entry to the memory tier and through to the durable store.
    pub async fn put_through(&self, name: &str, lookup: &VenueLookup) {
        let key = normalize_venue_name(name);
        self.entries
            .write()
            .unwrap()
            .insert(key.clone(), lookup.clone());
        if let Some(store) = &self.store {
            if let Err(err) = store.upsert_venue(&key, lookup).await {
                debug!(%err, name, "durable venue write failed");
            }
        }
    }

    /// Number of aliases in the memory tier.
    pub fn len(&self) -> usize {
        self.entries.read().unwrap().len()
    }

    /// Whether the memory tier is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.read().unwrap().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stores::memory::MemoryStore;
    use crate::types::venue::VenueRecord;

    #[test]
    fn aliases_share_one_entry() {
        let cache = VenueCache::new();
        cache.put("AUM", VenueLookup::Found(VenueRecord::new("AUM", 9.74, 100.03)));
        assert!(cache.get("AUM Center, Koh Phangan").is_some());
        assert!(cache.get("aum phangan").is_some());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn negative_entries_are_distinct_from_absent_ones() {
        let cache = VenueCache::new();
        assert_eq!(cache.get("mystery bar"), None);
        cache.put("mystery bar", VenueLookup::NotFound);
        assert_eq!(cache.get("mystery bar"), Some(VenueLookup::NotFound));
    }

    #[tokio::test]
    async fn get_or_load_warms_memory_from_store() {
        let store = Arc::new(MemoryStore::new());
        store
            .upsert_venue(
                &normalize_venue_name("Zen Beach"),
                &VenueLookup::Found(VenueRecord::new("Zen Beach", 9.78, 99.98)),
            )
            .await
            .unwrap();

        let cache = VenueCache::with_store(store);
        assert_eq!(cache.get("Zen Beach"), None);

        let loaded = cache.get_or_load("Zen Beach").await;
        assert!(matches!(loaded, Some(VenueLookup::Found(_))));
        // Second lookup is served from memory.
        assert!(cache.get("Zen Beach").is_some());
    }

    #[tokio::test]
    async fn preload_pulls_every_alias() {
        let store = Arc::new(MemoryStore::new());
        store
            .upsert_venue("zen beach", &VenueLookup::Found(VenueRecord::new("Zen Beach", 9.78, 99.98)))
            .await
            .unwrap();
        store
            .upsert_venue("mystery bar", &VenueLookup::NotFound)
            .await
            .unwrap();

        let cache = VenueCache::with_store(store);
        cache.preload().await;
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("mystery bar"), Some(VenueLookup::NotFound));
    }
}
