//! Chat-stream offline event detection and enrichment pipeline.
//!
//! Ingests messages from monitored group chats, decides which ones describe
//! real offline events, extracts structured event data through a two-stage
//! AI pipeline, resolves the venue to coordinates, deduplicates against
//! previously seen events, and persists the result.
//!
//! # Design
//!
//! - Deterministic pre-filter rejects the bulk of traffic before any paid
//!   AI call.
//! - The AI boundary is a trait ([`ChatModel`]); replies are validated into
//!   strongly-typed records at the boundary, raw JSON never travels further.
//! - Venue resolution is cached two-tier (memory + durable), with negative
//!   caching so unresolvable names are paid for once.
//! - Dedup is layered: in-process exact + fuzzy matching, and a durable
//!   fingerprint uniqueness enforced by the storage collaborator.
//! - Every per-message unit of work is detached and tracked, so intake is
//!   never blocked and shutdown can join in-flight work.
//!
//! # Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use eventscan::{
//!     AnalyzerConfig, EnricherConfig, EventAnalyzer, MemoryStore, Pipeline,
//!     RawMessage, VenueCache, VenueEnricher,
//! };
//!
//! let store = Arc::new(MemoryStore::new());
//! let model: Arc<dyn eventscan::ChatModel> = make_model();
//!
//! let analyzer = EventAnalyzer::new(model.clone(), AnalyzerConfig::default());
//! let cache = VenueCache::with_store(store.clone());
//! let enricher = VenueEnricher::new(model, cache, EnricherConfig::default());
//!
//! let pipeline = Pipeline::new(store, analyzer, enricher);
//! pipeline.handle_message(RawMessage::new("...")).await;
//! pipeline.shutdown().await;
//! ```

pub mod analyzer;
pub mod dedup;
pub mod error;
pub mod geocoders;
pub mod limits;
pub mod pipeline;
pub mod prefilter;
pub mod stores;
pub mod testing;
pub mod traits;
pub mod types;
pub mod venue;

// Re-export core types at crate root
pub use analyzer::{AnalyzerStatsSnapshot, EventAnalyzer};
pub use dedup::EventDedup;
pub use error::{AiError, GeocodeError, StoreError};
pub use geocoders::PlacesClient;
pub use limits::{RateLimit, RateQuota};
pub use pipeline::{Pipeline, PipelineStatsSnapshot};
pub use prefilter::{BatchOutcome, FilterVerdict, PreFilter};
pub use stores::MemoryStore;
pub use traits::{
    ai::{ChatModel, ChatRequest},
    geocoder::Geocoder,
    store::{EventStore, InsertOutcome},
};
pub use types::{
    config::{AnalyzerConfig, EnricherConfig},
    event::{fingerprint, Category, EventCandidate, EventMeta, PersistedEvent},
    message::RawMessage,
    venue::{VenueLookup, VenueRecord},
};
pub use venue::{
    normalize_venue_name, transliterate, EnricherStatsSnapshot, VenueCache, VenueEnricher,
};
