//! Pipeline coordinator: the "process one message" flow.
//!
//! Intake is a fast synchronous path (pre-filter, then a cheap spam-hash
//! probe); everything expensive (AI analysis, venue enrichment, dedup,
//! persistence) runs as a detached unit of work on a task tracker. The
//! launcher never waits, so message intake is never blocked on AI latency.
//! Units for different messages complete in any order; within one unit the
//! stages are strictly sequential.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use crate::analyzer::EventAnalyzer;
use crate::dedup::EventDedup;
use crate::prefilter::{FilterVerdict, PreFilter};
use crate::traits::store::EventStore;
use crate::types::event::{EventMeta, PersistedEvent};
use crate::types::message::RawMessage;
use crate::venue::VenueEnricher;

/// Counters for the coordinator.
#[derive(Debug, Default)]
pub struct PipelineStats {
    messages: AtomicU64,
    filtered: AtomicU64,
    spam_skipped: AtomicU64,
    duplicates: AtomicU64,
    events: AtomicU64,
    lost: AtomicU64,
}

/// Point-in-time view of [`PipelineStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineStatsSnapshot {
    pub messages: u64,
    pub filtered: u64,
    pub spam_skipped: u64,
    pub duplicates: u64,
    pub events: u64,
    pub lost: u64,
}

impl PipelineStats {
    fn snapshot(&self) -> PipelineStatsSnapshot {
        PipelineStatsSnapshot {
            messages: self.messages.load(Ordering::Relaxed),
            filtered: self.filtered.load(Ordering::Relaxed),
            spam_skipped: self.spam_skipped.load(Ordering::Relaxed),
            duplicates: self.duplicates.load(Ordering::Relaxed),
            events: self.events.load(Ordering::Relaxed),
            lost: self.lost.load(Ordering::Relaxed),
        }
    }
}

/// The message-processing pipeline.
///
/// The dedup history and the enricher's venue cache are the only state
/// shared between concurrently running units; both are safe under
/// concurrent access. Construct one pipeline per process (or per test).
pub struct Pipeline {
    prefilter: PreFilter,
    analyzer: Arc<EventAnalyzer>,
    enricher: Arc<VenueEnricher>,
    dedup: Arc<Mutex<EventDedup>>,
    store: Arc<dyn EventStore>,
    tracker: TaskTracker,
    stats: Arc<PipelineStats>,
}

impl Pipeline {
    /// Assemble a pipeline from its components.
    pub fn new(
        store: Arc<dyn EventStore>,
        analyzer: EventAnalyzer,
        enricher: VenueEnricher,
    ) -> Self {
        Self {
            prefilter: PreFilter::new(),
            analyzer: Arc::new(analyzer),
            enricher: Arc::new(enricher),
            dedup: Arc::new(Mutex::new(EventDedup::new())),
            store,
            tracker: TaskTracker::new(),
            stats: Arc::new(PipelineStats::default()),
        }
    }

    /// Replace the default pre-filter (tuned thresholds).
    pub fn with_prefilter(mut self, prefilter: PreFilter) -> Self {
        self.prefilter = prefilter;
        self
    }

    /// The analyzer, for stats inspection.
    pub fn analyzer(&self) -> &EventAnalyzer {
        &self.analyzer
    }

    /// The enricher, for cache preloading and stats inspection.
    pub fn enricher(&self) -> &VenueEnricher {
        &self.enricher
    }

    /// Current counters.
    pub fn stats(&self) -> PipelineStatsSnapshot {
        self.stats.snapshot()
    }

    /// Number of units still in flight.
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    /// Ingest one message.
    ///
    /// Fast path only: the pre-filter and the spam-hash probe run inline,
    /// the rest is detached onto the tracker. Returns the filter verdict so
    /// transports can log drop reasons.
    pub async fn handle_message(&self, message: RawMessage) -> FilterVerdict {
        self.stats.messages.fetch_add(1, Ordering::Relaxed);

        let verdict = self.prefilter.check(&message.text, message.has_media);
        if !verdict.passed {
            self.stats.filtered.fetch_add(1, Ordering::Relaxed);
            debug!(reason = %verdict.reason, "message filtered");
            return verdict;
        }

        // Cheap hash probe: a re-posted text must not re-trigger the AI path.
        match self.store.text_already_seen(&message.text).await {
            Ok(true) => {
                self.stats.spam_skipped.fetch_add(1, Ordering::Relaxed);
                debug!(chat = %message.chat_title_or_default(), "text already processed, skipping");
                return verdict;
            }
            Ok(false) => {}
            Err(err) => warn!(%err, "spam-hash probe failed, proceeding"),
        }

        let analyzer = Arc::clone(&self.analyzer);
        let enricher = Arc::clone(&self.enricher);
        let dedup = Arc::clone(&self.dedup);
        let store = Arc::clone(&self.store);
        let stats = Arc::clone(&self.stats);
        let filter_score = verdict.score;

        self.tracker.spawn(async move {
            process_unit(analyzer, enricher, dedup, store, stats, message, filter_score).await;
        });

        verdict
    }

    /// Stop accepting work and wait for every in-flight unit.
    pub async fn shutdown(&self) {
        self.tracker.close();
        self.tracker.wait().await;
    }
}

/// One detached unit of work: analyze → enrich → dedup → persist.
///
/// Nothing here can affect another unit; every failure ends as a logged
/// drop of this message only.
async fn process_unit(
    analyzer: Arc<EventAnalyzer>,
    enricher: Arc<VenueEnricher>,
    dedup: Arc<Mutex<EventDedup>>,
    store: Arc<dyn EventStore>,
    stats: Arc<PipelineStats>,
    message: RawMessage,
    filter_score: i32,
) {
    let chat_title = message.chat_title.clone().unwrap_or_default();

    let Some(mut candidate) = analyzer.analyze(&message.text, &chat_title).await else {
        return;
    };

    enricher.enrich_event(&mut candidate).await;

    if dedup.lock().unwrap().is_duplicate(&candidate) {
        stats.duplicates.fetch_add(1, Ordering::Relaxed);
        debug!(title = %candidate.title, "duplicate event dropped");
        return;
    }

    let meta = EventMeta {
        chat_id: message.chat_id,
        chat_title,
        message_id: message.message_id,
        sender: message.sender,
        filter_score,
        original_text: message.text,
        detected_at: Some(Utc::now()),
    };
    let event = PersistedEvent::new(candidate, meta);

    match store.insert_event(&event).await {
        Ok(outcome) => {
            stats.events.fetch_add(1, Ordering::Relaxed);
            info!(
                id = outcome.id,
                is_new = outcome.is_new,
                title = %event.candidate.title,
                "event persisted"
            );
        }
        Err(err) => {
            stats.lost.fetch_add(1, Ordering::Relaxed);
            error!(%err, title = %event.candidate.title, "storage unavailable, event lost");
        }
    }
}
