//! End-to-end tests for the message pipeline over mocked collaborators.
//!
//! These exercise the full flow: pre-filter → two-stage analysis → venue
//! enrichment → dedup → persistence, with scripted AI replies.

use std::sync::Arc;
use std::time::Duration;

use eventscan::testing::MockChatModel;
use eventscan::{
    AnalyzerConfig, EnricherConfig, EventAnalyzer, EventStore, MemoryStore, Pipeline, RawMessage,
    VenueCache, VenueEnricher,
};

const YOGA_TEXT: &str = "Завтра в 19:00 йога на закате на пляже Zen Beach, вход свободный. \
                         Берите коврики и хорошее настроение, встречаемся у воды!";

fn prescreen_yes() -> String {
    r#"{"is_event": true}"#.to_string()
}

fn yoga_event_json(title: &str) -> String {
    format!(
        r#"{{"is_event": true, "title": "{title}", "category": "Chill",
            "date": "2026-08-05", "time": "19:00", "location_name": "Zen Beach",
            "price": 0, "summary": "Sunset yoga on the beach",
            "description": "Free sunset yoga session on Zen Beach."}}"#
    )
}

fn zen_beach_venue_json() -> String {
    r#"{"found": true, "name": "Zen Beach", "lat": 9.7819, "lng": 99.9702,
        "map_url": "https://maps.example/zen", "address": "Srithanu, Koh Phangan"}"#
        .to_string()
}

fn build_pipeline(
    store: Arc<MemoryStore>,
    model: Arc<MockChatModel>,
) -> Pipeline {
    let analyzer_config = AnalyzerConfig::default()
        .with_retry_delays(Duration::from_millis(1), Duration::from_millis(1));
    let enricher_config = EnricherConfig::default().with_backoff_base(Duration::from_millis(1));

    let store_dyn: Arc<dyn EventStore> = store;
    let analyzer = EventAnalyzer::new(model.clone(), analyzer_config);
    let cache = VenueCache::with_store(store_dyn.clone());
    let enricher = VenueEnricher::new(model, cache, enricher_config);
    Pipeline::new(store_dyn, analyzer, enricher)
}

async fn wait_idle(pipeline: &Pipeline) {
    while pipeline.in_flight() > 0 {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

#[tokio::test]
async fn yoga_announcement_becomes_a_persisted_event_with_coordinates() {
    let store = Arc::new(MemoryStore::new());
    let model = Arc::new(MockChatModel::new());
    model.push_ok(prescreen_yes());
    model.push_ok(yoga_event_json("Йога на закате"));
    model.push_ok(zen_beach_venue_json());

    let pipeline = build_pipeline(store.clone(), model.clone());

    let verdict = pipeline
        .handle_message(
            RawMessage::new(YOGA_TEXT)
                .with_chat_title("Phangan Events")
                .with_ids(-100123, 42),
        )
        .await;
    assert!(verdict.passed, "prefilter verdict: {}", verdict.reason);

    pipeline.shutdown().await;

    assert_eq!(store.event_count(), 1);
    let row = &store.events()[0];
    let candidate = &row.event.candidate;
    assert_eq!(candidate.price, 0);
    assert_eq!(candidate.location_name.as_deref(), Some("Zen Beach"));
    let venue = candidate.venue.as_ref().expect("venue attached");
    assert!((venue.lat - 9.7819).abs() < 1e-9);
    assert!((venue.lng - 99.9702).abs() < 1e-9);
    assert_eq!(row.event.meta.chat_title, "Phangan Events");
    assert_eq!(row.event.meta.original_text, YOGA_TEXT);

    let stats = pipeline.stats();
    assert_eq!(stats.messages, 1);
    assert_eq!(stats.events, 1);
    assert_eq!(model.call_count(), 3);
}

#[tokio::test]
async fn reworded_repost_is_dropped_as_a_duplicate() {
    let store = Arc::new(MemoryStore::new());
    let model = Arc::new(MockChatModel::new());
    let pipeline = build_pipeline(store.clone(), model.clone());

    model.push_ok(prescreen_yes());
    model.push_ok(yoga_event_json("Йога на закате"));
    model.push_ok(zen_beach_venue_json());
    pipeline
        .handle_message(RawMessage::new(YOGA_TEXT).with_chat_title("Chat A"))
        .await;
    wait_idle(&pipeline).await;

    // Same event from another chat, reworded title, same date. The venue is
    // already cached, so only two AI calls happen.
    let reposted = format!("{YOGA_TEXT} Репост для друзей.");
    model.push_ok(prescreen_yes());
    model.push_ok(yoga_event_json("Йога на закате на пляже"));
    pipeline
        .handle_message(RawMessage::new(reposted).with_chat_title("Chat B"))
        .await;
    wait_idle(&pipeline).await;

    pipeline.shutdown().await;

    assert_eq!(store.event_count(), 1);
    let stats = pipeline.stats();
    assert_eq!(stats.duplicates, 1);
    assert_eq!(stats.events, 1);
    assert_eq!(model.call_count(), 5);
}

#[tokio::test]
async fn retransmitted_text_never_reaches_the_ai() {
    let store = Arc::new(MemoryStore::new());
    let model = Arc::new(MockChatModel::new());
    let pipeline = build_pipeline(store.clone(), model.clone());

    model.push_ok(prescreen_yes());
    model.push_ok(yoga_event_json("Йога на закате"));
    model.push_ok(zen_beach_venue_json());
    pipeline.handle_message(RawMessage::new(YOGA_TEXT)).await;
    wait_idle(&pipeline).await;
    let calls_after_first = model.call_count();

    // Exact same text again: the spam-hash guard stops it inline.
    pipeline.handle_message(RawMessage::new(YOGA_TEXT)).await;
    pipeline.shutdown().await;

    assert_eq!(model.call_count(), calls_after_first);
    assert_eq!(pipeline.stats().spam_skipped, 1);
    assert_eq!(store.event_count(), 1);
}

#[tokio::test]
async fn blacklisted_message_is_dropped_inline() {
    let store = Arc::new(MemoryStore::new());
    let model = Arc::new(MockChatModel::new());
    let pipeline = build_pipeline(store.clone(), model.clone());

    let verdict = pipeline
        .handle_message(RawMessage::new("Продам байк Nmax 2023, 45000 бат").with_media(true))
        .await;
    pipeline.shutdown().await;

    assert!(!verdict.passed);
    assert_eq!(model.call_count(), 0);
    assert_eq!(pipeline.stats().filtered, 1);
    assert_eq!(store.event_count(), 0);
}

#[tokio::test]
async fn screen_rejection_persists_nothing() {
    let store = Arc::new(MemoryStore::new());
    let model = Arc::new(MockChatModel::new());
    model.push_ok(r#"{"is_event": false}"#.to_string());

    let pipeline = build_pipeline(store.clone(), model.clone());
    pipeline.handle_message(RawMessage::new(YOGA_TEXT)).await;
    pipeline.shutdown().await;

    assert_eq!(model.call_count(), 1);
    assert_eq!(store.event_count(), 0);
    assert_eq!(pipeline.stats().events, 0);
}

#[tokio::test]
async fn shutdown_joins_in_flight_work() {
    let store = Arc::new(MemoryStore::new());
    let model = Arc::new(MockChatModel::new());
    model.push_ok(prescreen_yes());
    model.push_ok(yoga_event_json("Йога на закате"));
    model.push_ok(zen_beach_venue_json());

    let pipeline = build_pipeline(store.clone(), model);
    pipeline.handle_message(RawMessage::new(YOGA_TEXT)).await;

    // No waiting in between: shutdown itself must join the unit.
    pipeline.shutdown().await;
    assert_eq!(store.event_count(), 1);
}

#[tokio::test]
async fn unresolvable_venue_still_persists_the_event() {
    let store = Arc::new(MemoryStore::new());
    let model = Arc::new(MockChatModel::new());
    model.push_ok(prescreen_yes());
    model.push_ok(yoga_event_json("Йога на закате"));
    // Every geocode attempt in the plan says "not found".
    for _ in 0..3 {
        model.push_ok(r#"{"found": false}"#.to_string());
    }

    let pipeline = build_pipeline(store.clone(), model);
    pipeline.handle_message(RawMessage::new(YOGA_TEXT)).await;
    pipeline.shutdown().await;

    assert_eq!(store.event_count(), 1);
    let row = &store.events()[0];
    assert!(row.event.candidate.venue.is_none());
    // The miss is remembered durably.
    assert!(matches!(
        store.get_venue("zen beach").await.unwrap(),
        Some(eventscan::VenueLookup::NotFound)
    ));
}
