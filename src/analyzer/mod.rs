//! Two-stage event analysis: cheap pre-screen, then full extraction.
//!
//! Stage 1 asks a low-cost model a single yes/no question; stage 2 runs the
//! expensive structured extraction with retry and model fallback. Both
//! stages are rate limited independently, and neither lets a provider
//! failure escape as anything other than "no result".

pub mod prompts;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

use crate::error::AiError;
use crate::limits::RateLimit;
use crate::traits::ai::{ChatModel, ChatRequest};
use crate::types::config::AnalyzerConfig;
use crate::types::event::{is_placeholder, Category, EventCandidate};

use self::prompts::{extract_prompt, user_prompt, PRESCREEN_PROMPT};

/// Wire shape of a pre-screen reply.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub(crate) struct PreScreenReply {
    #[serde(default)]
    pub is_event: bool,
}

/// Wire shape of an extraction reply, before validation.
///
/// Everything is optional: the validation step coerces missing fields
/// instead of rejecting the reply.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub(crate) struct EventReply {
    #[serde(default)]
    pub is_event: bool,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub time: Option<String>,
    #[serde(default)]
    pub location_name: Option<String>,
    #[serde(default)]
    pub price: Option<Value>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Counters for the analyzer, shared across pipeline units.
#[derive(Debug, Default)]
pub struct AnalyzerStats {
    screened: AtomicU64,
    screen_passed: AtomicU64,
    extracted: AtomicU64,
    events_found: AtomicU64,
    fallbacks: AtomicU64,
    errors: AtomicU64,
}

/// Point-in-time view of [`AnalyzerStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalyzerStatsSnapshot {
    pub screened: u64,
    pub screen_passed: u64,
    pub extracted: u64,
    pub events_found: u64,
    pub fallbacks: u64,
    pub errors: u64,
}

impl AnalyzerStats {
    fn snapshot(&self) -> AnalyzerStatsSnapshot {
        AnalyzerStatsSnapshot {
            screened: self.screened.load(Ordering::Relaxed),
            screen_passed: self.screen_passed.load(Ordering::Relaxed),
            extracted: self.extracted.load(Ordering::Relaxed),
            events_found: self.events_found.load(Ordering::Relaxed),
            fallbacks: self.fallbacks.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

/// Two-stage analyzer: pre-screen (cheap model) → extract (full model).
pub struct EventAnalyzer {
    model: Arc<dyn ChatModel>,
    config: AnalyzerConfig,
    screen_limiter: RateLimit,
    extract_limiter: RateLimit,
    stats: AnalyzerStats,
}

impl EventAnalyzer {
    /// Create an analyzer over a model collaborator.
    pub fn new(model: Arc<dyn ChatModel>, config: AnalyzerConfig) -> Self {
        Self {
            model,
            screen_limiter: config.screen_quota.limiter(),
            extract_limiter: config.extract_quota.limiter(),
            config,
            stats: AnalyzerStats::default(),
        }
    }

    /// Current counters.
    pub fn stats(&self) -> AnalyzerStatsSnapshot {
        self.stats.snapshot()
    }

    /// Stage 1: is this plausibly an event?
    ///
    /// Texts under the minimum length are rejected without an AI call. Any
    /// provider failure resolves to the configured fail-open policy: by
    /// default the message passes on to extraction, trading wasted
    /// extraction calls for recall. Never returns an error.
    pub async fn pre_screen(&self, text: &str, chat_title: &str) -> bool {
        if text.trim().chars().count() < self.config.min_screen_len {
            return false;
        }

        self.screen_limiter.acquire().await;
        self.stats.screened.fetch_add(1, Ordering::Relaxed);

        let request = ChatRequest::new(
            &self.config.screen_model,
            PRESCREEN_PROMPT,
            user_prompt(chat_title, text, self.config.screen_text_limit),
        )
        .with_temperature(0.0)
        .with_max_tokens(32)
        .with_schema::<PreScreenReply>();

        let passed = match timeout(self.config.request_timeout, self.model.generate(&request)).await
        {
            Ok(Ok(reply)) => match serde_json::from_str::<PreScreenReply>(reply.trim()) {
                Ok(parsed) => parsed.is_event,
                Err(err) => {
                    debug!(%err, "pre-screen reply malformed");
                    self.config.fail_open
                }
            },
            Ok(Err(err)) => {
                debug!(%err, "pre-screen call failed");
                self.config.fail_open
            }
            Err(_) => {
                debug!("pre-screen timed out");
                self.config.fail_open
            }
        };

        if passed {
            self.stats.screen_passed.fetch_add(1, Ordering::Relaxed);
        }
        passed
    }

    /// Stage 2: full structured extraction.
    ///
    /// `Ok(None)` is the normal "not an event" outcome. Transient provider
    /// failures are retried once on the primary model, then the call
    /// permanently switches to the fallback model; malformed output gets a
    /// single retry with no model switch. `Err` means retries are exhausted;
    /// the caller treats it as "no result".
    pub async fn extract(
        &self,
        text: &str,
        chat_title: &str,
    ) -> Result<Option<EventCandidate>, AiError> {
        self.extract_limiter.acquire().await;
        self.stats.extracted.fetch_add(1, Ordering::Relaxed);

        let today = Utc::now().date_naive().to_string();
        let system = extract_prompt(&today, &self.config.region);
        let user = user_prompt(chat_title, text, self.config.extract_text_limit);

        // Attempt plan, consumed in order: the fallback model is appended
        // only after the primary fails twice with a transient error.
        let mut models = vec![self.config.extract_model.clone()];
        let mut fallback_engaged = false;
        let mut index = 0;

        while index < models.len() {
            let model = models[index].clone();
            let request = ChatRequest::new(&model, &system, &user)
                .with_temperature(0.1)
                .with_schema::<EventReply>();

            for attempt in 0..2 {
                let generated =
                    match timeout(self.config.request_timeout, self.model.generate(&request)).await
                    {
                        Ok(result) => result,
                        Err(_) => Err(AiError::Transient("request timed out".to_string())),
                    };

                match generated {
                    Ok(reply) => match parse_event_reply(&reply) {
                        Ok(candidate) => {
                            if candidate.is_some() {
                                self.stats.events_found.fetch_add(1, Ordering::Relaxed);
                            }
                            return Ok(candidate);
                        }
                        Err(err) => {
                            if attempt == 0 {
                                warn!(%err, "malformed extraction reply, retrying once");
                                sleep(self.config.malformed_retry_delay).await;
                                continue;
                            }
                            self.stats.errors.fetch_add(1, Ordering::Relaxed);
                            return Err(err);
                        }
                    },
                    Err(err) if err.is_transient() => {
                        if attempt == 0 {
                            info!(%model, %err, "transient extraction failure, retrying");
                            sleep(self.config.retry_delay).await;
                            continue;
                        }
                        if !fallback_engaged
                            && model == self.config.extract_model
                            && self.config.fallback_model != self.config.extract_model
                        {
                            warn!(
                                from = %model,
                                to = %self.config.fallback_model,
                                "extraction switching to fallback model"
                            );
                            models.push(self.config.fallback_model.clone());
                            fallback_engaged = true;
                            self.stats.fallbacks.fetch_add(1, Ordering::Relaxed);
                            break;
                        }
                        self.stats.errors.fetch_add(1, Ordering::Relaxed);
                        return Err(err);
                    }
                    Err(err) => {
                        self.stats.errors.fetch_add(1, Ordering::Relaxed);
                        return Err(err);
                    }
                }
            }
            index += 1;
        }

        Err(AiError::Transient("extraction attempts exhausted".to_string()))
    }

    /// Full pipeline for one message: pre-screen, then extract.
    ///
    /// Exhausted-retry errors are converted to `None` here; callers never
    /// see an error from this entry point.
    pub async fn analyze(&self, text: &str, chat_title: &str) -> Option<EventCandidate> {
        if !self.pre_screen(text, chat_title).await {
            return None;
        }
        match self.extract(text, chat_title).await {
            Ok(candidate) => candidate,
            Err(err) => {
                warn!(%err, "extraction gave up");
                None
            }
        }
    }

    /// Batch analysis: concurrent pre-screen, then sequential extraction.
    ///
    /// Pre-screen runs up to `concurrency` calls at a time; extraction stays
    /// sequential because its budget is far tighter. Result order matches
    /// input order regardless of completion order.
    pub async fn analyze_batch(
        &self,
        items: Vec<(String, String)>,
        concurrency: usize,
    ) -> Vec<Option<EventCandidate>> {
        let concurrency = concurrency.max(1);

        let screens: Vec<bool> = stream::iter(items.iter())
            .map(|(text, chat_title)| self.pre_screen(text, chat_title))
            .buffered(concurrency)
            .collect()
            .await;

        let mut results = Vec::with_capacity(items.len());
        for (passed, (text, chat_title)) in screens.into_iter().zip(items.iter()) {
            if !passed {
                results.push(None);
                continue;
            }
            results.push(match self.extract(text, chat_title).await {
                Ok(candidate) => candidate,
                Err(err) => {
                    warn!(%err, "extraction gave up");
                    None
                }
            });
        }
        results
    }
}

/// Parse and validate an extraction reply into a candidate.
///
/// Lists are reduced to their first element (models occasionally return an
/// array of events); non-object replies and explicit rejections become
/// `Ok(None)`; undecodable JSON is an error so the caller can retry.
pub(crate) fn parse_event_reply(text: &str) -> Result<Option<EventCandidate>, AiError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(AiError::Empty);
    }

    let value: Value =
        serde_json::from_str(trimmed).map_err(|err| AiError::Malformed(err.to_string()))?;

    let value = match value {
        Value::Array(items) => match items.into_iter().next() {
            Some(first) => first,
            None => return Ok(None),
        },
        other => other,
    };

    if !value.is_object() {
        return Ok(None);
    }

    let reply: EventReply =
        serde_json::from_value(value).map_err(|err| AiError::Malformed(err.to_string()))?;
    Ok(validate_reply(reply))
}

fn validate_reply(reply: EventReply) -> Option<EventCandidate> {
    if !reply.is_event {
        return None;
    }

    let category = reply
        .category
        .as_deref()
        .and_then(Category::parse)
        .unwrap_or_default();

    Some(EventCandidate {
        title: non_empty_or(reply.title, "N/A"),
        category,
        date: known_field(reply.date),
        time: known_field(reply.time),
        location_name: known_field(reply.location_name),
        price: coerce_price(reply.price),
        summary: non_empty_or(reply.summary, "N/A"),
        description: reply.description.unwrap_or_default(),
        venue: None,
    })
}

fn known_field(value: Option<String>) -> Option<String> {
    value.filter(|v| !is_placeholder(v))
}

fn non_empty_or(value: Option<String>, default: &str) -> String {
    value
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

/// Price arrives as a number, a numeric string, or garbage; anything that
/// does not parse to a non-negative integer becomes 0.
fn coerce_price(value: Option<Value>) -> u32 {
    match value {
        Some(Value::Number(n)) => n
            .as_i64()
            .map(|v| v.max(0) as u32)
            .or_else(|| {
                n.as_f64()
                    .filter(|v| v.is_finite() && *v > 0.0)
                    .map(|v| v as u32)
            })
            .unwrap_or(0),
        Some(Value::String(s)) => s.trim().parse::<i64>().map(|v| v.max(0) as u32).unwrap_or(0),
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockChatModel;
    use std::time::Duration;

    fn analyzer_with(model: Arc<MockChatModel>) -> EventAnalyzer {
        let config = AnalyzerConfig::default()
            .with_retry_delays(Duration::from_millis(1), Duration::from_millis(1));
        EventAnalyzer::new(model, config)
    }

    fn event_json() -> String {
        r#"{"is_event": true, "title": "Sunset Yoga", "category": "Chill",
            "date": "2026-08-05", "time": "19:00", "location_name": "Zen Beach",
            "price": 0, "summary": "Yoga at sunset", "description": "Flow as the sun goes down."}"#
            .to_string()
    }

    const LONG_TEXT: &str = "Завтра в 19:00 йога на закате на пляже Zen Beach, вход свободный";

    #[tokio::test]
    async fn short_text_skips_the_screening_call() {
        let model = Arc::new(MockChatModel::new());
        let analyzer = analyzer_with(model.clone());
        assert!(!analyzer.pre_screen("hi", "chat").await);
        assert_eq!(model.call_count(), 0);
        assert_eq!(analyzer.stats().screened, 0);
    }

    #[tokio::test]
    async fn pre_screen_fails_open_on_provider_error() {
        let model = Arc::new(MockChatModel::new());
        model.push_err(AiError::Transient("503".to_string()));
        let analyzer = analyzer_with(model);
        assert!(analyzer.pre_screen(LONG_TEXT, "chat").await);
    }

    #[tokio::test]
    async fn pre_screen_fail_closed_policy_rejects_on_error() {
        let model = Arc::new(MockChatModel::new());
        model.push_err(AiError::Transient("503".to_string()));
        let config = AnalyzerConfig::default().with_fail_open(false);
        let analyzer = EventAnalyzer::new(model, config);
        assert!(!analyzer.pre_screen(LONG_TEXT, "chat").await);
    }

    #[tokio::test]
    async fn malformed_reply_then_valid_retry_succeeds() {
        let model = Arc::new(MockChatModel::new());
        model.push_ok("this is not json".to_string());
        model.push_ok(event_json());
        let analyzer = analyzer_with(model.clone());

        let candidate = analyzer.extract(LONG_TEXT, "chat").await.unwrap().unwrap();
        assert_eq!(candidate.title, "Sunset Yoga");
        assert_eq!(model.call_count(), 2);
    }

    #[tokio::test]
    async fn malformed_twice_is_an_error_not_a_panic() {
        let model = Arc::new(MockChatModel::new());
        model.push_ok("nope".to_string());
        model.push_ok("still nope".to_string());
        let analyzer = analyzer_with(model);

        assert!(matches!(
            analyzer.extract(LONG_TEXT, "chat").await,
            Err(AiError::Malformed(_))
        ));
    }

    #[tokio::test]
    async fn two_transient_failures_switch_to_the_fallback_model() {
        let model = Arc::new(MockChatModel::new());
        model.push_err(AiError::Transient("503".to_string()));
        model.push_err(AiError::Transient("504 DEADLINE".to_string()));
        model.push_ok(event_json());
        let analyzer = analyzer_with(model.clone());

        let candidate = analyzer.extract(LONG_TEXT, "chat").await.unwrap().unwrap();
        assert_eq!(candidate.title, "Sunset Yoga");
        assert_eq!(analyzer.stats().fallbacks, 1);

        let calls = model.calls();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[0].model, "gemini-2.5-flash");
        assert_eq!(calls[1].model, "gemini-2.5-flash");
        assert_eq!(calls[2].model, "gemini-2.5-flash-lite");
    }

    #[tokio::test]
    async fn non_transient_error_gives_up_immediately() {
        let model = Arc::new(MockChatModel::new());
        model.push_err(AiError::Other("invalid api key".to_string()));
        let analyzer = analyzer_with(model.clone());

        assert!(analyzer.extract(LONG_TEXT, "chat").await.is_err());
        assert_eq!(model.call_count(), 1);
    }

    #[tokio::test]
    async fn analyze_short_circuits_on_screen_rejection() {
        let model = Arc::new(MockChatModel::new());
        model.push_ok(r#"{"is_event": false}"#.to_string());
        let analyzer = analyzer_with(model.clone());

        assert!(analyzer.analyze(LONG_TEXT, "chat").await.is_none());
        // Only the screening call happened.
        assert_eq!(model.call_count(), 1);
    }

    #[tokio::test]
    async fn analyze_batch_preserves_order() {
        let model = Arc::new(MockChatModel::new().with_default_reply(event_json()));
        let analyzer = analyzer_with(model);

        let items = vec![
            (LONG_TEXT.to_string(), "a".to_string()),
            ("hi".to_string(), "b".to_string()),
            (LONG_TEXT.to_string(), "c".to_string()),
        ];
        let results = analyzer.analyze_batch(items, 4).await;
        assert_eq!(results.len(), 3);
        assert!(results[0].is_some());
        assert!(results[1].is_none());
        assert!(results[2].is_some());
    }

    #[test]
    fn list_replies_take_the_first_event() {
        let reply = format!("[{}, {{\"is_event\": false}}]", event_json());
        let candidate = parse_event_reply(&reply).unwrap().unwrap();
        assert_eq!(candidate.title, "Sunset Yoga");
    }

    #[test]
    fn rejection_and_non_objects_are_not_events() {
        assert!(parse_event_reply(r#"{"is_event": false}"#).unwrap().is_none());
        assert!(parse_event_reply("[]").unwrap().is_none());
        assert!(parse_event_reply(r#""just a string""#).unwrap().is_none());
    }

    #[test]
    fn unknown_category_coerces_to_chill() {
        let reply = r#"{"is_event": true, "title": "X", "category": "Rave", "summary": "s"}"#;
        let candidate = parse_event_reply(reply).unwrap().unwrap();
        assert_eq!(candidate.category, Category::Chill);
    }

    #[test]
    fn price_coercion_is_forgiving() {
        assert_eq!(coerce_price(Some(Value::String("250".to_string()))), 250);
        assert_eq!(coerce_price(Some(Value::String("free".to_string()))), 0);
        assert_eq!(coerce_price(Some(serde_json::json!(-100))), 0);
        assert_eq!(coerce_price(Some(serde_json::json!(299.9))), 299);
        assert_eq!(coerce_price(None), 0);
    }

    #[test]
    fn placeholder_fields_become_unknown() {
        let reply = r#"{"is_event": true, "title": "X", "date": "TBD", "time": "N/A",
                        "location_name": "", "summary": "s"}"#;
        let candidate = parse_event_reply(reply).unwrap().unwrap();
        assert!(candidate.date.is_none());
        assert!(candidate.time.is_none());
        assert!(candidate.location_name.is_none());
    }
}
