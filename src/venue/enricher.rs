//! Venue enrichment: free-text venue name → geographic coordinates.
//!
//! Flow per name:
//!   1. Normalize and check the cache; any hit (positive or negative)
//!      returns without an AI call.
//!   2. On miss, consume an ordered plan of (query, model) attempts:
//!      raw name, name with a geographic hint, transliterated name with the
//!      hint for Cyrillic input, then the cheaper fallback model.
//!   3. If every AI attempt fails and a conventional geocoder is configured,
//!      try it once.
//!   4. Whatever the outcome, write a cache entry before returning so an
//!      unresolvable name is paid for once.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, LazyLock};

use regex::Regex;
use schemars::JsonSchema;
use serde::Deserialize;
use tokio::time::{sleep, timeout};
use tracing::{debug, error, info, warn};

use crate::error::AiError;
use crate::limits::RateLimit;
use crate::traits::ai::{ChatModel, ChatRequest};
use crate::traits::geocoder::Geocoder;
use crate::types::config::EnricherConfig;
use crate::types::event::{is_placeholder, EventCandidate};
use crate::types::venue::{VenueLookup, VenueRecord};
use crate::venue::cache::VenueCache;
use crate::venue::normalize::{contains_cyrillic, transliterate};

const VENUE_SYSTEM_PROMPT: &str = r#"You geocode venue names for an offline event listing. Use web search when available. Venue names may contain typos (e.g. "PlunkTone" = "PlankTone", "Кафе13" = "Cafe 13") and may be written in Russian or English.

Reply STRICTLY with a valid JSON object matching this schema:
{
  "found": boolean,
  "name": "string or null",
  "lat": float or null,
  "lng": float or null,
  "map_url": "string or null",
  "address": "string or null"
}
CRITICAL RULES:
1. Do not wrap the JSON in markdown blocks (e.g. ```json).
2. Use DOUBLE quotes for all property names and strings.
3. ABSOLUTELY NO comments inside the JSON.
4. ABSOLUTELY NO trailing commas."#;

fn venue_user_prompt(name: &str, region_hint: &str) -> String {
    format!(
        "Find \"{name}\" on the map near {region_hint}. \
         If it is not there, check the neighbouring areas. \
         Return the official map name, coordinates and address."
    )
}

/// Wire shape of a geocoding reply.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub(crate) struct VenueReply {
    #[serde(default = "default_found")]
    pub found: bool,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lng: Option<f64>,
    #[serde(default)]
    pub map_url: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
}

fn default_found() -> bool {
    true
}

impl VenueReply {
    fn not_found() -> Self {
        Self {
            found: false,
            name: None,
            lat: None,
            lng: None,
            map_url: None,
            address: None,
        }
    }
}

/// Counters for the enricher, shared across pipeline units.
#[derive(Debug, Default)]
pub struct EnricherStats {
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    enriched: AtomicU64,
    not_found: AtomicU64,
    fallbacks: AtomicU64,
    errors: AtomicU64,
}

/// Point-in-time view of [`EnricherStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnricherStatsSnapshot {
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub enriched: u64,
    pub not_found: u64,
    pub fallbacks: u64,
    pub errors: u64,
}

impl EnricherStats {
    fn snapshot(&self) -> EnricherStatsSnapshot {
        EnricherStatsSnapshot {
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            enriched: self.enriched.load(Ordering::Relaxed),
            not_found: self.not_found.load(Ordering::Relaxed),
            fallbacks: self.fallbacks.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

/// AI-backed venue enricher over the two-tier cache.
pub struct VenueEnricher {
    model: Arc<dyn ChatModel>,
    geocoder: Option<Arc<dyn Geocoder>>,
    cache: VenueCache,
    limiter: RateLimit,
    hint_re: Regex,
    config: EnricherConfig,
    stats: EnricherStats,
}

impl VenueEnricher {
    /// Create an enricher over a model and a cache.
    pub fn new(model: Arc<dyn ChatModel>, cache: VenueCache, config: EnricherConfig) -> Self {
        let hint_re = Regex::new(&config.hint_pattern).expect("hint pattern");
        Self {
            model,
            geocoder: None,
            cache,
            limiter: config.quota.limiter(),
            hint_re,
            config,
            stats: EnricherStats::default(),
        }
    }

    /// Attach a conventional geocoder as the final fallback.
    pub fn with_geocoder(mut self, geocoder: Arc<dyn Geocoder>) -> Self {
        self.geocoder = Some(geocoder);
        self
    }

    /// The underlying cache.
    pub fn cache(&self) -> &VenueCache {
        &self.cache
    }

    /// Current counters.
    pub fn stats(&self) -> EnricherStatsSnapshot {
        self.stats.snapshot()
    }

    /// Resolve a venue name to a record, fail-soft.
    ///
    /// Returns `None` for empty/placeholder names, cached misses and names
    /// nothing could resolve. Never propagates an error.
    pub async fn enrich(&self, venue_name: &str) -> Option<VenueRecord> {
        let name = venue_name.trim();
        if name.is_empty() || is_placeholder(name) {
            return None;
        }

        if let Some(hit) = self.cache.get_or_load(name).await {
            self.stats.cache_hits.fetch_add(1, Ordering::Relaxed);
            return hit.into_record();
        }
        self.stats.cache_misses.fetch_add(1, Ordering::Relaxed);

        self.limiter.acquire().await;

        for (query, model) in self.attempt_plan(name) {
            match self.call_model(&model, &query).await {
                Ok(reply) => {
                    if model != self.config.model {
                        self.stats.fallbacks.fetch_add(1, Ordering::Relaxed);
                    }
                    if reply.found {
                        if let Some(record) = validated_record(reply, name) {
                            self.cache
                                .put_through(name, &VenueLookup::Found(record.clone()))
                                .await;
                            self.stats.enriched.fetch_add(1, Ordering::Relaxed);
                            info!(
                                venue = name,
                                via = %query,
                                lat = record.lat,
                                lng = record.lng,
                                "venue enriched"
                            );
                            return Some(record);
                        }
                    }
                    debug!(via = %query, %model, "no coordinates, trying next attempt");
                }
                Err(err) if model != self.config.fallback_model => {
                    self.stats.fallbacks.fetch_add(1, Ordering::Relaxed);
                    warn!(via = %query, %model, %err, "geocode attempt failed, trying next");
                }
                Err(err) => {
                    self.stats.errors.fetch_add(1, Ordering::Relaxed);
                    error!(via = %query, %model, %err, "geocode fallback model failed");
                }
            }
        }

        if let Some(geocoder) = &self.geocoder {
            match geocoder.geocode(name).await {
                Ok(Some(record)) => {
                    self.stats.fallbacks.fetch_add(1, Ordering::Relaxed);
                    self.stats.enriched.fetch_add(1, Ordering::Relaxed);
                    self.cache
                        .put_through(name, &VenueLookup::Found(record.clone()))
                        .await;
                    info!(venue = name, "resolved via geocoding API fallback");
                    return Some(record);
                }
                Ok(None) => {}
                Err(err) => warn!(venue = name, %err, "geocoding API fallback failed"),
            }
        }

        // Remember the miss: unresolvable names must not be paid for twice.
        self.cache.put_through(name, &VenueLookup::NotFound).await;
        self.stats.not_found.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Attach a venue to the candidate when its location resolves.
    ///
    /// A candidate left without `venue` has no resolvable physical location.
    pub async fn enrich_event(&self, candidate: &mut EventCandidate) {
        let Some(location) = candidate.location_name.clone() else {
            return;
        };
        candidate.venue = self.enrich(&location).await;
    }

    /// Ordered (query, model) attempts for one name.
    fn attempt_plan(&self, name: &str) -> Vec<(String, String)> {
        let hint = &self.config.region_hint;
        let mut plan = vec![(name.to_string(), self.config.model.clone())];

        if !self.hint_re.is_match(name) {
            plan.push((format!("{name} {hint}"), self.config.model.clone()));
        }
        if contains_cyrillic(name) {
            let translit = transliterate(name).trim().to_string();
            debug!(venue = name, %translit, "cyrillic name, adding transliterated attempt");
            plan.push((format!("{translit} {hint}"), self.config.model.clone()));
        }
        plan.push((name.to_string(), self.config.fallback_model.clone()));
        plan
    }

    /// One model call with bounded retries and exponential backoff on
    /// transient failures. Malformed output is not retried here; the caller
    /// moves on to the next attempt in the plan.
    async fn call_model(&self, model: &str, query: &str) -> Result<VenueReply, AiError> {
        let request = ChatRequest::new(
            model,
            VENUE_SYSTEM_PROMPT,
            venue_user_prompt(query, &self.config.region_hint),
        )
        .with_temperature(0.1)
        .with_schema::<VenueReply>()
        .with_web_search();

        let max_attempts = self.config.max_call_attempts.max(1);
        for attempt in 1..=max_attempts {
            let outcome = match timeout(self.config.request_timeout, self.model.generate(&request))
                .await
            {
                Ok(Ok(text)) => parse_venue_reply(&text),
                Ok(Err(err)) => Err(err),
                Err(_) => Err(AiError::Transient("request timed out".to_string())),
            };

            match outcome {
                Ok(reply) => return Ok(reply),
                Err(err) if err.is_transient() && attempt < max_attempts => {
                    let wait = self.config.backoff_base * 2u32.pow(attempt - 1);
                    warn!(
                        %model,
                        attempt,
                        max_attempts,
                        wait_ms = wait.as_millis() as u64,
                        %err,
                        "transient geocode failure, backing off"
                    );
                    sleep(wait).await;
                }
                Err(err) => return Err(err),
            }
        }
        Err(AiError::Transient("geocode attempts exhausted".to_string()))
    }
}

fn validated_record(reply: VenueReply, fallback_name: &str) -> Option<VenueRecord> {
    let (lat, lng) = (reply.lat?, reply.lng?);
    if !lat.is_finite() || !lng.is_finite() || (lat == 0.0 && lng == 0.0) {
        return None;
    }
    let name = reply
        .name
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| fallback_name.to_string());
    Some(VenueRecord {
        name,
        lat,
        lng,
        map_url: reply.map_url.unwrap_or_default(),
        address: reply.address.unwrap_or_default(),
    })
}

/// Defensive parse of a geocoding reply.
///
/// Models wrap JSON in code fences, concatenate two identical objects, answer
/// in prose, or truncate mid-object. The cascade: strip fences, cut at the
/// first object boundary, brace-extract, strict parse, prose "not found"
/// detection, and finally regex salvage of the coordinate pair.
pub(crate) fn parse_venue_reply(text: &str) -> Result<VenueReply, AiError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(AiError::Empty);
    }

    static CONCAT_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\}\s*\{").expect("concat pattern"));
    static BRACE_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?s)(\{.*\})").expect("brace pattern"));

    let mut body = trimmed
        .replace("```json", "")
        .replace("```", "")
        .trim()
        .to_string();

    if CONCAT_RE.is_match(&body) {
        if let Some(first) = CONCAT_RE.split(&body).next() {
            body = format!("{first}}}");
        }
    }

    if let Some(found) = BRACE_RE.captures(&body).and_then(|c| c.get(1)) {
        body = found.as_str().trim().to_string();
    }

    match serde_json::from_str::<VenueReply>(&body) {
        Ok(reply) => Ok(reply),
        Err(parse_err) => {
            let lowered = body.to_lowercase();
            if lowered.contains("no results")
                || lowered.contains("not found")
                || lowered.contains("not find")
            {
                return Ok(VenueReply::not_found());
            }
            salvage_coordinates(&body)
                .ok_or_else(|| AiError::Malformed(parse_err.to_string()))
        }
    }
}

/// Last-resort extraction of a coordinate pair from truncated output.
fn salvage_coordinates(body: &str) -> Option<VenueReply> {
    static LAT_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r#"["']?lat["']?\s*:\s*(-?[0-9]+(?:\.[0-9]+)?)"#).expect("lat pattern")
    });
    static LNG_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r#"["']?lng["']?\s*:\s*(-?[0-9]+(?:\.[0-9]+)?)"#).expect("lng pattern")
    });
    static NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r#"["']?name["']?\s*:\s*["']([^"']+)["']"#).expect("name pattern")
    });

    let lat: f64 = LAT_RE.captures(body)?.get(1)?.as_str().parse().ok()?;
    let lng: f64 = LNG_RE.captures(body)?.get(1)?.as_str().parse().ok()?;
    debug!(lat, lng, "coordinates salvaged from truncated reply");
    Some(VenueReply {
        found: true,
        name: NAME_RE
            .captures(body)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().trim().to_string()),
        lat: Some(lat),
        lng: Some(lng),
        map_url: None,
        address: None,
    })
}
