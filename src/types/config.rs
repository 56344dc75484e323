//! Configuration for the analyzer and the venue enricher.

use std::time::Duration;

use crate::limits::RateQuota;

/// Configuration for the two-stage analyzer.
#[derive(Debug, Clone)]
pub struct AnalyzerConfig {
    /// Cheap model used for the pre-screen stage.
    pub screen_model: String,

    /// Primary model used for extraction.
    pub extract_model: String,

    /// Cheaper model extraction falls back to after repeated transient
    /// failures on the primary.
    pub fallback_model: String,

    /// Region the prompts anchor dates and venues to.
    pub region: String,

    /// Pre-screen request budget.
    pub screen_quota: RateQuota,

    /// Extraction request budget (tighter; extraction is the expensive stage).
    pub extract_quota: RateQuota,

    /// Texts shorter than this skip the pre-screen AI call entirely.
    pub min_screen_len: usize,

    /// Pre-screen user prompt truncation.
    pub screen_text_limit: usize,

    /// Extraction user prompt truncation.
    pub extract_text_limit: usize,

    /// Per-request timeout enforced by the calling layer.
    pub request_timeout: Duration,

    /// Delay before retrying a transient extraction failure.
    pub retry_delay: Duration,

    /// Delay before the single retry after a malformed reply.
    pub malformed_retry_delay: Duration,

    /// Treat pre-screen errors as "passed to extraction".
    ///
    /// Trades wasted extraction calls for recall; turn off to drop messages
    /// whose pre-screen call failed.
    pub fail_open: bool,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            screen_model: "gemini-2.5-flash-lite".to_string(),
            extract_model: "gemini-2.5-flash".to_string(),
            fallback_model: "gemini-2.5-flash-lite".to_string(),
            region: "Koh Phangan".to_string(),
            screen_quota: RateQuota::per_minute(500),
            extract_quota: RateQuota::per_minute(100),
            min_screen_len: 30,
            screen_text_limit: 1000,
            extract_text_limit: 2000,
            request_timeout: Duration::from_secs(60),
            retry_delay: Duration::from_secs(3),
            malformed_retry_delay: Duration::from_secs(1),
            fail_open: true,
        }
    }
}

impl AnalyzerConfig {
    /// Create a config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the models used by the two stages.
    pub fn with_models(
        mut self,
        screen: impl Into<String>,
        extract: impl Into<String>,
        fallback: impl Into<String>,
    ) -> Self {
        self.screen_model = screen.into();
        self.extract_model = extract.into();
        self.fallback_model = fallback.into();
        self
    }

    /// Set the region the prompts anchor to.
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    /// Set the fail-open policy for pre-screen errors.
    pub fn with_fail_open(mut self, fail_open: bool) -> Self {
        self.fail_open = fail_open;
        self
    }

    /// Set both request budgets.
    pub fn with_quotas(mut self, screen: RateQuota, extract: RateQuota) -> Self {
        self.screen_quota = screen;
        self.extract_quota = extract;
        self
    }

    /// Shrink retry delays, for tests.
    pub fn with_retry_delays(mut self, retry: Duration, malformed: Duration) -> Self {
        self.retry_delay = retry;
        self.malformed_retry_delay = malformed;
        self
    }
}

/// Configuration for the venue enricher.
#[derive(Debug, Clone)]
pub struct EnricherConfig {
    /// Primary geocoding model.
    pub model: String,

    /// Cheaper model used as the last AI attempt.
    pub fallback_model: String,

    /// Geographic hint appended to ambiguous queries.
    pub region_hint: String,

    /// Pattern detecting that a name already carries the hint.
    pub hint_pattern: String,

    /// Geocoding request budget.
    pub quota: RateQuota,

    /// Attempts per model call before giving up on it.
    pub max_call_attempts: u32,

    /// Base of the exponential backoff between call attempts.
    pub backoff_base: Duration,

    /// Per-request timeout enforced by the calling layer.
    pub request_timeout: Duration,
}

impl Default for EnricherConfig {
    fn default() -> Self {
        Self {
            model: "gemini-2.5-flash".to_string(),
            fallback_model: "gemini-2.5-flash-lite".to_string(),
            region_hint: "Koh Phangan".to_string(),
            hint_pattern: r"(?i)phangan|панган".to_string(),
            quota: RateQuota::per_minute(100),
            max_call_attempts: 3,
            backoff_base: Duration::from_secs(2),
            request_timeout: Duration::from_secs(60),
        }
    }
}

impl EnricherConfig {
    /// Create a config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the primary and fallback models.
    pub fn with_models(mut self, model: impl Into<String>, fallback: impl Into<String>) -> Self {
        self.model = model.into();
        self.fallback_model = fallback.into();
        self
    }

    /// Set the geographic hint and its detection pattern.
    pub fn with_region_hint(
        mut self,
        hint: impl Into<String>,
        pattern: impl Into<String>,
    ) -> Self {
        self.region_hint = hint.into();
        self.hint_pattern = pattern.into();
        self
    }

    /// Shrink the backoff, for tests.
    pub fn with_backoff_base(mut self, base: Duration) -> Self {
        self.backoff_base = base;
        self
    }
}
