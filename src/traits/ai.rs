//! AI collaborator trait.
//!
//! The pipeline never talks to a model provider directly: every call goes
//! through [`ChatModel`], and every reply crosses back as raw text that the
//! calling stage validates into a strongly-typed result. Nothing loosely
//! typed leaks past this boundary.

use async_trait::async_trait;
use schemars::schema::RootSchema;
use schemars::JsonSchema;
use serde::Serialize;

use crate::error::AiError;

/// A single request to the AI collaborator.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    /// Provider model identifier.
    pub model: String,

    /// System prompt carrying the stage's rules.
    pub system: String,

    /// User prompt with the message under analysis.
    pub user: String,

    /// Sampling temperature.
    pub temperature: f32,

    /// Reply token ceiling.
    pub max_tokens: u32,

    /// Structured-output schema the reply must conform to, when the
    /// provider supports constrained decoding.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_schema: Option<RootSchema>,

    /// Ask the provider to ground the reply with live web search.
    pub web_search: bool,
}

impl ChatRequest {
    /// Create a request with neutral sampling defaults.
    pub fn new(
        model: impl Into<String>,
        system: impl Into<String>,
        user: impl Into<String>,
    ) -> Self {
        Self {
            model: model.into(),
            system: system.into(),
            user: user.into(),
            temperature: 0.0,
            max_tokens: 8192,
            response_schema: None,
            web_search: false,
        }
    }

    /// Set the sampling temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Set the reply token ceiling.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Attach the JSON schema of `T` as the structured-output contract.
    pub fn with_schema<T: JsonSchema>(mut self) -> Self {
        self.response_schema = Some(schemars::schema_for!(T));
        self
    }

    /// Request web-search grounding.
    pub fn with_web_search(mut self) -> Self {
        self.web_search = true;
        self
    }
}

/// AI collaborator: accepts a request, returns the reply text.
///
/// Implementations wrap a concrete provider and classify its failures into
/// [`AiError`] variants so the retry state machines can tell transient
/// failures from fatal ones.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Run one generation request and return the raw reply text.
    async fn generate(&self, request: &ChatRequest) -> Result<String, AiError>;
}
