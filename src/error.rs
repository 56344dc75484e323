//! Typed errors for the detection pipeline.
//!
//! Uses `thiserror` for library errors (not `anyhow`) to provide
//! strongly-typed, composable error handling. Only the AI boundary and the
//! storage boundary can fail; every in-process stage returns a negative
//! result instead of an error.

use thiserror::Error;

/// Errors surfaced by the AI collaborator.
///
/// Adapters wrapping a concrete AI service classify raw failures into these
/// variants; the retry/fallback state machines key off [`AiError::is_transient`].
#[derive(Debug, Error)]
pub enum AiError {
    /// Server-side transient failure (5xx-equivalents, deadline exceeded).
    #[error("transient AI failure: {0}")]
    Transient(String),

    /// Request budget exhausted on the provider side. Retryable.
    #[error("AI quota exceeded: {0}")]
    Quota(String),

    /// The reply did not decode to the declared schema.
    #[error("malformed AI output: {0}")]
    Malformed(String),

    /// The reply carried no text at all.
    #[error("empty AI response")]
    Empty,

    /// Anything else: auth failures, bad requests, local I/O.
    #[error("AI call failed: {0}")]
    Other(String),
}

/// Error-message signatures that mark a failure as transient.
///
/// Matched case-sensitively except for the lowercased timeout probe, mirroring
/// how upstream services spell their status strings.
const TRANSIENT_SIGNATURES: &[&str] = &[
    "503",
    "504",
    "500",
    "499",
    "429",
    "UNAVAILABLE",
    "DEADLINE",
    "CANCELLED",
    "ResourceExhausted",
    "Quota",
    "ServerError",
    "TOO_MANY_TOOL_CALLS",
];

impl AiError {
    /// Whether the retry machinery should try again after this error.
    pub fn is_transient(&self) -> bool {
        matches!(self, AiError::Transient(_) | AiError::Quota(_))
    }

    /// Classify a raw error message from an AI adapter.
    ///
    /// Useful for adapters that only see stringly-typed provider errors.
    pub fn classify(message: impl Into<String>) -> Self {
        let message = message.into();
        let lowered = message.to_lowercase();
        if lowered.contains("quota") || message.contains("429") {
            return AiError::Quota(message);
        }
        if TRANSIENT_SIGNATURES.iter().any(|sig| message.contains(sig))
            || lowered.contains("timed out")
            || lowered.contains("timeout")
        {
            return AiError::Transient(message);
        }
        AiError::Other(message)
    }
}

/// Errors surfaced by the durable storage collaborator.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store cannot be reached. Fatal to the affected pipeline unit.
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// A query failed for reasons other than connectivity.
    #[error("storage query failed: {0}")]
    Query(String),
}

/// Errors surfaced by the conventional geocoding fallback.
#[derive(Debug, Error)]
pub enum GeocodeError {
    /// HTTP transport failure.
    #[error("geocoding request failed: {0}")]
    Http(String),

    /// The service answered with something other than a result set.
    #[error("geocoding service error: {0}")]
    Service(String),
}

impl From<reqwest::Error> for GeocodeError {
    fn from(err: reqwest::Error) -> Self {
        GeocodeError::Http(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_transient_signatures() {
        assert!(AiError::classify("503 Service Unavailable").is_transient());
        assert!(AiError::classify("DEADLINE_EXCEEDED").is_transient());
        assert!(AiError::classify("request timed out").is_transient());
        assert!(matches!(
            AiError::classify("429 Too Many Requests"),
            AiError::Quota(_)
        ));
        assert!(!AiError::classify("invalid api key").is_transient());
    }
}
