//! Mock collaborators for testing.
//!
//! Useful for exercising the pipeline without real AI or network calls.
//! Replies are scripted in FIFO order; every call is recorded for
//! call-count assertions.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{AiError, GeocodeError};
use crate::traits::ai::{ChatModel, ChatRequest};
use crate::traits::geocoder::Geocoder;
use crate::types::venue::VenueRecord;

/// Record of one call made to [`MockChatModel`].
#[derive(Debug, Clone)]
pub struct MockCall {
    /// Requested model id.
    pub model: String,

    /// User prompt the call carried.
    pub user: String,
}

/// Scripted AI collaborator.
///
/// Pops queued replies first; once the queue is empty, serves the default
/// reply if one is configured, otherwise errors.
#[derive(Default)]
pub struct MockChatModel {
    replies: Mutex<VecDeque<Result<String, AiError>>>,
    default_reply: Mutex<Option<String>>,
    calls: Mutex<Vec<MockCall>>,
}

impl MockChatModel {
    /// Create a mock with an empty script.
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve this reply whenever the script runs dry.
    pub fn with_default_reply(self, reply: String) -> Self {
        *self.default_reply.lock().unwrap() = Some(reply);
        self
    }

    /// Queue a successful reply.
    pub fn push_ok(&self, reply: String) {
        self.replies.lock().unwrap().push_back(Ok(reply));
    }

    /// Queue a failure.
    pub fn push_err(&self, err: AiError) {
        self.replies.lock().unwrap().push_back(Err(err));
    }

    /// All calls made so far.
    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of calls made so far.
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl ChatModel for MockChatModel {
    async fn generate(&self, request: &ChatRequest) -> Result<String, AiError> {
        self.calls.lock().unwrap().push(MockCall {
            model: request.model.clone(),
            user: request.user.clone(),
        });

        if let Some(scripted) = self.replies.lock().unwrap().pop_front() {
            return scripted;
        }
        match self.default_reply.lock().unwrap().clone() {
            Some(reply) => Ok(reply),
            None => Err(AiError::Other("no scripted reply".to_string())),
        }
    }
}

/// Scripted geocoder collaborator.
#[derive(Default)]
pub struct MockGeocoder {
    record: Option<VenueRecord>,
    calls: AtomicUsize,
}

impl MockGeocoder {
    /// A geocoder that never finds anything.
    pub fn new() -> Self {
        Self::default()
    }

    /// A geocoder that always returns this record.
    pub fn with_record(record: VenueRecord) -> Self {
        Self {
            record: Some(record),
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of lookups made so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl Geocoder for MockGeocoder {
    async fn geocode(&self, _query: &str) -> Result<Option<VenueRecord>, GeocodeError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        Ok(self.record.clone())
    }
}
