//! Incoming message as delivered by the transport collaborator.

/// A raw chat message handed to the pipeline.
///
/// Transient: the pipeline never persists this shape, only the original text
/// travels into [`crate::types::event::EventMeta`] for provenance.
#[derive(Debug, Clone, Default)]
pub struct RawMessage {
    /// Message text (may be empty for pure-media posts).
    pub text: String,

    /// Title of the chat the message arrived in.
    pub chat_title: Option<String>,

    /// Whether a photo/video flyer is attached.
    pub has_media: bool,

    /// Transport-level message identifier.
    pub message_id: Option<i64>,

    /// Transport-level chat identifier.
    pub chat_id: Option<i64>,

    /// Display name of the sender.
    pub sender: Option<String>,
}

impl RawMessage {
    /// Create a message carrying only text.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    /// Set the chat title.
    pub fn with_chat_title(mut self, title: impl Into<String>) -> Self {
        self.chat_title = Some(title.into());
        self
    }

    /// Mark the message as carrying media.
    pub fn with_media(mut self, has_media: bool) -> Self {
        self.has_media = has_media;
        self
    }

    /// Set transport identifiers.
    pub fn with_ids(mut self, chat_id: i64, message_id: i64) -> Self {
        self.chat_id = Some(chat_id);
        self.message_id = Some(message_id);
        self
    }

    /// Set the sender display name.
    pub fn with_sender(mut self, sender: impl Into<String>) -> Self {
        self.sender = Some(sender.into());
        self
    }

    /// Chat title or a placeholder for direct chats.
    pub fn chat_title_or_default(&self) -> &str {
        self.chat_title.as_deref().unwrap_or("")
    }
}
