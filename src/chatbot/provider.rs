//! Contracts for the hosted AI services.

use async_trait::async_trait;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Opaque conversation token issued by the chat provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConversationHandle(String);

impl ConversationHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConversationHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("HTTP error: {0}")]
    Http(String),
    #[error("API error: {0}")]
    Api(String),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Empty response")]
    Empty,
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("unknown conversation {0}")]
    UnknownConversation(ConversationHandle),
}

/// Moderation result for one prompt.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModerationVerdict {
    pub flagged: bool,
    /// Blacklisted categories that were hit, in blacklist order.
    pub categories: Vec<String>,
}

#[async_trait]
pub trait ChatProvider: Send + Sync {
    async fn create_conversation(&self) -> Result<ConversationHandle, ProviderError>;

    async fn ask(&self, prompt: &str, conversation: &ConversationHandle) -> Result<String, ProviderError>;

    /// Drop any state kept for a conversation that won't be asked again.
    async fn end_conversation(&self, conversation: &ConversationHandle);
}

#[async_trait]
pub trait ModerationProvider: Send + Sync {
    async fn check(&self, prompt: &str, categories: &[String]) -> Result<ModerationVerdict, ProviderError>;
}

#[async_trait]
pub trait ImageProvider: Send + Sync {
    /// Generate an image, returning the encoded image bytes.
    async fn generate(&self, prompt: &str) -> Result<Vec<u8>, ProviderError>;
}
