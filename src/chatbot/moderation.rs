//! Prompt moderation gate.

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

use crate::chatbot::provider::{ModerationProvider, ProviderError};

#[derive(Debug, Error)]
pub enum ModerationError {
    #[error("Prompt was rejected by the moderation system. Reason: {0}")]
    Rejected(String),
    #[error("Moderation service unavailable: {0}")]
    Unavailable(#[source] ProviderError),
}

pub struct ModerationGate {
    provider: Arc<dyn ModerationProvider>,
    blacklist: Vec<String>,
    timeout: Duration,
}

impl ModerationGate {
    pub fn new(provider: Arc<dyn ModerationProvider>, blacklist: Vec<String>, timeout: Duration) -> Self {
        Self { provider, blacklist, timeout }
    }

    pub fn blacklist(&self) -> &[String] {
        &self.blacklist
    }

    /// Screen a prompt against the blacklisted categories.
    pub async fn screen(&self, prompt: &str) -> Result<(), ModerationError> {
        let verdict = tokio::time::timeout(self.timeout, self.provider.check(prompt, &self.blacklist))
            .await
            .map_err(|_| ModerationError::Unavailable(ProviderError::Timeout(self.timeout)))?
            .map_err(|e| {
                warn!("Moderation check failed: {e}");
                ModerationError::Unavailable(e)
            })?;

        if !verdict.flagged {
            return Ok(());
        }

        let reason = if verdict.categories.is_empty() {
            "flagged content".to_string()
        } else {
            verdict.categories.join(", ")
        };
        info!("Prompt rejected by moderation: {reason}");
        Err(ModerationError::Rejected(reason))
    }
}
