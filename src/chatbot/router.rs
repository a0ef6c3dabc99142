//! Conversation router - maps senders to provider conversations.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::info;

use crate::chatbot::provider::{ChatProvider, ConversationHandle, ProviderError};

/// Outcome of resolving a sender's conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub handle: ConversationHandle,
    pub is_new: bool,
}

/// A resolved conversation plus exclusive access to the sender.
///
/// While a `Turn` is alive no other turn for the same sender can start.
pub struct Turn {
    pub resolved: Resolved,
    _guard: OwnedMutexGuard<()>,
}

pub struct ConversationRouter {
    provider: Arc<dyn ChatProvider>,
    conversations: Mutex<HashMap<String, ConversationHandle>>,
    /// One lock per sender seen so far.
    sender_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl ConversationRouter {
    pub fn new(provider: Arc<dyn ChatProvider>) -> Self {
        Self {
            provider,
            conversations: Mutex::new(HashMap::new()),
            sender_locks: Mutex::new(HashMap::new()),
        }
    }

    async fn lock_sender(&self, sender_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.sender_locks.lock().await;
            locks
                .entry(sender_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }

    /// Resolve the sender's conversation and keep the sender locked until the turn is dropped.
    pub async fn begin_turn(&self, sender_id: &str) -> Result<Turn, ProviderError> {
        let guard = self.lock_sender(sender_id).await;

        if let Some(handle) = self.conversations.lock().await.get(sender_id).cloned() {
            return Ok(Turn {
                resolved: Resolved { handle, is_new: false },
                _guard: guard,
            });
        }

        let handle = self.provider.create_conversation().await?;
        self.conversations
            .lock()
            .await
            .insert(sender_id.to_string(), handle.clone());
        info!("[GPT] New conversation for {sender_id} (ID: {handle})");

        Ok(Turn {
            resolved: Resolved { handle, is_new: true },
            _guard: guard,
        })
    }

    /// Return the sender's conversation, creating one on first contact.
    pub async fn resolve(&self, sender_id: &str) -> Result<Resolved, ProviderError> {
        self.begin_turn(sender_id).await.map(|turn| turn.resolved)
    }

    /// Forget the sender's conversation and release it at the provider.
    /// No-op for unknown senders.
    pub async fn reset(&self, sender_id: &str) -> Option<ConversationHandle> {
        let removed = self.conversations.lock().await.remove(sender_id);

        // Only the map holds the lock when no turn is running or waiting.
        {
            let mut locks = self.sender_locks.lock().await;
            if locks.get(sender_id).is_some_and(|l| Arc::strong_count(l) == 1) {
                locks.remove(sender_id);
            }
        }

        if let Some(ref handle) = removed {
            self.provider.end_conversation(handle).await;
        }
        removed
    }

    pub async fn current(&self, sender_id: &str) -> Option<ConversationHandle> {
        self.conversations.lock().await.get(sender_id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.conversations.lock().await.len()
    }
}
