//! Chatbot module - relays chat messages to the hosted AI API.

pub mod commands;
pub mod handler;
pub mod moderation;
pub mod provider;
pub mod router;
pub mod telegram;


pub use commands::{parse_command, Command};
pub use handler::{MessageHandler, Reply, RESET_CONFIRMATION};
pub use moderation::{ModerationError, ModerationGate};
pub use provider::{ChatProvider, ConversationHandle, ImageProvider, ModerationProvider, ModerationVerdict, ProviderError};
pub use router::{ConversationRouter, Resolved};
pub use telegram::TelegramClient;
