//! Message handler - screens, routes and answers inbound prompts.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

use crate::chatbot::commands::Command;
use crate::chatbot::moderation::{ModerationError, ModerationGate};
use crate::chatbot::provider::{
    ChatProvider, ConversationHandle, ImageProvider, ModerationProvider, ProviderError,
};
use crate::chatbot::router::ConversationRouter;
use crate::config::RuntimeConfig;

pub const RESET_CONFIRMATION: &str = "Conversation context has been reset!";
const IMAGES_DISABLED: &str = "Image generation is not available.";

/// Reply text for a failed request (spelling intentional).
pub fn admin_contact_reply(error: &dyn std::fmt::Display) -> String {
    format!("An error occured, please contact the administrator. ({error})")
}

/// What to send back to the chat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Text(String),
    Image(Vec<u8>),
}

pub struct MessageHandler {
    config: Arc<RuntimeConfig>,
    router: ConversationRouter,
    chat: Arc<dyn ChatProvider>,
    moderation: Option<ModerationGate>,
    images: Option<Arc<dyn ImageProvider>>,
}

impl MessageHandler {
    pub fn new(
        config: Arc<RuntimeConfig>,
        chat: Arc<dyn ChatProvider>,
        moderation: Arc<dyn ModerationProvider>,
        images: Option<Arc<dyn ImageProvider>>,
    ) -> Self {
        let gate = config.moderation.enabled.then(|| {
            ModerationGate::new(
                moderation,
                config.moderation.blacklisted_categories.clone(),
                config.provider.moderation_timeout,
            )
        });

        Self {
            router: ConversationRouter::new(chat.clone()),
            config,
            chat,
            moderation: gate,
            images,
        }
    }

    pub fn router(&self) -> &ConversationRouter {
        &self.router
    }

    pub async fn dispatch(&self, sender_id: &str, command: Command) -> Reply {
        match command {
            Command::Chat(prompt) => Reply::Text(self.handle(sender_id, &prompt).await),
            Command::Image(prompt) => self.handle_image(sender_id, &prompt).await,
            Command::Reset => Reply::Text(self.handle_reset(sender_id).await),
            Command::Admin(args) => Reply::Text(self.handle_admin(&args)),
        }
    }

    /// Answer a chat prompt. Never fails: errors become reply text.
    pub async fn handle(&self, sender_id: &str, prompt: &str) -> String {
        if let Some(reply) = self.screen(prompt).await {
            return reply;
        }

        match self.converse(sender_id, prompt).await {
            Ok(response) => response,
            Err(e) => {
                error!("Chat request for {sender_id} failed: {e}");
                admin_contact_reply(&e)
            }
        }
    }

    pub async fn handle_reset(&self, sender_id: &str) -> String {
        match self.router.reset(sender_id).await {
            Some(handle) => info!("[GPT] Reset conversation for {sender_id} (ID: {handle})"),
            None => info!("[GPT] Reset requested by {sender_id} with no open conversation"),
        }
        RESET_CONFIRMATION.to_string()
    }

    pub async fn handle_image(&self, sender_id: &str, prompt: &str) -> Reply {
        let Some(ref images) = self.images else {
            return Reply::Text(IMAGES_DISABLED.to_string());
        };
        if let Some(reply) = self.screen(prompt).await {
            return Reply::Text(reply);
        }

        info!("[Image] Request from {sender_id}: {prompt}");
        let timeout = self.config.provider.timeout;
        let result = tokio::time::timeout(timeout, images.generate(prompt))
            .await
            .unwrap_or(Err(ProviderError::Timeout(timeout)));
        match result {
            Ok(bytes) => {
                info!("[Image] Generated {} bytes for {sender_id}", bytes.len());
                Reply::Image(bytes)
            }
            Err(e) => {
                error!("Image request for {sender_id} failed: {e}");
                Reply::Text(admin_contact_reply(&e))
            }
        }
    }

    /// Admin subcommands. Only `status` exists; it is also the default.
    pub fn handle_admin(&self, args: &str) -> String {
        match args.trim() {
            "" | "status" => self.admin_status(),
            other => format!("Unknown admin command: {other}. Available: status"),
        }
    }

    pub fn admin_status(&self) -> String {
        let cfg = &self.config;
        let moderation = if cfg.moderation.enabled { "enabled" } else { "disabled" };
        format!(
            "Prefixes: chat {}, image {}, reset {}, admin {}\n\
             Group chats: {}\n\
             Moderation: {} ({})\n\
             Max model tokens: {}",
            cfg.prefixes.chat,
            cfg.prefixes.image,
            cfg.prefixes.reset,
            cfg.prefixes.admin,
            if cfg.groupchats_enabled { "enabled" } else { "disabled" },
            moderation,
            cfg.moderation.blacklisted_categories.join(", "),
            cfg.max_model_tokens,
        )
    }

    /// Returns the reply to send instead of forwarding the prompt, if any.
    async fn screen(&self, prompt: &str) -> Option<String> {
        let gate = self.moderation.as_ref()?;
        match gate.screen(prompt).await {
            Ok(()) => None,
            Err(e @ ModerationError::Rejected(_)) => Some(e.to_string()),
            Err(e @ ModerationError::Unavailable(_)) => {
                warn!("{e}");
                Some(admin_contact_reply(&e))
            }
        }
    }

    async fn converse(&self, sender_id: &str, prompt: &str) -> Result<String, ProviderError> {
        let turn = self.router.begin_turn(sender_id).await?;
        let handle = &turn.resolved.handle;

        if turn.resolved.is_new
            && let Some(persona) = self.config.persona_prompt.as_deref()
            && !persona.trim().is_empty()
        {
            info!("[GPT] Pre prompt: {persona}");
            let seed_response = self.ask(persona, handle).await?;
            info!("[GPT] Pre prompt response: {seed_response}");
        }

        let start = Instant::now();
        let response = self.ask(prompt, handle).await?;
        let elapsed = start.elapsed().as_millis();
        info!("[GPT] Answer to {sender_id}: {response} | request took {elapsed}ms");

        Ok(response)
    }

    async fn ask(&self, prompt: &str, handle: &ConversationHandle) -> Result<String, ProviderError> {
        let timeout: Duration = self.config.provider.timeout;
        tokio::time::timeout(timeout, self.chat.ask(prompt, handle))
            .await
            .unwrap_or(Err(ProviderError::Timeout(timeout)))
    }
}
