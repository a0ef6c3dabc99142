//! Telegram client using teloxide.

use teloxide::prelude::*;
use teloxide::types::{InputFile, MessageId, ReplyParameters};
use tracing::warn;

use crate::chatbot::handler::Reply;

/// Telegram limit for a single text message.
const MAX_MESSAGE_CHARS: usize = 4096;

/// Telegram API client.
pub struct TelegramClient {
    bot: Bot,
}

impl TelegramClient {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }

    pub async fn send_message(&self, chat_id: ChatId, text: &str, reply_to: Option<MessageId>) -> Result<(), String> {
        // Long answers are split on char boundaries.
        let chars: Vec<char> = text.chars().collect();
        for chunk in chars.chunks(MAX_MESSAGE_CHARS) {
            let chunk: String = chunk.iter().collect();
            let mut request = self.bot.send_message(chat_id, chunk);
            if let Some(id) = reply_to {
                request = request.reply_parameters(ReplyParameters::new(id));
            }
            request.await.map_err(|e| {
                let msg = format!("Failed to send: {e}");
                warn!("{}", msg);
                msg
            })?;
        }
        Ok(())
    }

    pub async fn send_photo(&self, chat_id: ChatId, image: Vec<u8>, reply_to: Option<MessageId>) -> Result<(), String> {
        let mut request = self
            .bot
            .send_photo(chat_id, InputFile::memory(image).file_name("image.png"));
        if let Some(id) = reply_to {
            request = request.reply_parameters(ReplyParameters::new(id));
        }
        request.await.map(|_| ()).map_err(|e| {
            let msg = format!("Failed to send photo: {e}");
            warn!("{}", msg);
            msg
        })
    }

    pub async fn send_reply(&self, chat_id: ChatId, reply: Reply, reply_to: Option<MessageId>) -> Result<(), String> {
        match reply {
            Reply::Text(text) => self.send_message(chat_id, &text, reply_to).await,
            Reply::Image(bytes) => self.send_photo(chat_id, bytes, reply_to).await,
        }
    }
}
