//! OpenAI-compatible API client: chat completions, moderations and images.

use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::debug;

use crate::chatbot::provider::{
    ChatProvider, ConversationHandle, ImageProvider, ModerationProvider, ModerationVerdict, ProviderError,
};
use crate::config::ProviderSettings;

const IMAGE_SIZE: &str = "512x512";

pub struct Client {
    api_key: String,
    base_url: String,
    model: String,
    max_tokens: Option<u32>,
    temperature: Option<f32>,
    http: reqwest::Client,
    /// Message history per conversation.
    conversations: Mutex<HashMap<ConversationHandle, Vec<ApiMessage>>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
struct ApiMessage {
    role: String,
    content: String,
}

impl ApiMessage {
    fn user(content: &str) -> Self {
        Self { role: "user".to_string(), content: content.to_string() }
    }

    fn assistant(content: &str) -> Self {
        Self { role: "assistant".to_string(), content: content.to_string() }
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ApiMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Serialize)]
struct ModerationRequest<'a> {
    input: &'a str,
}

#[derive(Deserialize)]
struct ModerationResponse {
    results: Vec<ModerationResult>,
}

#[derive(Deserialize)]
struct ModerationResult {
    categories: HashMap<String, bool>,
}

#[derive(Serialize)]
struct ImageRequest<'a> {
    prompt: &'a str,
    n: u32,
    size: &'static str,
    response_format: &'static str,
}

#[derive(Deserialize)]
struct ImageResponse {
    data: Vec<ImageData>,
}

#[derive(Deserialize)]
struct ImageData {
    b64_json: Option<String>,
}

impl Client {
    pub fn new(api_key: String, settings: &ProviderSettings) -> Result<Self, ProviderError> {
        let http = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|e| ProviderError::Http(e.to_string()))?;

        Ok(Self {
            api_key,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            model: settings.model.clone(),
            max_tokens: settings.max_tokens,
            temperature: settings.temperature,
            http,
            conversations: Mutex::new(HashMap::new()),
        })
    }

    async fn post<B: Serialize, R: for<'de> Deserialize<'de>>(&self, path: &str, body: &B) -> Result<R, ProviderError> {
        let response = self
            .http
            .post(format!("{}/{}", self.base_url, path))
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| ProviderError::Http(e.to_string()))?;

        let status = response.status();
        debug!("POST /{path} -> {status}");
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Api(format!("{status}: {body}")));
        }

        response.json().await.map_err(|e| ProviderError::Parse(e.to_string()))
    }
}

#[async_trait]
impl ChatProvider for Client {
    async fn create_conversation(&self) -> Result<ConversationHandle, ProviderError> {
        let handle = ConversationHandle::new(uuid::Uuid::new_v4().to_string());
        self.conversations.lock().await.insert(handle.clone(), Vec::new());
        Ok(handle)
    }

    async fn ask(&self, prompt: &str, conversation: &ConversationHandle) -> Result<String, ProviderError> {
        let mut messages = self
            .conversations
            .lock()
            .await
            .get(conversation)
            .cloned()
            .ok_or_else(|| ProviderError::UnknownConversation(conversation.clone()))?;
        messages.push(ApiMessage::user(prompt));

        let request = ChatRequest {
            model: &self.model,
            messages: &messages,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };
        let response: ChatResponse = self.post("chat/completions", &request).await?;
        let answer = response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or(ProviderError::Empty)?;

        // History only grows on success; the conversation may have been dropped meanwhile.
        if let Some(history) = self.conversations.lock().await.get_mut(conversation) {
            history.push(ApiMessage::user(prompt));
            history.push(ApiMessage::assistant(&answer));
        }
        Ok(answer)
    }

    async fn end_conversation(&self, conversation: &ConversationHandle) {
        self.conversations.lock().await.remove(conversation);
    }
}

/// Blacklisted categories marked true, in blacklist order.
fn blacklisted_hits(marked: &HashMap<String, bool>, blacklist: &[String]) -> Vec<String> {
    blacklist
        .iter()
        .filter(|c| marked.get(c.as_str()).copied().unwrap_or(false))
        .cloned()
        .collect()
}

#[async_trait]
impl ModerationProvider for Client {
    async fn check(&self, prompt: &str, categories: &[String]) -> Result<ModerationVerdict, ProviderError> {
        let response: ModerationResponse = self.post("moderations", &ModerationRequest { input: prompt }).await?;
        let result = response.results.into_iter().next().ok_or(ProviderError::Empty)?;
        let hits = blacklisted_hits(&result.categories, categories);
        Ok(ModerationVerdict { flagged: !hits.is_empty(), categories: hits })
    }
}

#[async_trait]
impl ImageProvider for Client {
    async fn generate(&self, prompt: &str) -> Result<Vec<u8>, ProviderError> {
        let request = ImageRequest { prompt, n: 1, size: IMAGE_SIZE, response_format: "b64_json" };
        let response: ImageResponse = self.post("images/generations", &request).await?;
        let encoded = response
            .data
            .into_iter()
            .next()
            .and_then(|d| d.b64_json)
            .ok_or(ProviderError::Empty)?;
        base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .map_err(|e| ProviderError::Parse(format!("invalid base64 image: {e}")))
    }
}
