use serde::{Deserialize, Deserializer};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

use crate::persona::render_persona_prompt;

/// Default location of the personal configuration document.
pub const DEFAULT_CONFIG_PATH: &str = "bot-config.json";

pub const DEFAULT_CHAT_PREFIX: &str = "@ai";
pub const DEFAULT_IMAGE_PREFIX: &str = "@ai-img";
pub const DEFAULT_RESET_PREFIX: &str = "@ai-reset";
pub const DEFAULT_ADMIN_PREFIX: &str = "@ai-admin";

const DEFAULT_MAX_MODEL_TOKENS: u32 = 500;
const DEFAULT_PROVIDER_TIMEOUT_SECS: u64 = 60;
const DEFAULT_MODERATION_TIMEOUT_SECS: u64 = 15;

/// Moderation categories blacklisted when no override is configured.
pub const DEFAULT_BLACKLISTED_CATEGORIES: [&str; 7] = [
    "hate",
    "hate/threatening",
    "self-harm",
    "sexual",
    "sexual/minors",
    "violence",
    "violence/graphic",
];

/// Errors that can occur when loading the personal configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{}': {source}", path.display())]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("failed to parse config file '{}': {source}", path.display())]
    ParseJson { path: PathBuf, source: serde_json::Error },
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Traits {
    pub master_name: Option<String>,
    pub master_info: Option<String>,
    pub master_personality: Option<String>,
    pub bot_personality: Option<String>,
    pub bot_caveats: Option<String>,
    pub bot_fallback: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Triggers {
    pub ai_chat: Option<String>,
    pub ai_image: Option<String>,
    pub ai_reset: Option<String>,
    pub ai_admin: Option<String>,
    pub chat_platform: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Training {
    #[serde(default, deserialize_with = "string_or_list")]
    pub master_chat_examples: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponsePreferences {
    #[serde(default, deserialize_with = "lenient_u32")]
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub general_message_length: Option<u32>,
}

/// The personal configuration document. Read-only once loaded.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonalConfig {
    #[serde(default)]
    pub traits: Traits,
    #[serde(default)]
    pub triggers: Triggers,
    #[serde(default)]
    pub training: Training,
    #[serde(default)]
    pub response_preferences: ResponsePreferences,
}

impl PersonalConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref().to_path_buf();
        let content = std::fs::read_to_string(&path)
            .map_err(|e| ConfigError::ReadFile { path: path.clone(), source: e })?;
        Self::from_json(&content).map_err(|e| ConfigError::ParseJson { path, source: e })
    }

    pub fn from_json(content: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(content)
    }
}

/// Examples used to be a single pre-joined string; newer documents use a list.
fn string_or_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Examples {
        One(String),
        Many(Vec<String>),
    }

    Ok(match Option::<Examples>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(Examples::One(s)) if s.is_empty() => Vec::new(),
        Some(Examples::One(s)) => vec![s],
        Some(Examples::Many(v)) => v,
    })
}

fn lenient_u32<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrString {
        Number(u32),
        Text(String),
    }

    Ok(match Option::<NumberOrString>::deserialize(deserializer)? {
        None => None,
        Some(NumberOrString::Number(n)) => Some(n),
        Some(NumberOrString::Text(s)) => s.trim().parse().ok(),
    })
}

/// Source of environment overrides.
pub trait EnvSource {
    fn var(&self, key: &str) -> Option<String>;
}

/// Reads the real process environment.
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

impl EnvSource for HashMap<String, String> {
    fn var(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

/// Resolved trigger prefixes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerPrefixes {
    pub chat: String,
    pub image: String,
    pub reset: String,
    pub admin: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModerationSettings {
    pub enabled: bool,
    pub blacklisted_categories: Vec<String>,
}

/// Settings for the hosted AI API client.
#[derive(Debug, Clone)]
pub struct ProviderSettings {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub timeout: Duration,
    pub moderation_timeout: Duration,
}

/// Runtime configuration derived from the personal config plus environment.
///
/// Built once at startup and shared by reference; nothing here changes afterwards.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub prefixes: TriggerPrefixes,
    pub persona_prompt: Option<String>,
    pub groupchats_enabled: bool,
    pub moderation: ModerationSettings,
    /// Recognized but currently unused by the message handler.
    pub max_model_tokens: u32,
    pub provider: ProviderSettings,
}

impl RuntimeConfig {
    pub fn build(personal: &PersonalConfig, env: &impl EnvSource) -> Self {
        let triggers = &personal.triggers;
        let prefixes = TriggerPrefixes {
            chat: resolve_prefix(env, "GPT_PREFIX", triggers.ai_chat.as_deref(), DEFAULT_CHAT_PREFIX),
            image: resolve_prefix(env, "DALLE_PREFIX", triggers.ai_image.as_deref(), DEFAULT_IMAGE_PREFIX),
            reset: resolve_prefix(env, "RESET_PREFIX", triggers.ai_reset.as_deref(), DEFAULT_RESET_PREFIX),
            admin: resolve_prefix(env, "AI_CONFIG_PREFIX", triggers.ai_admin.as_deref(), DEFAULT_ADMIN_PREFIX),
        };

        let prefs = &personal.response_preferences;
        let provider = ProviderSettings {
            api_key: non_empty(env.var("OPENAI_API_KEY")),
            base_url: non_empty(env.var("OPENAI_BASE_URL"))
                .unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
            model: non_empty(env.var("OPENAI_MODEL")).unwrap_or_else(|| "gpt-3.5-turbo".to_string()),
            max_tokens: prefs.max_tokens,
            temperature: prefs.temperature,
            timeout: Duration::from_secs(env_u64(env, "PROVIDER_TIMEOUT_SECS", DEFAULT_PROVIDER_TIMEOUT_SECS)),
            moderation_timeout: Duration::from_secs(env_u64(
                env,
                "MODERATION_TIMEOUT_SECS",
                DEFAULT_MODERATION_TIMEOUT_SECS,
            )),
        };

        Self {
            prefixes,
            persona_prompt: Some(render_persona_prompt(personal)),
            groupchats_enabled: env_bool(env, "GROUPCHATS_ENABLED", false),
            moderation: ModerationSettings {
                enabled: env_bool(env, "PROMPT_MODERATION_ENABLED", false),
                blacklisted_categories: parse_blacklisted_categories(
                    env.var("PROMPT_MODERATION_BLACKLISTED_CATEGORIES").as_deref(),
                ),
            },
            max_model_tokens: parse_max_model_tokens(env.var("MAX_MODEL_TOKENS").as_deref()),
            provider,
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// First non-empty wins: environment, then document, then default.
fn resolve_prefix(env: &impl EnvSource, key: &str, document: Option<&str>, default: &str) -> String {
    non_empty(env.var(key))
        .or_else(|| document.filter(|d| !d.is_empty()).map(str::to_string))
        .unwrap_or_else(|| default.to_string())
}

fn env_bool(env: &impl EnvSource, key: &str, default: bool) -> bool {
    match env.var(key).map(|v| v.to_lowercase()) {
        None => default,
        Some(v) if v.is_empty() => default,
        Some(v) => v == "true",
    }
}

fn env_u64(env: &impl EnvSource, key: &str, default: u64) -> u64 {
    match non_empty(env.var(key)) {
        None => default,
        Some(v) => v.trim().parse().unwrap_or_else(|_| {
            warn!("Ignoring invalid {key}={v:?}, using {default}");
            default
        }),
    }
}

fn parse_max_model_tokens(value: Option<&str>) -> u32 {
    match value.filter(|v| !v.is_empty()) {
        None => DEFAULT_MAX_MODEL_TOKENS,
        Some(v) => v.trim().parse().unwrap_or_else(|_| {
            warn!("Ignoring invalid MAX_MODEL_TOKENS={v:?}, using {DEFAULT_MAX_MODEL_TOKENS}");
            DEFAULT_MAX_MODEL_TOKENS
        }),
    }
}

fn default_categories() -> Vec<String> {
    DEFAULT_BLACKLISTED_CATEGORIES.iter().map(|c| c.to_string()).collect()
}

/// Parses a list such as `['hate', 'violence']`. Malformed input falls back to the defaults.
pub fn parse_blacklisted_categories(value: Option<&str>) -> Vec<String> {
    let Some(raw) = value.filter(|v| !v.is_empty()) else {
        return default_categories();
    };
    let normalized = raw.replace('\'', "\"");
    match serde_json::from_str::<Vec<String>>(&normalized) {
        Ok(categories) => categories,
        Err(e) => {
            warn!("Malformed PROMPT_MODERATION_BLACKLISTED_CATEGORIES ({e}), using defaults");
            default_categories()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    fn assert_err<T>(result: Result<T, ConfigError>) -> ConfigError {
        match result {
            Ok(_) => panic!("expected error, got Ok"),
            Err(e) => e,
        }
    }

    #[test]
    fn test_valid_config() {
        let file = write_config(r#"{
            "traits": { "masterName": "Sam", "botFallback": "lol no" },
            "triggers": { "aiChat": "!bot", "chatPlatform": "Telegram" },
            "training": { "masterChatExamples": ["hey :)", "sure thing"] },
            "responsePreferences": { "maxTokens": "300", "temperature": 0.7, "generalMessageLength": 20 }
        }"#);
        let config = PersonalConfig::load(file.path()).expect("should load valid config");
        assert_eq!(config.traits.master_name.as_deref(), Some("Sam"));
        assert_eq!(config.triggers.ai_chat.as_deref(), Some("!bot"));
        assert_eq!(config.training.master_chat_examples, vec!["hey :)", "sure thing"]);
        assert_eq!(config.response_preferences.max_tokens, Some(300));
        assert_eq!(config.response_preferences.general_message_length, Some(20));
    }

    #[test]
    fn test_examples_as_single_string() {
        let config = PersonalConfig::from_json(r#"{ "training": { "masterChatExamples": "a\nb" } }"#).unwrap();
        assert_eq!(config.training.master_chat_examples, vec!["a\nb"]);

        let config = PersonalConfig::from_json(r#"{ "training": { "masterChatExamples": null } }"#).unwrap();
        assert!(config.training.master_chat_examples.is_empty());
    }

    #[test]
    fn test_file_not_found() {
        let err = assert_err(PersonalConfig::load("/nonexistent/path/bot-config.json"));
        assert!(matches!(err, ConfigError::ReadFile { .. }));
    }

    #[test]
    fn test_invalid_json() {
        let file = write_config("{ invalid json }");
        let err = assert_err(PersonalConfig::load(file.path()));
        assert!(matches!(err, ConfigError::ParseJson { .. }));
        assert!(err.to_string().contains("failed to parse"));
    }

    #[test]
    fn test_prefix_precedence() {
        let mut doc = PersonalConfig::default();

        let cfg = RuntimeConfig::build(&doc, &env(&[]));
        assert_eq!(cfg.prefixes.chat, "@ai");
        assert_eq!(cfg.prefixes.image, "@ai-img");
        assert_eq!(cfg.prefixes.reset, "@ai-reset");
        assert_eq!(cfg.prefixes.admin, "@ai-admin");

        let cfg = RuntimeConfig::build(&doc, &env(&[("GPT_PREFIX", "!env")]));
        assert_eq!(cfg.prefixes.chat, "!env");

        doc.triggers.ai_chat = Some("!doc".into());
        let cfg = RuntimeConfig::build(&doc, &env(&[]));
        assert_eq!(cfg.prefixes.chat, "!doc");

        let cfg = RuntimeConfig::build(&doc, &env(&[("GPT_PREFIX", "!env")]));
        assert_eq!(cfg.prefixes.chat, "!env");

        // Empty values don't count
        doc.triggers.ai_reset = Some(String::new());
        let cfg = RuntimeConfig::build(&doc, &env(&[("GPT_PREFIX", "")]));
        assert_eq!(cfg.prefixes.chat, "!doc");
        assert_eq!(cfg.prefixes.reset, "@ai-reset");
    }

    #[test]
    fn test_default_categories_in_order() {
        let cats = parse_blacklisted_categories(None);
        assert_eq!(
            cats,
            vec!["hate", "hate/threatening", "self-harm", "sexual", "sexual/minors", "violence", "violence/graphic"]
        );
        assert_eq!(parse_blacklisted_categories(Some("")), cats);
    }

    #[test]
    fn test_single_quoted_categories() {
        let cats = parse_blacklisted_categories(Some("['hate', 'violence/graphic']"));
        assert_eq!(cats, vec!["hate", "violence/graphic"]);
    }

    #[test]
    fn test_malformed_categories_fall_back() {
        let cats = parse_blacklisted_categories(Some("hate, violence"));
        assert_eq!(cats.len(), 7);
    }

    #[test]
    fn test_env_flags() {
        let doc = PersonalConfig::default();
        let cfg = RuntimeConfig::build(&doc, &env(&[]));
        assert!(!cfg.groupchats_enabled);
        assert!(!cfg.moderation.enabled);
        assert_eq!(cfg.max_model_tokens, 500);

        let cfg = RuntimeConfig::build(
            &doc,
            &env(&[
                ("GROUPCHATS_ENABLED", "TRUE"),
                ("PROMPT_MODERATION_ENABLED", "yes"),
                ("MAX_MODEL_TOKENS", "1024"),
            ]),
        );
        assert!(cfg.groupchats_enabled);
        assert!(!cfg.moderation.enabled);
        assert_eq!(cfg.max_model_tokens, 1024);

        let cfg = RuntimeConfig::build(&doc, &env(&[("MAX_MODEL_TOKENS", "lots")]));
        assert_eq!(cfg.max_model_tokens, 500);
    }

    #[test]
    fn test_independent_instances() {
        let doc = PersonalConfig::default();
        let a = RuntimeConfig::build(&doc, &env(&[("GPT_PREFIX", "!a")]));
        let b = RuntimeConfig::build(&doc, &env(&[("GPT_PREFIX", "!b")]));
        assert_eq!(a.prefixes.chat, "!a");
        assert_eq!(b.prefixes.chat, "!b");
    }

    #[test]
    fn test_provider_settings() {
        let mut doc = PersonalConfig::default();
        doc.response_preferences.max_tokens = Some(250);
        let cfg = RuntimeConfig::build(&doc, &env(&[("PROVIDER_TIMEOUT_SECS", "5"), ("OPENAI_MODEL", "gpt-4o-mini")]));
        assert_eq!(cfg.provider.model, "gpt-4o-mini");
        assert_eq!(cfg.provider.max_tokens, Some(250));
        assert_eq!(cfg.provider.timeout, Duration::from_secs(5));
        assert_eq!(cfg.provider.moderation_timeout, Duration::from_secs(15));
        assert!(cfg.provider.api_key.is_none());
    }
}
