//! Integration tests: personal config document through to the runtime config and persona prompt.

use std::collections::HashMap;
use std::io::Write;

use persona_relay::chatbot::{parse_command, Command};
use persona_relay::config::{PersonalConfig, RuntimeConfig};
use persona_relay::persona::render_persona_prompt;
use tempfile::NamedTempFile;

const DOCUMENT: &str = r#"{
    "traits": {
        "masterName": "Priya",
        "masterInfo": "Software engineer, loves hiking",
        "masterPersonality": "warm, concise, a bit sarcastic",
        "botCaveats": "Never agree to meetings on Priya's behalf",
        "botFallback": "hmm not sure, ask me later"
    },
    "triggers": {
        "aiChat": "!gpt",
        "aiReset": "!reset",
        "chatPlatform": "Telegram"
    },
    "training": {
        "masterChatExamples": ["omw!", "lol that's wild", "can't tonight, tmrw?"]
    },
    "responsePreferences": { "maxTokens": 400, "temperature": 0.8, "generalMessageLength": 12 }
}"#;

fn load() -> PersonalConfig {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(DOCUMENT.as_bytes()).unwrap();
    PersonalConfig::load(file.path()).expect("document should load")
}

#[test]
fn test_document_to_runtime_config() {
    let personal = load();
    let env: HashMap<String, String> = [("RESET_PREFIX".to_string(), "!forget".to_string())].into_iter().collect();
    let config = RuntimeConfig::build(&personal, &env);

    assert_eq!(config.prefixes.chat, "!gpt");
    assert_eq!(config.prefixes.reset, "!forget");
    assert_eq!(config.prefixes.image, "@ai-img");
    assert_eq!(config.provider.max_tokens, Some(400));
    assert_eq!(config.persona_prompt.as_deref(), Some(render_persona_prompt(&personal).as_str()));

    assert_eq!(parse_command("!forget", &config.prefixes), Some(Command::Reset));
    assert_eq!(parse_command("!gpt hey", &config.prefixes), Some(Command::Chat("hey".into())));
}

#[test]
fn test_persona_prompt_contents() {
    let prompt = render_persona_prompt(&load());
    assert!(prompt.contains("Master name: Priya"));
    assert!(prompt.contains("reply with hmm not sure, ask me later."));
    assert!(prompt.contains("   Example Chat styles: ----\n"));
    assert!(prompt.contains("   ---\n   omw!\nlol that's wild\ncan't tonight, tmrw?\n   ---\n"));
    assert!(prompt.trim_end().ends_with("Never agree to meetings on Priya's behalf"));
}

#[test]
fn test_same_document_same_prompt() {
    let a = RuntimeConfig::build(&load(), &HashMap::<String, String>::new());
    let b = RuntimeConfig::build(&load(), &HashMap::<String, String>::new());
    assert_eq!(a.persona_prompt, b.persona_prompt);
}
