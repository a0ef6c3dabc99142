//! Trigger-prefix command parsing.

use crate::config::TriggerPrefixes;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Chat(String),
    Image(String),
    Reset,
    Admin(String),
}

#[derive(Clone, Copy)]
enum Kind {
    Chat,
    Image,
    Reset,
    Admin,
}

/// Strip `prefix` from `text` if it is followed by whitespace or nothing.
fn strip_trigger<'a>(text: &'a str, prefix: &str) -> Option<&'a str> {
    let rest = text.strip_prefix(prefix)?;
    if rest.is_empty() || rest.starts_with(char::is_whitespace) {
        Some(rest.trim())
    } else {
        None
    }
}

/// Parse an inbound message. Returns `None` for text that isn't addressed to the bot.
///
/// Prefixes are tried longest first, so `@ai-reset` wins over `@ai`.
pub fn parse_command(text: &str, prefixes: &TriggerPrefixes) -> Option<Command> {
    let text = text.trim_start();
    let mut candidates = [
        (prefixes.chat.as_str(), Kind::Chat),
        (prefixes.image.as_str(), Kind::Image),
        (prefixes.reset.as_str(), Kind::Reset),
        (prefixes.admin.as_str(), Kind::Admin),
    ];
    candidates.sort_by_key(|(p, _)| std::cmp::Reverse(p.len()));

    for (prefix, kind) in candidates {
        if prefix.is_empty() {
            continue;
        }
        let Some(rest) = strip_trigger(text, prefix) else {
            continue;
        };
        return match kind {
            Kind::Chat if rest.is_empty() => None,
            Kind::Chat => Some(Command::Chat(rest.to_string())),
            Kind::Image if rest.is_empty() => None,
            Kind::Image => Some(Command::Image(rest.to_string())),
            Kind::Reset => Some(Command::Reset),
            Kind::Admin => Some(Command::Admin(rest.to_string())),
        };
    }
    None
}
