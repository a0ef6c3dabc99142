use std::path::PathBuf;
use std::sync::Arc;

use teloxide::prelude::*;
use teloxide::types::ChatKind;
use tracing::{info, warn};
use tracing_subscriber::prelude::*;

use persona_relay::chatbot::{parse_command, ImageProvider, MessageHandler, TelegramClient};
use persona_relay::config::{EnvSource, PersonalConfig, ProcessEnv, RuntimeConfig, DEFAULT_CONFIG_PATH};
use persona_relay::openai::Client as OpenAiClient;

struct BotState {
    config: Arc<RuntimeConfig>,
    handler: MessageHandler,
    telegram: TelegramClient,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    if let Err(e) = dotenvy::dotenv() {
        eprintln!("No .env loaded: {e}");
    }
    let env = ProcessEnv;

    // Setup logging
    let log_dir = env.var("LOG_DIR").map(PathBuf::from).unwrap_or_else(|| PathBuf::from("logs"));
    std::fs::create_dir_all(&log_dir)?;
    let (non_blocking, _guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(
        &log_dir,
        "persona-relay.log",
    ));

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stdout)
                .with_filter(
                    tracing_subscriber::EnvFilter::from_default_env()
                        .add_directive(tracing::Level::INFO.into()),
                ),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_filter(
                    tracing_subscriber::EnvFilter::from_default_env()
                        .add_directive(tracing::Level::INFO.into()),
                ),
        )
        .init();

    let config_path = std::env::args()
        .nth(1)
        .or_else(|| env.var("BOT_CONFIG_PATH"))
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let personal = PersonalConfig::load(&config_path)?;
    let config = Arc::new(RuntimeConfig::build(&personal, &env));

    info!("🚀 Starting persona-relay...");
    info!("Loaded config from {config_path}");
    info!(
        "Prefixes: {} / {} / {} / {}",
        config.prefixes.chat, config.prefixes.image, config.prefixes.reset, config.prefixes.admin
    );
    if config.moderation.enabled {
        info!("Prompt moderation enabled: {:?}", config.moderation.blacklisted_categories);
    }

    let api_key = config.provider.api_key.clone().ok_or("OPENAI_API_KEY is required")?;
    let token = env.var("TELEGRAM_BOT_TOKEN").ok_or("TELEGRAM_BOT_TOKEN is required")?;

    let openai = Arc::new(OpenAiClient::new(api_key, &config.provider)?);
    let images: Arc<dyn ImageProvider> = openai.clone();
    let handler = MessageHandler::new(config.clone(), openai.clone(), openai, Some(images));

    let bot = Bot::new(token);
    let state = Arc::new(BotState {
        config,
        handler,
        telegram: TelegramClient::new(bot.clone()),
    });

    let handler = dptree::entry().branch(Update::filter_message().endpoint(handle_new_message));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}

async fn handle_new_message(msg: Message, state: Arc<BotState>) -> ResponseResult<()> {
    let is_private = matches!(msg.chat.kind, ChatKind::Private(_));
    if !is_private && !state.config.groupchats_enabled {
        return Ok(());
    }

    let Some(text) = msg.text() else {
        return Ok(());
    };
    let Some(command) = parse_command(text, &state.config.prefixes) else {
        return Ok(());
    };

    // One conversation per chat; in groups the whole group shares it.
    let sender_id = msg.chat.id.to_string();
    info!("📨 {:?} from {}", command, sender_id);

    let reply = state.handler.dispatch(&sender_id, command).await;
    if let Err(e) = state.telegram.send_reply(msg.chat.id, reply, Some(msg.id)).await {
        warn!("Reply to {sender_id} not delivered: {e}");
    }

    Ok(())
}
