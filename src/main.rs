use std::sync::Arc;

use anyhow::Context;

use intent_bridge::bridge::Bridge;
use intent_bridge::channels::{BotHandle, CliChannel, InboundMessage};
use intent_bridge::config::{BridgeConfig, CliConfig};
use intent_bridge::dispatch::{Dispatcher, Listener, listener_fn};
use intent_bridge::error::ListenerError;
use intent_bridge::nlu::{NluResponse, create_client};
use intent_bridge::processor::TurnProcessor;
use intent_bridge::store::{HashStore, LibSqlHashStore, SessionStore};

/// Replies with the agent's suggested speech.
struct SpeechReply;

#[async_trait::async_trait]
impl Listener for SpeechReply {
    async fn on_response(
        &self,
        message: &InboundMessage,
        response: &NluResponse,
        bot: &dyn BotHandle,
    ) -> Result<(), ListenerError> {
        if let Some(speech) = response.speech() {
            bot.reply(message, speech).await?;
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = BridgeConfig::from_env().context("loading configuration")?;

    eprintln!("🤖 Intent Bridge v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   NLU: {} (lang {})", config.nlu.base_url, config.nlu.lang);

    // ── Session store ───────────────────────────────────────────────────
    let store: Arc<dyn HashStore> = Arc::new(
        LibSqlHashStore::open(&config.store.location)
            .await
            .context("opening session store")?,
    );
    eprintln!(
        "   Sessions: {:?} (hash {})",
        config.store.location, config.store.hash
    );
    let sessions = SessionStore::new(store, config.store.hash.clone());

    // ── NLU client ──────────────────────────────────────────────────────
    let nlu = create_client(&config.nlu).context("creating NLU client")?;

    // ── Listeners ───────────────────────────────────────────────────────
    let dispatcher = Dispatcher::new()
        .on_any(Arc::new(SpeechReply))
        .on_any(listener_fn(|message, response, _bot| {
            tracing::info!(
                user = %message.user,
                action = response.action().unwrap_or("-"),
                "Intent recognized"
            );
            Ok(())
        }));

    let processor =
        TurnProcessor::new(sessions, nlu, dispatcher).with_source(config.source_tag.clone());

    // ── Channel ─────────────────────────────────────────────────────────
    let cli_config = CliConfig::from_env();
    let channel = CliChannel::from_config(&cli_config);
    match &cli_config.bot_identity {
        Some((bot_id, channel_id)) => eprintln!(
            "   Channel: cli as bot {} in {} (user {})",
            bot_id, channel_id, cli_config.user
        ),
        None => eprintln!("   Channel: cli (user {})", cli_config.user),
    }
    eprintln!("   Type a message and press Enter. Ctrl-D to exit.\n");

    let stats = Bridge::new(processor).run(Arc::new(channel)).await?;
    tracing::info!(
        turns = stats.turns,
        dispatched = stats.dispatched,
        skipped = stats.skipped,
        failed = stats.backend_failed + stats.aborted,
        "Bridge stopped"
    );

    Ok(())
}
