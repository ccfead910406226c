use anyhow::Context;
use parley_bot::bridge::MessageBridge;
use parley_bot::commands::{CommandContext, SessionCommands, StatCommands};
use parley_bot::config::Config;
use parley_bot::gateway::{DiscordGateway, Gateway, GatewayEvent};
use parley_bot::logging::init_logging;
use parley_bot::persona::PersonaClient;
use parley_bot::provider::OpenAiProvider;
use parley_bot::session::SessionRegistry;
use parley_bot::store::JsonFileStore;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env().context("failed to load configuration")?;
    init_logging(&config.log_level, &config.log_format);

    let gateway = Arc::new(
        DiscordGateway::connect(config.bot_token.clone())
            .await
            .context("failed to connect to Discord")?,
    );
    info!(bot = %gateway.bot_user().name, "connected");

    let store = Arc::new(JsonFileStore::new(config.session_dir.clone()));
    let registry = Arc::new(SessionRegistry::new(
        config.limits.clone(),
        config.persona.clone(),
        store,
    ));

    let provider = Arc::new(OpenAiProvider::new(config.openai_api_key.clone()));
    let persona = Arc::new(PersonaClient::new(
        provider,
        config.persona.clone(),
        config.model.clone(),
        config.max_tokens,
    ));
    let bridge = Arc::new(MessageBridge::new(
        registry.clone(),
        persona,
        gateway.clone() as Arc<dyn Gateway>,
        &config.persona,
    ));

    let session_commands = CommandContext::register(
        gateway.clone() as Arc<dyn Gateway>,
        SessionCommands::new(registry.clone()),
    )
    .await
    .context("failed to register session commands")?;
    let stat_commands = CommandContext::register(
        gateway.clone() as Arc<dyn Gateway>,
        StatCommands::new(registry.clone()),
    )
    .await
    .context("failed to register stat commands")?;

    let (tx, mut rx) = mpsc::channel(64);
    let connection = {
        let gateway = gateway.clone();
        tokio::spawn(async move { gateway.run(tx).await })
    };

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown signal received");
                break;
            }
            event = rx.recv() => {
                let Some(event) = event else {
                    warn!("gateway event stream closed");
                    break;
                };
                match event {
                    GatewayEvent::Ready { user } => {
                        info!(user = %user.name, "gateway ready");
                    }
                    GatewayEvent::InvocationReceived(invocation) => {
                        session_commands.dispatch(&invocation).await;
                        stat_commands.dispatch(&invocation).await;
                    }
                    GatewayEvent::MessageReceived(message) => {
                        let bridge = bridge.clone();
                        tokio::spawn(async move { bridge.handle(message).await });
                    }
                }
            }
        }
    }

    connection.abort();
    if let Err(e) = session_commands.delete_commands().await {
        error!(error = %e, "failed to delete session commands");
    }
    if let Err(e) = stat_commands.delete_commands().await {
        error!(error = %e, "failed to delete stat commands");
    }

    Ok(())
}
