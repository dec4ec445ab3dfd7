// ABOUTME: Root library module exposing the Discord adapter, commands, and wiring
// ABOUTME: The binary in main.rs only parses arguments and sets up logging around `run`

pub mod commands;
pub mod platform;
pub mod policy;

// Re-export platform-agnostic modules from skidbot-core
pub use skidbot_core::config;
pub use skidbot_core::error;
pub use skidbot_core::metrics;
pub use skidbot_core::paths;

use anyhow::{Context, Result};
use skidbot_core::commands::CommandRegistry;
use skidbot_core::config::Config;
use skidbot_core::dispatcher::Dispatcher;
use skidbot_core::flags::JsonFlagFile;
use skidbot_core::reconcile::RoleReconciler;
use skidbot_core::traits::{ChannelModerator, ChatPlatform, CommandDescriptor, GuildApi};
use std::sync::Arc;

use commands::{SlowmodeMenu, SLOWMODE_MENU_ID};
use platform::{DiscordGuilds, DiscordModerator, DiscordPlatform};
use policy::DirectMessagePolicy;

/// Log every panic with its location. Panics inside event tasks are
/// contained and reported as critical by the dispatcher, so the hook only logs.
pub fn install_panic_hook() {
    std::panic::set_hook(Box::new(|panic_info| {
        let location = panic_info
            .location()
            .map(|l| format!("{}:{}", l.file(), l.line()))
            .unwrap_or_else(|| "unknown location".to_string());
        tracing::error!(
            panic = %error::panic_message(panic_info.payload()),
            location,
            "Panic"
        );
    }));
}

/// Wire the core to the given platform capabilities
pub fn build_dispatcher(
    config: &Config,
    guilds: Arc<dyn GuildApi>,
    moderator: Arc<dyn ChannelModerator>,
) -> Result<Dispatcher> {
    let flags = Arc::new(JsonFlagFile::new(&config.flags.path));
    let reconciler = Arc::new(RoleReconciler::new(guilds, flags, config.marker_spec()));
    let dispatcher = Dispatcher::new(
        commands::source(config),
        reconciler,
        Arc::new(DirectMessagePolicy::default()),
        config.dispatcher_settings()?,
    )
    .with_menu(SLOWMODE_MENU_ID, Arc::new(SlowmodeMenu::new(moderator)));
    Ok(dispatcher)
}

/// Connect to Discord and serve events until the gateway stream ends
pub async fn run(config: Config) -> Result<()> {
    let token = config.require_token()?.to_string();
    let platform = DiscordPlatform::new(&token).await?;
    let http = platform.http();

    let dispatcher = Arc::new(build_dispatcher(
        &config,
        Arc::new(DiscordGuilds::new(Arc::clone(&http))),
        Arc::new(DiscordModerator::new(http)),
    )?);

    let events = platform
        .event_stream()
        .await
        .context("Failed to start Discord gateway")?;
    tracing::info!(platform = platform.platform_id(), "Connected, serving events");

    dispatcher.run(events).await;
    platform.shutdown().await
}

/// Descriptors that `run` would register, without connecting
pub fn command_table(config: &Config) -> Result<Vec<CommandDescriptor>> {
    let source = commands::source(config);
    let registry = CommandRegistry::load(source.as_ref())
        .with_context(|| format!("Failed to load commands from {}", source.describe()))?;
    Ok(registry.descriptors())
}
