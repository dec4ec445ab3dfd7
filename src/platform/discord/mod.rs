// ABOUTME: Discord platform implementation for the skidbot control core
// ABOUTME: Runs the serenity gateway client and surfaces its events as a normalised stream

pub mod api;
pub mod handler;
pub mod presence;
pub mod responders;

pub use api::{DiscordGuilds, DiscordModerator};
pub use handler::GatewayHandler;
pub use presence::{DiscordCommands, DiscordPresence};

use anyhow::{Context, Result};
use async_trait::async_trait;
use serenity::all::{GatewayIntents, Http, ShardManager};
use serenity::Client;
use skidbot_core::traits::{ChatPlatform, EventStream};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio_stream::wrappers::ReceiverStream;

/// Events buffered between the gateway and the dispatcher
const EVENT_BUFFER: usize = 256;

pub fn intents() -> GatewayIntents {
    GatewayIntents::GUILDS
        | GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::GUILD_MEMBERS
        | GatewayIntents::DIRECT_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT
}

// =============================================================================
// DiscordPlatform - gateway connection + REST handle
// =============================================================================

pub struct DiscordPlatform {
    http: Arc<Http>,
    shard_manager: Arc<ShardManager>,
    /// Taken by the first `event_stream` call, which starts the gateway
    client: Mutex<Option<Client>>,
    events: Mutex<Option<mpsc::Receiver<skidbot_core::PlatformEvent>>>,
}

impl DiscordPlatform {
    /// Build the gateway client. Nothing connects until `event_stream`.
    pub async fn new(token: &str) -> Result<Self> {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let client = Client::builder(token, intents())
            .event_handler(GatewayHandler::new(tx))
            .await
            .context("Failed to build Discord client")?;

        Ok(Self {
            http: Arc::clone(&client.http),
            shard_manager: Arc::clone(&client.shard_manager),
            client: Mutex::new(Some(client)),
            events: Mutex::new(Some(rx)),
        })
    }

    /// REST handle shared by the guild and moderation adapters
    pub fn http(&self) -> Arc<Http> {
        Arc::clone(&self.http)
    }
}

#[async_trait]
impl ChatPlatform for DiscordPlatform {
    async fn event_stream(&self) -> Result<EventStream> {
        let rx = self
            .events
            .lock()
            .await
            .take()
            .context("Discord event stream already taken")?;
        let mut client = self
            .client
            .lock()
            .await
            .take()
            .context("Discord client already started")?;

        tokio::spawn(async move {
            if let Err(e) = client.start().await {
                tracing::error!(platform = "discord", error = %e, "Gateway client stopped");
            }
        });

        Ok(Box::pin(ReceiverStream::new(rx)))
    }

    fn platform_id(&self) -> &'static str {
        "discord"
    }

    async fn shutdown(&self) -> Result<()> {
        tracing::info!(platform = "discord", "Shutting down Discord platform");
        self.shard_manager.shutdown_all().await;
        Ok(())
    }
}
