// ABOUTME: Handling for messages that arrive outside any server
// ABOUTME: Logs the message and points the sender back at server slash commands

use anyhow::Result;
use async_trait::async_trait;
use skidbot_core::events::InboundMessage;
use skidbot_core::traits::{ExternalMessagePolicy, MessageReply};

pub const DIRECT_MESSAGE_HINT: &str =
    "👋 I only work inside servers. Use `/help` in a server to see what I can do.";

#[derive(Debug, Clone, Default)]
pub struct DirectMessagePolicy {
    /// Log only, never reply
    pub silent: bool,
}

#[async_trait]
impl ExternalMessagePolicy for DirectMessagePolicy {
    async fn handle(&self, message: &InboundMessage) -> Result<()> {
        tracing::info!(
            user_id = %message.author.id,
            user = %message.author.tag,
            channel_id = %message.channel,
            content_len = message.content.len(),
            "Direct message received"
        );
        if self.silent {
            return Ok(());
        }
        message
            .responder
            .reply(MessageReply::text(DIRECT_MESSAGE_HINT))
            .await
    }
}
