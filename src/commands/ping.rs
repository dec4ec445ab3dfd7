// ABOUTME: /ping answers so users can tell the bot is alive
// ABOUTME: Replies privately with a fixed pong; no latency measurement

use anyhow::Result;
use async_trait::async_trait;
use skidbot_core::commands::{CommandContext, CommandHandler};
use skidbot_core::traits::Reply;

pub struct PingCommand;

#[async_trait]
impl CommandHandler for PingCommand {
    async fn execute(&self, ctx: CommandContext<'_>) -> Result<()> {
        ctx.reply(Reply::text("🏓 Pong!").ephemeral()).await
    }
}
