// ABOUTME: /help lists every loaded command with its description
// ABOUTME: Reads the registry the invocation was routed through; reply is private

use anyhow::Result;
use async_trait::async_trait;
use skidbot_core::commands::{CommandContext, CommandHandler};
use skidbot_core::traits::{Notice, Reply, NOTICE_BLURPLE};

pub struct HelpCommand;

pub fn render(ctx: &CommandContext<'_>) -> Notice {
    let lines: Vec<String> = ctx
        .registry
        .descriptors()
        .into_iter()
        .map(|d| format!("`/{}`: {}", d.name, d.description))
        .collect();
    let body = if lines.is_empty() {
        "No commands are loaded.".to_string()
    } else {
        lines.join("\n")
    };
    Notice::new("📖 Commands", body, NOTICE_BLURPLE)
}

#[async_trait]
impl CommandHandler for HelpCommand {
    async fn execute(&self, ctx: CommandContext<'_>) -> Result<()> {
        let notice = render(&ctx);
        ctx.reply(Reply::notice(notice).ephemeral()).await
    }
}
