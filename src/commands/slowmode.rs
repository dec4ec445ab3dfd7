// ABOUTME: /slowmode offers a select menu of delays; the menu handler applies the choice
// ABOUTME: The selection is applied to the channel the menu was used in and confirmed privately

use anyhow::{Context, Result};
use async_trait::async_trait;
use skidbot_core::commands::{CommandContext, CommandHandler};
use skidbot_core::events::MenuSelection;
use skidbot_core::router::MenuHandler;
use skidbot_core::traits::{
    ChannelModerator, Notice, Reply, SelectMenu, SelectOption, NOTICE_GREEN,
};
use std::sync::Arc;

/// Custom id shared by the menu and its handler
pub const SLOWMODE_MENU_ID: &str = "slowmode_select";

/// Discord's upper bound for per-user rate limits (6 hours)
pub const MAX_SLOWMODE_SECS: u16 = 21_600;

const CHOICES: [(&str, u16); 12] = [
    ("Off", 0),
    ("5 seconds", 5),
    ("10 seconds", 10),
    ("15 seconds", 15),
    ("30 seconds", 30),
    ("1 minute", 60),
    ("2 minutes", 120),
    ("5 minutes", 300),
    ("10 minutes", 600),
    ("30 minutes", 1_800),
    ("1 hour", 3_600),
    ("6 hours", 21_600),
];

pub fn menu() -> SelectMenu {
    SelectMenu {
        custom_id: SLOWMODE_MENU_ID.to_string(),
        placeholder: Some("Choose a slowmode delay".to_string()),
        options: CHOICES
            .iter()
            .map(|(label, secs)| SelectOption {
                label: label.to_string(),
                value: secs.to_string(),
                description: None,
            })
            .collect(),
    }
}

fn describe(seconds: u16) -> String {
    CHOICES
        .iter()
        .find(|(_, secs)| *secs == seconds)
        .map(|(label, _)| label.to_string())
        .unwrap_or_else(|| format!("{} seconds", seconds))
}

fn server_only() -> Reply {
    Reply::notice(Notice::error(
        "❌ Server Only",
        "Slowmode can only be changed in a server channel.",
    ))
    .ephemeral()
}

pub struct SlowmodeCommand;

#[async_trait]
impl CommandHandler for SlowmodeCommand {
    async fn execute(&self, ctx: CommandContext<'_>) -> Result<()> {
        if ctx.invocation.group.is_none() {
            return ctx.reply(server_only()).await;
        }
        ctx.reply(
            Reply::text("⏱️ Select a slowmode delay for this channel.")
                .with_menu(menu())
                .ephemeral(),
        )
        .await
    }
}

/// Applies the delay picked in the slowmode menu
pub struct SlowmodeMenu {
    moderator: Arc<dyn ChannelModerator>,
}

impl SlowmodeMenu {
    pub fn new(moderator: Arc<dyn ChannelModerator>) -> Self {
        Self { moderator }
    }
}

#[async_trait]
impl MenuHandler for SlowmodeMenu {
    async fn handle(&self, selection: &MenuSelection) -> Result<()> {
        if selection.group.is_none() {
            return selection.responder.reply(server_only()).await;
        }
        let raw = selection
            .values
            .first()
            .context("slowmode selection carried no value")?;
        let seconds: u16 = raw
            .parse()
            .with_context(|| format!("invalid slowmode value '{}'", raw))?;
        if seconds > MAX_SLOWMODE_SECS {
            anyhow::bail!("slowmode value {} exceeds {}", seconds, MAX_SLOWMODE_SECS);
        }

        self.moderator.set_slowmode(selection.channel, seconds).await?;
        tracing::info!(
            channel_id = %selection.channel,
            user_id = %selection.actor.id,
            seconds,
            "Slowmode changed from menu"
        );

        let description = if seconds == 0 {
            "Slowmode is now disabled for this channel.".to_string()
        } else {
            format!("Slowmode is now set to **{}**.", describe(seconds))
        };
        let notice = Notice::new("✅ Slowmode Updated", description, NOTICE_GREEN);
        selection
            .responder
            .reply(Reply::notice(notice).ephemeral())
            .await
    }
}
