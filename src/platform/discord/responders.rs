// ABOUTME: Reply channels bound to one Discord interaction or message
// ABOUTME: Renders core replies, notices, and select menus into serenity builders

use anyhow::{Context, Result};
use async_trait::async_trait;
use serenity::all::{
    ChannelId as DiscordChannelId, CommandInteraction, ComponentInteraction, CreateActionRow,
    CreateAllowedMentions, CreateAttachment, CreateEmbed, CreateInteractionResponse,
    CreateInteractionResponseMessage, CreateMessage, CreateSelectMenu, CreateSelectMenuKind,
    CreateSelectMenuOption, Http, MessageId, Timestamp, UserId as DiscordUserId,
};
use skidbot_core::traits::{
    InteractionResponder, MessageReply, MessageResponder, Notice, Reply, SelectMenu,
};
use std::sync::Arc;

pub fn embed(notice: &Notice) -> CreateEmbed {
    CreateEmbed::new()
        .title(&notice.title)
        .description(&notice.description)
        .colour(notice.color)
        .timestamp(Timestamp::now())
}

pub fn select_row(menu: &SelectMenu) -> CreateActionRow {
    let options = menu
        .options
        .iter()
        .map(|opt| {
            let option = CreateSelectMenuOption::new(&opt.label, &opt.value);
            match &opt.description {
                Some(description) => option.description(description),
                None => option,
            }
        })
        .collect();
    let mut select =
        CreateSelectMenu::new(&menu.custom_id, CreateSelectMenuKind::String { options });
    if let Some(placeholder) = &menu.placeholder {
        select = select.placeholder(placeholder);
    }
    CreateActionRow::SelectMenu(select)
}

pub fn render(reply: Reply) -> CreateInteractionResponseMessage {
    let mut message = CreateInteractionResponseMessage::new()
        .ephemeral(reply.ephemeral)
        .embeds(reply.notices.iter().map(embed).collect());
    if let Some(content) = reply.content {
        message = message.content(content);
    }
    if let Some(menu) = &reply.menu {
        message = message.components(vec![select_row(menu)]);
    }
    message
}

enum Target {
    Command(Box<CommandInteraction>),
    Component(Box<ComponentInteraction>),
}

/// Responds to the interaction it was created for
pub struct InteractionReplier {
    http: Arc<Http>,
    target: Target,
}

impl InteractionReplier {
    pub fn command(http: Arc<Http>, interaction: CommandInteraction) -> Self {
        Self {
            http,
            target: Target::Command(Box::new(interaction)),
        }
    }

    pub fn component(http: Arc<Http>, interaction: ComponentInteraction) -> Self {
        Self {
            http,
            target: Target::Component(Box::new(interaction)),
        }
    }
}

#[async_trait]
impl InteractionResponder for InteractionReplier {
    async fn reply(&self, reply: Reply) -> Result<()> {
        let response = CreateInteractionResponse::Message(render(reply));
        let http = &self.http;
        let result = match &self.target {
            Target::Command(interaction) => interaction.create_response(http, response).await,
            Target::Component(interaction) => interaction.create_response(http, response).await,
        };
        result.context("Failed to respond to interaction")
    }
}

/// Replies to one message, pinging only the users the reply names
pub struct MessageReplier {
    http: Arc<Http>,
    channel: DiscordChannelId,
    message: MessageId,
}

impl MessageReplier {
    pub fn new(http: Arc<Http>, channel: DiscordChannelId, message: MessageId) -> Self {
        Self {
            http,
            channel,
            message,
        }
    }
}

#[async_trait]
impl MessageResponder for MessageReplier {
    async fn reply(&self, reply: MessageReply) -> Result<()> {
        let mentions = CreateAllowedMentions::new()
            .users(reply.mention.map(|u| DiscordUserId::new(u.0)))
            .replied_user(reply.mention.is_some());
        let mut message = CreateMessage::new()
            .content(reply.content)
            .reference_message((self.channel, self.message))
            .allowed_mentions(mentions);
        if let Some(url) = &reply.attachment_url {
            let attachment = CreateAttachment::url(&self.http, url)
                .await
                .with_context(|| format!("Failed to fetch attachment {}", url))?;
            message = message.add_file(attachment);
        }
        self.channel
            .send_message(&self.http, message)
            .await
            .context("Failed to send reply")?;
        Ok(())
    }
}
