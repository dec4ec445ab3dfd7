// ABOUTME: Serenity event handler that normalises gateway events into PlatformEvents
// ABOUTME: Forwards ready, messages, interactions, and member joins into the dispatcher's channel

use async_trait::async_trait;
use serenity::all::{
    ComponentInteractionDataKind, Context, EventHandler, Interaction as GatewayInteraction, Member,
    Message, Ready, User,
};
use skidbot_core::events::{
    InboundMessage, Interaction, MemberJoin, MenuSelection, PlatformEvent, ReadyEvent,
    SlashInvocation,
};
use skidbot_core::traits::{Actor, ChannelId, GroupId};
use std::sync::Arc;
use tokio::sync::mpsc;

use super::presence::{DiscordCommands, DiscordPresence};
use super::responders::{InteractionReplier, MessageReplier};

pub struct GatewayHandler {
    tx: mpsc::Sender<PlatformEvent>,
}

impl GatewayHandler {
    pub fn new(tx: mpsc::Sender<PlatformEvent>) -> Self {
        Self { tx }
    }

    async fn forward(&self, event: PlatformEvent) {
        let kind = event.kind();
        metrics::counter!("skidbot_gateway_events_total", "kind" => kind).increment(1);
        if self.tx.send(event).await.is_err() {
            tracing::warn!(platform = "discord", kind, "Event stream receiver dropped");
        }
    }
}

pub fn actor(user: &User) -> Actor {
    Actor {
        id: user.id.get().into(),
        tag: user.tag(),
        is_bot: user.bot,
    }
}

fn payload<T: serde::Serialize>(value: &T) -> serde_json::Value {
    serde_json::to_value(value).unwrap_or_else(|e| {
        tracing::debug!(error = %e, "Could not serialise interaction payload");
        serde_json::Value::Null
    })
}

#[async_trait]
impl EventHandler for GatewayHandler {
    async fn ready(&self, ctx: Context, ready: Ready) {
        tracing::info!(
            platform = "discord",
            bot = %ready.user.tag(),
            guilds = ready.guilds.len(),
            "Gateway session ready"
        );
        let event = ReadyEvent {
            bot_tag: ready.user.tag(),
            group_count: ready.guilds.len(),
            presence: Arc::new(DiscordPresence::new(ctx.shard.clone(), Arc::clone(&ctx.cache))),
            commands: Arc::new(DiscordCommands::new(Arc::clone(&ctx.http))),
        };
        self.forward(PlatformEvent::Ready(event)).await;
    }

    async fn message(&self, ctx: Context, msg: Message) {
        let event = InboundMessage {
            id: msg.id.get(),
            group: msg.guild_id.map(|g| GroupId(g.get())),
            channel: ChannelId(msg.channel_id.get()),
            author: actor(&msg.author),
            content: msg.content.clone(),
            responder: Arc::new(MessageReplier::new(
                Arc::clone(&ctx.http),
                msg.channel_id,
                msg.id,
            )),
        };
        self.forward(PlatformEvent::Message(event)).await;
    }

    async fn interaction_create(&self, ctx: Context, interaction: GatewayInteraction) {
        let event = match interaction {
            GatewayInteraction::Command(command) => Interaction::SlashInvocation(SlashInvocation {
                command_name: command.data.name.clone(),
                actor: actor(&command.user),
                group: command.guild_id.map(|g| GroupId(g.get())),
                channel: ChannelId(command.channel_id.get()),
                raw_payload: payload(&command),
                responder: Arc::new(InteractionReplier::command(Arc::clone(&ctx.http), command)),
            }),
            GatewayInteraction::Component(component) => {
                let ComponentInteractionDataKind::StringSelect { values } = &component.data.kind
                else {
                    tracing::debug!(
                        custom_id = %component.data.custom_id,
                        "Ignoring non-select component interaction"
                    );
                    return;
                };
                Interaction::MenuSelection(MenuSelection {
                    custom_id: component.data.custom_id.clone(),
                    actor: actor(&component.user),
                    group: component.guild_id.map(|g| GroupId(g.get())),
                    channel: ChannelId(component.channel_id.get()),
                    values: values.clone(),
                    raw_payload: payload(&component),
                    responder: Arc::new(InteractionReplier::component(
                        Arc::clone(&ctx.http),
                        component,
                    )),
                })
            }
            _ => return,
        };
        self.forward(PlatformEvent::Interaction(event)).await;
    }

    async fn guild_member_addition(&self, _ctx: Context, new_member: Member) {
        let event = MemberJoin {
            group: GroupId(new_member.guild_id.get()),
            member: actor(&new_member.user),
        };
        self.forward(PlatformEvent::MemberJoin(event)).await;
    }
}
