// ABOUTME: Ready-time Discord handles: shard presence and the global command table
// ABOUTME: Maps core activities, statuses, and command descriptors onto serenity types

use anyhow::{Context, Result};
use async_trait::async_trait;
use serenity::all::{
    ActivityData, ActivityType, Cache, Command, CommandOptionType, CreateCommand,
    CreateCommandOption, Http, OnlineStatus as DiscordStatus, ShardMessenger,
};
use skidbot_core::traits::{
    ActivityKind, CommandDescriptor, CommandPublisher, OnlineStatus, ParameterKind, ParameterSpec,
    Presence, PresenceSink,
};
use std::sync::Arc;

fn activity_type(kind: ActivityKind) -> ActivityType {
    match kind {
        ActivityKind::Playing => ActivityType::Playing,
        ActivityKind::Streaming => ActivityType::Streaming,
        ActivityKind::Listening => ActivityType::Listening,
        ActivityKind::Watching => ActivityType::Watching,
        ActivityKind::Custom => ActivityType::Custom,
        ActivityKind::Competing => ActivityType::Competing,
    }
}

fn online_status(status: OnlineStatus) -> DiscordStatus {
    match status {
        OnlineStatus::Online => DiscordStatus::Online,
        OnlineStatus::Idle => DiscordStatus::Idle,
        OnlineStatus::DoNotDisturb => DiscordStatus::DoNotDisturb,
        OnlineStatus::Invisible => DiscordStatus::Invisible,
    }
}

/// Presence of the shard that delivered Ready
pub struct DiscordPresence {
    shard: ShardMessenger,
    cache: Arc<Cache>,
}

impl DiscordPresence {
    pub fn new(shard: ShardMessenger, cache: Arc<Cache>) -> Self {
        Self { shard, cache }
    }
}

#[async_trait]
impl PresenceSink for DiscordPresence {
    fn group_count(&self) -> usize {
        self.cache.guild_count()
    }

    async fn set_presence(&self, presence: &Presence) -> Result<()> {
        let activity = ActivityData {
            name: presence.activity.name.clone(),
            kind: activity_type(presence.activity.kind),
            state: None,
            url: None,
        };
        // Queued to the shard runner; delivery failures surface in its logs
        self.shard
            .set_presence(Some(activity), online_status(presence.status));
        Ok(())
    }
}

fn option_type(kind: ParameterKind) -> CommandOptionType {
    match kind {
        ParameterKind::String => CommandOptionType::String,
        ParameterKind::Integer => CommandOptionType::Integer,
        ParameterKind::Number => CommandOptionType::Number,
        ParameterKind::Boolean => CommandOptionType::Boolean,
        ParameterKind::User => CommandOptionType::User,
        ParameterKind::Channel => CommandOptionType::Channel,
        ParameterKind::Role => CommandOptionType::Role,
    }
}

fn build_option(spec: &ParameterSpec) -> Result<CreateCommandOption> {
    let mut option =
        CreateCommandOption::new(option_type(spec.kind), &spec.name, &spec.description)
            .required(spec.required);
    for choice in &spec.choices {
        option = match (&spec.kind, &choice.value) {
            (ParameterKind::Integer, value) => {
                let n = value.as_i64().with_context(|| {
                    format!("choice '{}' of '{}' is not an integer", choice.name, spec.name)
                })?;
                option.add_int_choice(&choice.name, n.try_into()?)
            }
            (ParameterKind::Number, value) => {
                let n = value.as_f64().with_context(|| {
                    format!("choice '{}' of '{}' is not a number", choice.name, spec.name)
                })?;
                option.add_number_choice(&choice.name, n)
            }
            (_, serde_json::Value::String(s)) => option.add_string_choice(&choice.name, s),
            (_, other) => option.add_string_choice(&choice.name, other.to_string()),
        };
    }
    Ok(option)
}

pub fn build_command(descriptor: &CommandDescriptor) -> Result<CreateCommand> {
    let mut command = CreateCommand::new(&descriptor.name).description(&descriptor.description);
    for option in &descriptor.options {
        command = command.add_option(build_option(option)?);
    }
    Ok(command)
}

/// The application's global command table
pub struct DiscordCommands {
    http: Arc<Http>,
}

impl DiscordCommands {
    pub fn new(http: Arc<Http>) -> Self {
        Self { http }
    }
}

#[async_trait]
impl CommandPublisher for DiscordCommands {
    async fn set_global_commands(&self, commands: &[CommandDescriptor]) -> Result<()> {
        let builders = commands
            .iter()
            .map(build_command)
            .collect::<Result<Vec<_>>>()?;
        Command::set_global_commands(&self.http, builders)
            .await
            .context("Failed to overwrite global application commands")?;
        Ok(())
    }
}
