// ABOUTME: Discord REST adapters for guild roles, memberships, and channel moderation
// ABOUTME: Converts between core identifiers and serenity ids

use anyhow::{Context, Result};
use async_trait::async_trait;
use serenity::all::{
    ChannelId as DiscordChannelId, EditChannel, EditRole, GuildId, Http, RoleId as DiscordRoleId,
    UserId as DiscordUserId,
};
use skidbot_core::traits::{
    ChannelId, ChannelModerator, GroupId, GuildApi, Role, RoleId, RoleSpec, UserId,
};
use std::sync::Arc;

fn guild(group: GroupId) -> GuildId {
    GuildId::new(group.0)
}

fn role(role: &serenity::all::Role) -> Role {
    Role {
        id: RoleId(role.id.get()),
        name: role.name.clone(),
        color: role.colour.0,
    }
}

/// Role and membership operations over the REST API
pub struct DiscordGuilds {
    http: Arc<Http>,
}

impl DiscordGuilds {
    pub fn new(http: Arc<Http>) -> Self {
        Self { http }
    }
}

#[async_trait]
impl GuildApi for DiscordGuilds {
    async fn roles(&self, group: GroupId) -> Result<Vec<Role>> {
        let roles = self
            .http
            .get_guild_roles(guild(group))
            .await
            .with_context(|| format!("Failed to list roles in guild {}", group))?;
        Ok(roles.iter().map(role).collect())
    }

    async fn create_role(&self, group: GroupId, spec: &RoleSpec) -> Result<Role> {
        let builder = EditRole::new()
            .name(&spec.name)
            .colour(spec.color)
            .audit_log_reason(&spec.reason);
        let created = guild(group)
            .create_role(&self.http, builder)
            .await
            .with_context(|| format!("Failed to create role '{}' in guild {}", spec.name, group))?;
        Ok(role(&created))
    }

    async fn member_role_ids(&self, group: GroupId, user: UserId) -> Result<Vec<RoleId>> {
        let member = self
            .http
            .get_member(guild(group), DiscordUserId::new(user.0))
            .await
            .with_context(|| format!("Failed to fetch member {} in guild {}", user, group))?;
        Ok(member.roles.iter().map(|r| RoleId(r.get())).collect())
    }

    async fn add_member_role(
        &self,
        group: GroupId,
        user: UserId,
        role: RoleId,
        reason: &str,
    ) -> Result<()> {
        // Discord treats adding a held role as a successful no-op
        self.http
            .add_member_role(
                guild(group),
                DiscordUserId::new(user.0),
                DiscordRoleId::new(role.0),
                Some(reason),
            )
            .await
            .with_context(|| format!("Failed to add role {} to {} in guild {}", role, user, group))
    }
}

/// Channel settings changed by moderation commands
pub struct DiscordModerator {
    http: Arc<Http>,
}

impl DiscordModerator {
    pub fn new(http: Arc<Http>) -> Self {
        Self { http }
    }
}

#[async_trait]
impl ChannelModerator for DiscordModerator {
    async fn set_slowmode(&self, channel: ChannelId, seconds: u16) -> Result<()> {
        DiscordChannelId::new(channel.0)
            .edit(&self.http, EditChannel::new().rate_limit_per_user(seconds))
            .await
            .with_context(|| format!("Failed to set slowmode on channel {}", channel))?;
        tracing::info!(channel_id = %channel, seconds, "Slowmode updated");
        Ok(())
    }
}
