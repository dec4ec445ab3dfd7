// ABOUTME: Core types and traits at the chat platform seam
// ABOUTME: Identifiers, roles, presence, replies, and the capabilities the core needs from a platform

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::pin::Pin;
use tokio_stream::Stream;

use crate::events::{InboundMessage, PlatformEvent};

// =============================================================================
// Identifiers
// =============================================================================

macro_rules! snowflake {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u64> for $name {
            fn from(value: u64) -> Self {
                Self(value)
            }
        }
    };
}

snowflake!(
    /// A group (guild / server) the bot is a member of
    GroupId
);
snowflake!(
    /// A user account on the platform
    UserId
);
snowflake!(
    /// A role inside a group
    RoleId
);
snowflake!(
    /// A text channel, inside a group or a direct conversation
    ChannelId
);

/// The user who caused an inbound event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub id: UserId,
    /// Human-readable tag used in logs (e.g. `name#0001` or `name`)
    pub tag: String,
    pub is_bot: bool,
}

impl Actor {
    pub fn new(id: u64, tag: impl Into<String>) -> Self {
        Self {
            id: UserId(id),
            tag: tag.into(),
            is_bot: false,
        }
    }

    pub fn bot(id: u64, tag: impl Into<String>) -> Self {
        Self {
            is_bot: true,
            ..Self::new(id, tag)
        }
    }
}

// =============================================================================
// Roles
// =============================================================================

/// A role as seen in a group's role list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Role {
    pub id: RoleId,
    pub name: String,
    pub color: u32,
}

/// Everything needed to create a role
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleSpec {
    pub name: String,
    pub color: u32,
    /// Audit log reason attached to the creation
    pub reason: String,
}

impl RoleSpec {
    /// Case-insensitive name comparison used for lookup-before-create
    pub fn matches(&self, role: &Role) -> bool {
        role.name.to_lowercase() == self.name.to_lowercase()
    }
}

// =============================================================================
// Presence
// =============================================================================

/// Activity type shown next to the bot's name. Discriminants follow the
/// platform's wire codes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    Playing = 0,
    #[default]
    Streaming = 1,
    Listening = 2,
    Watching = 3,
    Custom = 4,
    Competing = 5,
}

impl ActivityKind {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Playing),
            1 => Some(Self::Streaming),
            2 => Some(Self::Listening),
            3 => Some(Self::Watching),
            4 => Some(Self::Custom),
            5 => Some(Self::Competing),
            _ => None,
        }
    }

    pub fn code(self) -> u8 {
        self as u8
    }
}

/// Overall online state of the bot account
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnlineStatus {
    Online,
    #[default]
    Idle,
    #[serde(alias = "dnd")]
    DoNotDisturb,
    Invisible,
}

/// One status line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Activity {
    pub name: String,
    pub kind: ActivityKind,
}

impl Activity {
    pub fn new(name: impl Into<String>, kind: ActivityKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// A complete presence update
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Presence {
    pub activity: Activity,
    pub status: OnlineStatus,
}

// =============================================================================
// Replies
// =============================================================================

/// Red used for failure notices
pub const NOTICE_RED: u32 = 0xED4245;
/// Blurple used for informational notices
pub const NOTICE_BLURPLE: u32 = 0x5865F2;
/// Green used for confirmations
pub const NOTICE_GREEN: u32 = 0x57F287;

/// A structured notice (rendered as an embed by the platform adapter)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub title: String,
    pub description: String,
    pub color: u32,
}

impl Notice {
    pub fn new(title: impl Into<String>, description: impl Into<String>, color: u32) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            color,
        }
    }

    pub fn error(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(title, description, NOTICE_RED)
    }
}

/// One entry in a select menu
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectOption {
    pub label: String,
    pub value: String,
    pub description: Option<String>,
}

/// A single-choice select menu attached to a reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectMenu {
    pub custom_id: String,
    pub placeholder: Option<String>,
    pub options: Vec<SelectOption>,
}

/// Reply to an interaction
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reply {
    pub content: Option<String>,
    pub notices: Vec<Notice>,
    pub menu: Option<SelectMenu>,
    /// Visible only to the invoking actor
    pub ephemeral: bool,
}

impl Reply {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Self::default()
        }
    }

    pub fn notice(notice: Notice) -> Self {
        Self {
            notices: vec![notice],
            ..Self::default()
        }
    }

    pub fn with_menu(mut self, menu: SelectMenu) -> Self {
        self.menu = Some(menu);
        self
    }

    pub fn ephemeral(mut self) -> Self {
        self.ephemeral = true;
        self
    }
}

/// Reply to a plain message in a channel
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageReply {
    pub content: String,
    /// Remote asset attached to the reply
    pub attachment_url: Option<String>,
    /// The only user the reply is allowed to ping
    pub mention: Option<UserId>,
}

impl MessageReply {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Self::default()
        }
    }
}

// =============================================================================
// Command descriptors
// =============================================================================

/// Option value type of a command parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterKind {
    String,
    Integer,
    Number,
    Boolean,
    User,
    Channel,
    Role,
}

/// A fixed choice offered for a parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterChoice {
    pub name: String,
    pub value: serde_json::Value,
}

/// Schema of one command parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSpec {
    pub name: String,
    pub description: String,
    pub kind: ParameterKind,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<ParameterChoice>,
}

/// What gets submitted to the platform's global command table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommandDescriptor {
    pub name: String,
    pub description: String,
    pub options: Vec<ParameterSpec>,
}

// =============================================================================
// Platform
// =============================================================================

/// Boxed stream type for platform events
pub type EventStream = Pin<Box<dyn Stream<Item = PlatformEvent> + Send>>;

/// A connected chat platform delivering normalised events
#[async_trait]
pub trait ChatPlatform: Send + Sync {
    /// Receive inbound events as a stream
    async fn event_stream(&self) -> Result<EventStream>;

    /// Platform identifier (e.g., "discord")
    fn platform_id(&self) -> &'static str;

    /// Gracefully shut down the platform connection
    async fn shutdown(&self) -> Result<()> {
        Ok(())
    }
}

/// Role and membership operations inside groups
#[async_trait]
pub trait GuildApi: Send + Sync {
    /// All roles currently defined in the group
    async fn roles(&self, group: GroupId) -> Result<Vec<Role>>;

    /// Create a role and return it as the platform stored it
    async fn create_role(&self, group: GroupId, spec: &RoleSpec) -> Result<Role>;

    /// Role ids currently held by a member
    async fn member_role_ids(&self, group: GroupId, user: UserId) -> Result<Vec<RoleId>>;

    /// Grant a role. Granting an already-held role must be a no-op.
    async fn add_member_role(
        &self,
        group: GroupId,
        user: UserId,
        role: RoleId,
        reason: &str,
    ) -> Result<()>;
}

/// The bot's displayed presence
#[async_trait]
pub trait PresenceSink: Send + Sync {
    /// Number of groups the bot currently serves
    fn group_count(&self) -> usize;

    async fn set_presence(&self, presence: &Presence) -> Result<()>;
}

/// The platform's global command table
#[async_trait]
pub trait CommandPublisher: Send + Sync {
    /// Replace the whole global command table with `commands`
    async fn set_global_commands(&self, commands: &[CommandDescriptor]) -> Result<()>;
}

/// Reply channel bound to one inbound interaction
#[async_trait]
pub trait InteractionResponder: Send + Sync {
    async fn reply(&self, reply: Reply) -> Result<()>;
}

/// Reply channel bound to one inbound message
#[async_trait]
pub trait MessageResponder: Send + Sync {
    async fn reply(&self, reply: MessageReply) -> Result<()>;
}

/// Channel moderation used by the slowmode command
#[async_trait]
pub trait ChannelModerator: Send + Sync {
    /// Set the per-user message rate limit; 0 disables it
    async fn set_slowmode(&self, channel: ChannelId, seconds: u16) -> Result<()>;
}

/// Handles messages that arrive outside any group
#[async_trait]
pub trait ExternalMessagePolicy: Send + Sync {
    async fn handle(&self, message: &InboundMessage) -> Result<()>;
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_spec_matches_case_insensitively() {
        let spec = RoleSpec {
            name: "Skidder".to_string(),
            color: 0xFFFF00,
            reason: "test".to_string(),
        };
        let role = |name: &str| Role {
            id: RoleId(1),
            name: name.to_string(),
            color: 0,
        };
        assert!(spec.matches(&role("skidder")));
        assert!(spec.matches(&role("SKIDDER")));
        assert!(!spec.matches(&role("skidders")));
    }

    #[test]
    fn test_activity_kind_codes() {
        assert_eq!(ActivityKind::Streaming.code(), 1);
        assert_eq!(ActivityKind::from_code(1), Some(ActivityKind::Streaming));
        assert_eq!(ActivityKind::from_code(3), Some(ActivityKind::Watching));
        assert_eq!(ActivityKind::from_code(9), None);
    }

    #[test]
    fn test_presence_defaults() {
        assert_eq!(ActivityKind::default(), ActivityKind::Streaming);
        assert_eq!(OnlineStatus::default(), OnlineStatus::Idle);
    }

    #[test]
    fn test_snowflake_display() {
        assert_eq!(GroupId(42).to_string(), "42");
        assert_eq!(UserId(7).to_string(), "7");
    }

    #[test]
    fn test_online_status_accepts_dnd_alias() {
        #[derive(Deserialize)]
        struct Wrapper {
            status: OnlineStatus,
        }
        let parsed: Wrapper = toml::from_str("status = \"dnd\"").unwrap();
        assert_eq!(parsed.status, OnlineStatus::DoNotDisturb);
        let parsed: Wrapper = toml::from_str("status = \"idle\"").unwrap();
        assert_eq!(parsed.status, OnlineStatus::Idle);
    }

    #[test]
    fn test_reply_builders() {
        let reply = Reply::notice(Notice::error("Oops", "Something broke")).ephemeral();
        assert!(reply.ephemeral);
        assert_eq!(reply.notices.len(), 1);
        assert_eq!(reply.notices[0].color, NOTICE_RED);
        assert!(reply.content.is_none());

        let reply = Reply::text("hi");
        assert_eq!(reply.content.as_deref(), Some("hi"));
        assert!(!reply.ephemeral);
    }

    #[test]
    fn test_parameter_spec_deserializes_without_optional_fields() {
        let spec: ParameterSpec = toml::from_str(
            r#"
name = "target"
description = "Who to look up"
kind = "user"
"#,
        )
        .unwrap();
        assert_eq!(spec.kind, ParameterKind::User);
        assert!(!spec.required);
        assert!(spec.choices.is_empty());
    }
}
