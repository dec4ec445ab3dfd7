// ABOUTME: Inbound platform events normalised for the dispatcher.
// ABOUTME: Ready, group/direct messages, slash and menu interactions, member joins.

use std::fmt;
use std::sync::Arc;

use crate::traits::{
    Actor, ChannelId, CommandPublisher, GroupId, InteractionResponder, MessageResponder,
    PresenceSink,
};

/// Every event the core reacts to
pub enum PlatformEvent {
    Ready(ReadyEvent),
    Message(InboundMessage),
    Interaction(Interaction),
    MemberJoin(MemberJoin),
}

impl PlatformEvent {
    /// Short event name for logs and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Ready(_) => "ready",
            Self::Message(_) => "message",
            Self::Interaction(Interaction::SlashInvocation(_)) => "slash_invocation",
            Self::Interaction(Interaction::MenuSelection(_)) => "menu_selection",
            Self::MemberJoin(_) => "member_join",
        }
    }
}

impl fmt::Debug for PlatformEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ready(ev) => f.debug_tuple("Ready").field(ev).finish(),
            Self::Message(ev) => f.debug_tuple("Message").field(ev).finish(),
            Self::Interaction(ev) => f.debug_tuple("Interaction").field(ev).finish(),
            Self::MemberJoin(ev) => f.debug_tuple("MemberJoin").field(ev).finish(),
        }
    }
}

/// The session is established. Carries the handles that only exist once the
/// gateway connection is up.
pub struct ReadyEvent {
    pub bot_tag: String,
    pub group_count: usize,
    pub presence: Arc<dyn PresenceSink>,
    pub commands: Arc<dyn CommandPublisher>,
}

impl fmt::Debug for ReadyEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadyEvent")
            .field("bot_tag", &self.bot_tag)
            .field("group_count", &self.group_count)
            .finish_non_exhaustive()
    }
}

/// A plain message posted in a channel
pub struct InboundMessage {
    pub id: u64,
    /// `None` for direct conversations
    pub group: Option<GroupId>,
    pub channel: ChannelId,
    pub author: Actor,
    pub content: String,
    pub responder: Arc<dyn MessageResponder>,
}

impl fmt::Debug for InboundMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InboundMessage")
            .field("id", &self.id)
            .field("group", &self.group)
            .field("channel", &self.channel)
            .field("author", &self.author)
            .field("content_len", &self.content.len())
            .finish_non_exhaustive()
    }
}

/// A user joined (or rejoined) a group
#[derive(Debug, Clone)]
pub struct MemberJoin {
    pub group: GroupId,
    pub member: Actor,
}

/// A structured inbound interaction
pub enum Interaction {
    SlashInvocation(SlashInvocation),
    MenuSelection(MenuSelection),
}

impl Interaction {
    pub fn actor(&self) -> &Actor {
        match self {
            Self::SlashInvocation(inv) => &inv.actor,
            Self::MenuSelection(sel) => &sel.actor,
        }
    }

    pub fn responder(&self) -> &Arc<dyn InteractionResponder> {
        match self {
            Self::SlashInvocation(inv) => &inv.responder,
            Self::MenuSelection(sel) => &sel.responder,
        }
    }

    /// Command name or menu custom id, for logs
    pub fn label(&self) -> &str {
        match self {
            Self::SlashInvocation(inv) => &inv.command_name,
            Self::MenuSelection(sel) => &sel.custom_id,
        }
    }
}

impl fmt::Debug for Interaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SlashInvocation(inv) => f.debug_tuple("SlashInvocation").field(inv).finish(),
            Self::MenuSelection(sel) => f.debug_tuple("MenuSelection").field(sel).finish(),
        }
    }
}

/// A slash command was invoked
pub struct SlashInvocation {
    pub command_name: String,
    pub actor: Actor,
    pub group: Option<GroupId>,
    pub channel: ChannelId,
    /// Platform payload as received, for handlers that need option values
    pub raw_payload: serde_json::Value,
    pub responder: Arc<dyn InteractionResponder>,
}

impl SlashInvocation {
    /// Look up a named option value in the raw payload
    /// (`data.options[] { name, value }`)
    pub fn option(&self, name: &str) -> Option<&serde_json::Value> {
        self.raw_payload
            .get("data")?
            .get("options")?
            .as_array()?
            .iter()
            .find(|opt| opt.get("name").and_then(|n| n.as_str()) == Some(name))?
            .get("value")
    }
}

impl fmt::Debug for SlashInvocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlashInvocation")
            .field("command_name", &self.command_name)
            .field("actor", &self.actor)
            .field("group", &self.group)
            .field("channel", &self.channel)
            .finish_non_exhaustive()
    }
}

/// A value was picked in a select menu
pub struct MenuSelection {
    pub custom_id: String,
    pub actor: Actor,
    pub group: Option<GroupId>,
    pub channel: ChannelId,
    pub values: Vec<String>,
    pub raw_payload: serde_json::Value,
    pub responder: Arc<dyn InteractionResponder>,
}

impl fmt::Debug for MenuSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MenuSelection")
            .field("custom_id", &self.custom_id)
            .field("actor", &self.actor)
            .field("group", &self.group)
            .field("channel", &self.channel)
            .field("values", &self.values)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingResponder;

    fn invocation(payload: serde_json::Value) -> SlashInvocation {
        SlashInvocation {
            command_name: "slowmode".to_string(),
            actor: Actor::new(1, "user"),
            group: Some(GroupId(10)),
            channel: ChannelId(20),
            raw_payload: payload,
            responder: Arc::new(RecordingResponder::new()),
        }
    }

    #[test]
    fn test_option_lookup() {
        let inv = invocation(serde_json::json!({
            "data": { "options": [ { "name": "seconds", "value": 30 } ] }
        }));
        assert_eq!(inv.option("seconds"), Some(&serde_json::json!(30)));
        assert!(inv.option("missing").is_none());
    }

    #[test]
    fn test_option_lookup_without_options() {
        let inv = invocation(serde_json::json!({ "data": {} }));
        assert!(inv.option("seconds").is_none());
        let inv = invocation(serde_json::Value::Null);
        assert!(inv.option("seconds").is_none());
    }

    #[test]
    fn test_event_kind_and_label() {
        let inv = invocation(serde_json::Value::Null);
        let event = PlatformEvent::Interaction(Interaction::SlashInvocation(inv));
        assert_eq!(event.kind(), "slash_invocation");
        if let PlatformEvent::Interaction(i) = &event {
            assert_eq!(i.label(), "slowmode");
            assert_eq!(i.actor().id, crate::traits::UserId(1));
        }

        let join = PlatformEvent::MemberJoin(MemberJoin {
            group: GroupId(1),
            member: Actor::new(2, "m"),
        });
        assert_eq!(join.kind(), "member_join");
        assert!(format!("{:?}", join).contains("MemberJoin"));
    }
}
