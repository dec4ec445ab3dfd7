// ABOUTME: In-memory doubles for the platform seam, shared by unit and integration tests
// ABOUTME: Each double records what the core asked of it and can be told to fail

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::commands::{CommandContext, CommandHandler};
use crate::events::{InboundMessage, Interaction, MenuSelection, SlashInvocation};
use crate::flags::FlagStore;
use crate::traits::{
    Actor, ChannelId, ChannelModerator, CommandDescriptor, CommandPublisher, ExternalMessagePolicy,
    GroupId, GuildApi, InteractionResponder, MessageReply, MessageResponder, Presence,
    PresenceSink, Reply, Role, RoleId, RoleSpec, UserId,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// =============================================================================
// Responders
// =============================================================================

/// Records interaction replies
#[derive(Default)]
pub struct RecordingResponder {
    replies: Mutex<Vec<Reply>>,
    fail: AtomicBool,
}

impl RecordingResponder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every reply attempt fails (and is not recorded)
    pub fn failing() -> Self {
        let responder = Self::default();
        responder.fail.store(true, Ordering::SeqCst);
        responder
    }

    pub fn replies(&self) -> Vec<Reply> {
        lock(&self.replies).clone()
    }
}

#[async_trait]
impl InteractionResponder for RecordingResponder {
    async fn reply(&self, reply: Reply) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(anyhow!("interaction token expired"));
        }
        lock(&self.replies).push(reply);
        Ok(())
    }
}

/// Records replies to plain messages
#[derive(Default)]
pub struct RecordingMessageResponder {
    replies: Mutex<Vec<MessageReply>>,
}

impl RecordingMessageResponder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn replies(&self) -> Vec<MessageReply> {
        lock(&self.replies).clone()
    }
}

#[async_trait]
impl MessageResponder for RecordingMessageResponder {
    async fn reply(&self, reply: MessageReply) -> Result<()> {
        lock(&self.replies).push(reply);
        Ok(())
    }
}

// =============================================================================
// Presence and command table
// =============================================================================

/// Records every applied presence; individual calls can be made to fail
pub struct RecordingPresence {
    group_count: AtomicUsize,
    applied: Mutex<Vec<Presence>>,
    attempts: AtomicUsize,
    /// Zero-based attempt numbers that fail
    failing_attempts: Mutex<Vec<usize>>,
}

impl RecordingPresence {
    pub fn new(group_count: usize) -> Self {
        Self {
            group_count: AtomicUsize::new(group_count),
            applied: Mutex::new(Vec::new()),
            attempts: AtomicUsize::new(0),
            failing_attempts: Mutex::new(Vec::new()),
        }
    }

    pub fn fail_attempts(&self, attempts: &[usize]) {
        lock(&self.failing_attempts).extend_from_slice(attempts);
    }

    pub fn set_group_count(&self, count: usize) {
        self.group_count.store(count, Ordering::SeqCst);
    }

    /// Successfully applied presences, in order
    pub fn applied(&self) -> Vec<Presence> {
        lock(&self.applied).clone()
    }

    /// Activity names of successful applies, in order
    pub fn applied_names(&self) -> Vec<String> {
        self.applied()
            .into_iter()
            .map(|p| p.activity.name)
            .collect()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PresenceSink for RecordingPresence {
    fn group_count(&self) -> usize {
        self.group_count.load(Ordering::SeqCst)
    }

    async fn set_presence(&self, presence: &Presence) -> Result<()> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
        if lock(&self.failing_attempts).contains(&attempt) {
            return Err(anyhow!("gateway unavailable"));
        }
        lock(&self.applied).push(presence.clone());
        Ok(())
    }
}

/// Models the platform's global command table
#[derive(Default)]
pub struct RecordingPublisher {
    calls: Mutex<Vec<Vec<CommandDescriptor>>>,
    visible: Mutex<Vec<CommandDescriptor>>,
    fail: bool,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Every bulk submit, in order
    pub fn calls(&self) -> Vec<Vec<CommandDescriptor>> {
        lock(&self.calls).clone()
    }

    /// The command table as it currently stands
    pub fn visible(&self) -> Vec<CommandDescriptor> {
        lock(&self.visible).clone()
    }
}

#[async_trait]
impl CommandPublisher for RecordingPublisher {
    async fn set_global_commands(&self, commands: &[CommandDescriptor]) -> Result<()> {
        if self.fail {
            return Err(anyhow!("401: Unauthorized"));
        }
        lock(&self.calls).push(commands.to_vec());
        *lock(&self.visible) = commands.to_vec();
        Ok(())
    }
}

// =============================================================================
// Groups
// =============================================================================

/// One failure switch per guild operation
#[derive(Debug, Default, Clone, Copy)]
pub struct GuildFailures {
    pub roles: bool,
    pub create: bool,
    pub members: bool,
    pub grant: bool,
}

/// In-memory groups with roles and member role sets
#[derive(Default)]
pub struct MockGuilds {
    roles: Mutex<HashMap<GroupId, Vec<Role>>>,
    members: Mutex<HashMap<(GroupId, UserId), Vec<RoleId>>>,
    next_role_id: AtomicU64,
    creates: AtomicUsize,
    grants: AtomicUsize,
    failures: Mutex<GuildFailures>,
}

impl MockGuilds {
    pub fn new() -> Self {
        Self {
            next_role_id: AtomicU64::new(1000),
            ..Self::default()
        }
    }

    pub fn with_role(self, group: GroupId, name: &str) -> Self {
        let id = RoleId(self.next_role_id.fetch_add(1, Ordering::SeqCst));
        lock(&self.roles).entry(group).or_default().push(Role {
            id,
            name: name.to_string(),
            color: 0,
        });
        self
    }

    pub fn with_member(self, group: GroupId, user: UserId) -> Self {
        lock(&self.members).entry((group, user)).or_default();
        self
    }

    pub fn fail(&self, failures: GuildFailures) {
        *lock(&self.failures) = failures;
    }

    pub fn roles_in(&self, group: GroupId) -> Vec<Role> {
        lock(&self.roles).get(&group).cloned().unwrap_or_default()
    }

    pub fn member_roles(&self, group: GroupId, user: UserId) -> Vec<RoleId> {
        lock(&self.members)
            .get(&(group, user))
            .cloned()
            .unwrap_or_default()
    }

    pub fn create_calls(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }

    pub fn grant_calls(&self) -> usize {
        self.grants.load(Ordering::SeqCst)
    }

    fn failures(&self) -> GuildFailures {
        *lock(&self.failures)
    }
}

#[async_trait]
impl GuildApi for MockGuilds {
    async fn roles(&self, group: GroupId) -> Result<Vec<Role>> {
        if self.failures().roles {
            return Err(anyhow!("roles endpoint unavailable"));
        }
        Ok(self.roles_in(group))
    }

    async fn create_role(&self, group: GroupId, spec: &RoleSpec) -> Result<Role> {
        self.creates.fetch_add(1, Ordering::SeqCst);
        if self.failures().create {
            return Err(anyhow!("Missing Permissions"));
        }
        let role = Role {
            id: RoleId(self.next_role_id.fetch_add(1, Ordering::SeqCst)),
            name: spec.name.clone(),
            color: spec.color,
        };
        lock(&self.roles).entry(group).or_default().push(role.clone());
        Ok(role)
    }

    async fn member_role_ids(&self, group: GroupId, user: UserId) -> Result<Vec<RoleId>> {
        if self.failures().members {
            return Err(anyhow!("Unknown Member"));
        }
        lock(&self.members)
            .get(&(group, user))
            .cloned()
            .ok_or_else(|| anyhow!("Unknown Member"))
    }

    async fn add_member_role(
        &self,
        group: GroupId,
        user: UserId,
        role: RoleId,
        _reason: &str,
    ) -> Result<()> {
        self.grants.fetch_add(1, Ordering::SeqCst);
        if self.failures().grant {
            return Err(anyhow!("Missing Permissions"));
        }
        let mut members = lock(&self.members);
        let held = members.entry((group, user)).or_default();
        if !held.contains(&role) {
            held.push(role);
        }
        Ok(())
    }
}

// =============================================================================
// Flags, commands, moderation, direct messages
// =============================================================================

/// Flags held in memory, shared across groups like the flag file
#[derive(Default)]
pub struct MemoryFlags {
    flags: Mutex<HashMap<UserId, Value>>,
}

impl MemoryFlags {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn flag(self, user: UserId) -> Self {
        self.set(user, Value::Bool(true));
        self
    }

    pub fn set(&self, user: UserId, value: Value) {
        lock(&self.flags).insert(user, value);
    }
}

#[async_trait]
impl FlagStore for MemoryFlags {
    async fn get(&self, _group: GroupId, user: UserId) -> Option<Value> {
        lock(&self.flags).get(&user).cloned()
    }
}

/// A command that does nothing
pub struct NoopCommand;

#[async_trait]
impl CommandHandler for NoopCommand {
    async fn execute(&self, _ctx: CommandContext<'_>) -> Result<()> {
        Ok(())
    }
}

/// Records slowmode changes
#[derive(Default)]
pub struct RecordingModerator {
    changes: Mutex<Vec<(ChannelId, u16)>>,
}

impl RecordingModerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn changes(&self) -> Vec<(ChannelId, u16)> {
        lock(&self.changes).clone()
    }
}

#[async_trait]
impl ChannelModerator for RecordingModerator {
    async fn set_slowmode(&self, channel: ChannelId, seconds: u16) -> Result<()> {
        lock(&self.changes).push((channel, seconds));
        Ok(())
    }
}

/// Records the ids of direct messages it was handed
#[derive(Default)]
pub struct RecordingPolicy {
    handled: Mutex<Vec<u64>>,
}

impl RecordingPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handled(&self) -> Vec<u64> {
        lock(&self.handled).clone()
    }
}

#[async_trait]
impl ExternalMessagePolicy for RecordingPolicy {
    async fn handle(&self, message: &InboundMessage) -> Result<()> {
        lock(&self.handled).push(message.id);
        Ok(())
    }
}

// =============================================================================
// Event builders
// =============================================================================

/// A slash invocation in group 1, channel 1, replying into `responder`
pub fn slash(
    name: &str,
    actor: Actor,
    payload: Value,
    responder: Arc<dyn InteractionResponder>,
) -> Interaction {
    Interaction::SlashInvocation(SlashInvocation {
        command_name: name.to_string(),
        actor,
        group: Some(GroupId(1)),
        channel: ChannelId(1),
        raw_payload: payload,
        responder,
    })
}

/// A menu selection in group 1, channel 1
pub fn selection(
    custom_id: &str,
    actor: Actor,
    values: &[&str],
    responder: Arc<dyn InteractionResponder>,
) -> Interaction {
    Interaction::MenuSelection(MenuSelection {
        custom_id: custom_id.to_string(),
        actor,
        group: Some(GroupId(1)),
        channel: ChannelId(1),
        values: values.iter().map(|v| v.to_string()).collect(),
        raw_payload: Value::Null,
        responder,
    })
}

/// A plain message
pub fn message(
    id: u64,
    group: Option<GroupId>,
    author: Actor,
    content: &str,
    responder: Arc<dyn MessageResponder>,
) -> InboundMessage {
    InboundMessage {
        id,
        group,
        channel: ChannelId(1),
        author,
        content: content.to_string(),
        responder,
    }
}
