// ABOUTME: End-to-end event handling through the dispatcher with mock platform capabilities
// ABOUTME: Startup on ready, message notices, silent rejoin grants, and event loop isolation

use anyhow::Result;
use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde_json::Value;
use skidbot_core::commands::{CommandDefinition, ManifestSource, StaticSource};
use skidbot_core::reaction::{DEFAULT_ICONS, DEFAULT_IMAGE_URL};
use skidbot_core::reconcile::default_marker;
use skidbot_core::router::NOT_FOUND_TITLE;
use skidbot_core::testing::{
    message, slash, GuildFailures, MemoryFlags, MockGuilds, NoopCommand,
    RecordingMessageResponder, RecordingPolicy, RecordingPresence, RecordingPublisher,
    RecordingResponder,
};
use skidbot_core::{
    Actor, CommandSource, Dispatcher, DispatcherSettings, ExternalMessagePolicy, GroupId,
    InboundMessage, MemberJoin, PlatformEvent, ReadyEvent, RoleReconciler, UserId,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_stream::wrappers::ReceiverStream;

const G: GroupId = GroupId(1);
const FLAGGED: u64 = 100;
const PLAIN: u64 = 200;

struct Harness {
    guilds: Arc<MockGuilds>,
    policy: Arc<RecordingPolicy>,
    dispatcher: Arc<Dispatcher>,
}

fn builtin_source() -> Arc<dyn CommandSource> {
    Arc::new(StaticSource::new(vec![
        CommandDefinition::new("help", Arc::new(NoopCommand)).description("List commands"),
        CommandDefinition::new("ping", Arc::new(NoopCommand)),
    ]))
}

fn harness_with(guilds: MockGuilds, source: Arc<dyn CommandSource>) -> Harness {
    let guilds = Arc::new(
        guilds
            .with_member(G, UserId(FLAGGED))
            .with_member(G, UserId(PLAIN)),
    );
    let flags = Arc::new(MemoryFlags::new().flag(UserId(FLAGGED)));
    let reconciler = Arc::new(RoleReconciler::new(guilds.clone(), flags, default_marker()));
    let policy = Arc::new(RecordingPolicy::new());
    let dispatcher = Dispatcher::new(
        source,
        reconciler,
        policy.clone(),
        DispatcherSettings::default(),
    )
    .with_rng(StdRng::seed_from_u64(11));
    Harness {
        guilds,
        policy,
        dispatcher: Arc::new(dispatcher),
    }
}

fn harness() -> Harness {
    harness_with(MockGuilds::new(), builtin_source())
}

fn ready(presence: Arc<RecordingPresence>, publisher: Arc<RecordingPublisher>) -> PlatformEvent {
    PlatformEvent::Ready(ReadyEvent {
        bot_tag: "skidbot#0001".to_string(),
        group_count: 1,
        presence,
        commands: publisher,
    })
}

fn group_message(
    id: u64,
    author: Actor,
    responder: Arc<RecordingMessageResponder>,
) -> PlatformEvent {
    PlatformEvent::Message(message(id, Some(G), author, "hello", responder))
}

async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}

/// Let spawned timers register, then fire whatever is due on the paused clock
async fn settle_timers() {
    settle().await;
    tokio::time::advance(Duration::ZERO).await;
    settle().await;
}

// ─── Startup ────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_ready_registers_commands_and_starts_presence() {
    let h = harness();
    let presence = Arc::new(RecordingPresence::new(3));
    let publisher = Arc::new(RecordingPublisher::new());

    h.dispatcher
        .handle(ready(presence.clone(), publisher.clone()))
        .await
        .unwrap();
    settle_timers().await;

    let calls = publisher.calls();
    assert_eq!(calls.len(), 1);
    let names: Vec<_> = calls[0].iter().map(|d| d.name.as_str()).collect();
    assert_eq!(names, vec!["help", "ping"]);
    assert_eq!(calls[0][1].description, "No description provided");

    assert_eq!(presence.applied_names(), vec!["/help"]);
    assert!(h.dispatcher.router().is_some());
}

#[tokio::test]
async fn test_duplicate_ready_is_a_no_op() {
    let h = harness();
    let publisher = Arc::new(RecordingPublisher::new());
    h.dispatcher
        .handle(ready(Arc::new(RecordingPresence::new(1)), publisher.clone()))
        .await
        .unwrap();

    let second_presence = Arc::new(RecordingPresence::new(1));
    h.dispatcher
        .handle(ready(second_presence.clone(), publisher.clone()))
        .await
        .unwrap();
    settle().await;

    assert_eq!(publisher.calls().len(), 1);
    assert_eq!(second_presence.attempts(), 0);
}

#[tokio::test]
async fn test_registration_failure_keeps_commands_usable() {
    let h = harness();
    h.dispatcher
        .handle(ready(
            Arc::new(RecordingPresence::new(1)),
            Arc::new(RecordingPublisher::failing()),
        ))
        .await
        .unwrap();

    let router = h.dispatcher.router().expect("router should be built");
    assert!(router.registry().lookup("ping").is_some());
}

#[tokio::test(start_paused = true)]
async fn test_failed_discovery_skips_registration_but_serves() {
    let dir = tempfile::TempDir::new().unwrap();
    let source = Arc::new(ManifestSource::new(
        dir.path().join("missing.toml"),
        HashMap::new(),
    ));
    let h = harness_with(MockGuilds::new(), source);
    let presence = Arc::new(RecordingPresence::new(1));
    let publisher = Arc::new(RecordingPublisher::new());

    h.dispatcher
        .handle(ready(presence.clone(), publisher.clone()))
        .await
        .unwrap();
    settle_timers().await;

    assert!(publisher.calls().is_empty());
    assert_eq!(presence.attempts(), 1);

    let responder = Arc::new(RecordingResponder::new());
    h.dispatcher
        .handle(PlatformEvent::Interaction(slash(
            "ping",
            Actor::new(PLAIN, "plain"),
            Value::Null,
            responder.clone(),
        )))
        .await
        .unwrap();
    assert_eq!(responder.replies()[0].notices[0].title, NOT_FOUND_TITLE);
}

#[tokio::test]
async fn test_interaction_before_ready_is_dropped() {
    let h = harness();
    let responder = Arc::new(RecordingResponder::new());
    h.dispatcher
        .handle(PlatformEvent::Interaction(slash(
            "ping",
            Actor::new(PLAIN, "plain"),
            Value::Null,
            responder.clone(),
        )))
        .await
        .unwrap();
    assert!(responder.replies().is_empty());
}

// ─── Messages ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_flagged_message_creates_role_and_posts_notice_without_granting() {
    let h = harness();
    let responder = Arc::new(RecordingMessageResponder::new());

    h.dispatcher
        .handle(group_message(1, Actor::new(FLAGGED, "flagged"), responder.clone()))
        .await
        .unwrap();

    let roles = h.guilds.roles_in(G);
    assert_eq!(roles.len(), 1);
    assert_eq!(roles[0].name, "Skidder");
    assert!(h.guilds.member_roles(G, UserId(FLAGGED)).is_empty());
    assert_eq!(h.guilds.grant_calls(), 0);

    let replies = responder.replies();
    assert_eq!(replies.len(), 1);
    let reply = &replies[0];
    assert!(DEFAULT_ICONS
        .iter()
        .any(|icon| reply.content.starts_with(icon) && reply.content.ends_with(icon)));
    assert_eq!(reply.attachment_url.as_deref(), Some(DEFAULT_IMAGE_URL));
    assert_eq!(reply.mention, Some(UserId(FLAGGED)));
}

#[tokio::test]
async fn test_flagged_message_gets_notice_when_marker_role_unavailable() {
    for failures in [
        GuildFailures {
            create: true,
            ..Default::default()
        },
        GuildFailures {
            roles: true,
            ..Default::default()
        },
    ] {
        let h = harness();
        h.guilds.fail(failures);
        let responder = Arc::new(RecordingMessageResponder::new());

        h.dispatcher
            .handle(group_message(1, Actor::new(FLAGGED, "flagged"), responder.clone()))
            .await
            .unwrap();

        let replies = responder.replies();
        assert_eq!(replies.len(), 1, "no notice with {:?}", failures);
        assert_eq!(replies[0].mention, Some(UserId(FLAGGED)));
        assert!(h.guilds.roles_in(G).is_empty());
        assert_eq!(h.guilds.grant_calls(), 0);
    }
}

#[tokio::test]
async fn test_unflagged_message_gets_no_notice_when_marker_role_unavailable() {
    let h = harness();
    h.guilds.fail(GuildFailures {
        create: true,
        ..Default::default()
    });
    let responder = Arc::new(RecordingMessageResponder::new());

    h.dispatcher
        .handle(group_message(1, Actor::new(PLAIN, "plain"), responder.clone()))
        .await
        .unwrap();

    assert!(responder.replies().is_empty());
}

#[tokio::test]
async fn test_unflagged_message_without_role_gets_no_notice() {
    let h = harness();
    let responder = Arc::new(RecordingMessageResponder::new());

    h.dispatcher
        .handle(group_message(1, Actor::new(PLAIN, "plain"), responder.clone()))
        .await
        .unwrap();

    assert!(responder.replies().is_empty());
    // The role is still ensured for the group
    assert_eq!(h.guilds.roles_in(G).len(), 1);
}

#[tokio::test]
async fn test_role_holder_without_flag_gets_notice() {
    let h = harness_with(MockGuilds::new().with_role(G, "skidder"), builtin_source());
    let role = h.guilds.roles_in(G)[0].clone();
    skidbot_core::GuildApi::add_member_role(h.guilds.as_ref(), G, UserId(PLAIN), role.id, "manual")
        .await
        .unwrap();
    let responder = Arc::new(RecordingMessageResponder::new());

    h.dispatcher
        .handle(group_message(1, Actor::new(PLAIN, "plain"), responder.clone()))
        .await
        .unwrap();

    assert_eq!(responder.replies().len(), 1);
    assert_eq!(h.guilds.create_calls(), 0);
}

#[tokio::test]
async fn test_bot_messages_are_ignored() {
    let h = harness();
    let responder = Arc::new(RecordingMessageResponder::new());
    h.dispatcher
        .handle(group_message(1, Actor::bot(FLAGGED, "bot"), responder.clone()))
        .await
        .unwrap();
    assert!(responder.replies().is_empty());
    assert!(h.guilds.roles_in(G).is_empty());
}

#[tokio::test]
async fn test_direct_messages_go_to_policy() {
    let h = harness();
    let responder = Arc::new(RecordingMessageResponder::new());
    h.dispatcher
        .handle(PlatformEvent::Message(message(
            42,
            None,
            Actor::new(FLAGGED, "flagged"),
            "hi",
            responder.clone(),
        )))
        .await
        .unwrap();

    assert_eq!(h.policy.handled(), vec![42]);
    assert!(responder.replies().is_empty());
    assert!(h.guilds.roles_in(G).is_empty());
}

// ─── Joins ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_flagged_rejoin_restores_role_silently() {
    let h = harness_with(MockGuilds::new().with_role(G, "Skidder"), builtin_source());
    let role = h.guilds.roles_in(G)[0].clone();

    h.dispatcher
        .handle(PlatformEvent::MemberJoin(MemberJoin {
            group: G,
            member: Actor::new(FLAGGED, "flagged"),
        }))
        .await
        .unwrap();

    assert_eq!(h.guilds.member_roles(G, UserId(FLAGGED)), vec![role.id]);
    assert_eq!(h.guilds.create_calls(), 0);
    assert!(h.policy.handled().is_empty());
}

#[tokio::test]
async fn test_unflagged_join_is_not_granted() {
    let h = harness();
    h.dispatcher
        .handle(PlatformEvent::MemberJoin(MemberJoin {
            group: G,
            member: Actor::new(PLAIN, "plain"),
        }))
        .await
        .unwrap();
    assert!(h.guilds.member_roles(G, UserId(PLAIN)).is_empty());
}

#[tokio::test]
async fn test_flagged_bot_account_join_is_reconciled() {
    let h = harness_with(MockGuilds::new().with_role(G, "Skidder"), builtin_source());
    let role = h.guilds.roles_in(G)[0].clone();

    h.dispatcher
        .handle(PlatformEvent::MemberJoin(MemberJoin {
            group: G,
            member: Actor::bot(FLAGGED, "flagged-bot"),
        }))
        .await
        .unwrap();

    assert_eq!(h.guilds.member_roles(G, UserId(FLAGGED)), vec![role.id]);
}

// ─── Event loop ─────────────────────────────────────────────────────

struct ExplodingPolicy;

#[async_trait]
impl ExternalMessagePolicy for ExplodingPolicy {
    async fn handle(&self, message: &InboundMessage) -> Result<()> {
        match message.content.as_str() {
            "panic" => panic!("policy exploded"),
            _ => anyhow::bail!("policy failed"),
        }
    }
}

#[tokio::test]
async fn test_run_loop_isolates_failing_and_panicking_tasks() {
    let guilds = Arc::new(MockGuilds::new().with_member(G, UserId(FLAGGED)));
    let flags = Arc::new(MemoryFlags::new().flag(UserId(FLAGGED)));
    let reconciler = Arc::new(RoleReconciler::new(guilds.clone(), flags, default_marker()));
    let dispatcher = Arc::new(Dispatcher::new(
        builtin_source(),
        reconciler,
        Arc::new(ExplodingPolicy),
        DispatcherSettings::default(),
    ));

    let (tx, rx) = tokio::sync::mpsc::channel(16);
    let responder = Arc::new(RecordingMessageResponder::new());
    let dm = |id, content| {
        PlatformEvent::Message(message(
            id,
            None,
            Actor::new(PLAIN, "plain"),
            content,
            Arc::new(RecordingMessageResponder::new()),
        ))
    };
    tx.send(dm(1, "panic")).await.unwrap();
    tx.send(dm(2, "error")).await.unwrap();
    tx.send(group_message(3, Actor::new(FLAGGED, "flagged"), responder.clone()))
        .await
        .unwrap();
    drop(tx);

    dispatcher.run(Box::pin(ReceiverStream::new(rx))).await;

    assert_eq!(responder.replies().len(), 1);
    assert_eq!(guilds.roles_in(G).len(), 1);
}
