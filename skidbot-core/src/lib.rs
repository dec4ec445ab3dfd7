// ABOUTME: Platform-agnostic control core for the skidbot chat automation agent
// ABOUTME: Command registry, interaction routing, presence rotation, and marker role reconciliation

pub mod commands;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod events;
pub mod flags;
pub mod metrics;
pub mod paths;
pub mod presence;
pub mod reaction;
pub mod reconcile;
pub mod router;
pub mod testing;
pub mod traits;

pub use commands::{
    Command, CommandContext, CommandDefinition, CommandHandler, CommandRegistry, CommandSource,
    ManifestSource, StaticSource,
};
pub use config::Config;
pub use dispatcher::{Dispatcher, DispatcherSettings};
pub use events::{
    InboundMessage, Interaction, MemberJoin, MenuSelection, PlatformEvent, ReadyEvent,
    SlashInvocation,
};
pub use flags::{FlagStore, JsonFlagFile};
pub use presence::{PresenceRotator, PresenceSchedule, StatusDescriptor};
pub use reaction::ReactionDeck;
pub use reconcile::{ReconcileOutcome, RoleReconciler};
pub use router::{InteractionRouter, MenuHandler, RouteOutcome};

// Re-export the platform seam for convenient access
pub use traits::{
    // Platform
    ChatPlatform, EventStream,
    // Capabilities
    ChannelModerator, CommandPublisher, ExternalMessagePolicy, GuildApi, InteractionResponder,
    MessageResponder, PresenceSink,
    // Data Types
    Activity, ActivityKind, Actor, ChannelId, CommandDescriptor, GroupId, MessageReply, Notice,
    OnlineStatus, ParameterKind, ParameterSpec, Presence, Reply, Role, RoleId, RoleSpec,
    SelectMenu, SelectOption, UserId,
};
