// ABOUTME: Platform abstraction module for skidbot
// ABOUTME: Re-exports the Discord implementation of the core platform seam

pub mod discord;

pub use discord::{
    DiscordCommands, DiscordGuilds, DiscordModerator, DiscordPlatform, DiscordPresence,
};
