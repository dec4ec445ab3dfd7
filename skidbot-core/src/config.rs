// ABOUTME: Configuration parsing from TOML file with environment variable overrides
// ABOUTME: Every section has defaults, so an empty file (or none at all) is a valid config
use crate::dispatcher::DispatcherSettings;
use crate::paths;
use crate::presence::{PresenceSchedule, StatusDescriptor};
use crate::reaction::{ReactionDeck, DEFAULT_IMAGE_URL};
use crate::reconcile::{DEFAULT_MARKER_COLOR, DEFAULT_MARKER_NAME, DEFAULT_MARKER_REASON};
use crate::traits::{ActivityKind, OnlineStatus, RoleSpec};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Environment variable naming an explicit config file
pub const CONFIG_PATH_ENV: &str = "SKIDBOT_CONFIG_PATH";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub discord: DiscordConfig,
    #[serde(default)]
    pub flags: FlagsConfig,
    #[serde(default)]
    pub marker: MarkerConfig,
    #[serde(default)]
    pub presence: PresenceConfig,
    #[serde(default)]
    pub reaction: ReactionConfig,
    #[serde(default)]
    pub commands: CommandsConfig,
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct DiscordConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

// Custom Debug impl to redact the bot token
impl std::fmt::Debug for DiscordConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscordConfig")
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlagsConfig {
    /// Flat JSON file mapping user ids to flag values
    #[serde(default = "default_flags_path")]
    pub path: String,
}

impl Default for FlagsConfig {
    fn default() -> Self {
        Self {
            path: default_flags_path(),
        }
    }
}

fn default_flags_path() -> String {
    "skiders.json".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkerConfig {
    #[serde(default = "default_marker_name")]
    pub name: String,
    #[serde(default = "default_marker_color")]
    pub color: u32,
    #[serde(default = "default_marker_reason")]
    pub reason: String,
}

impl Default for MarkerConfig {
    fn default() -> Self {
        Self {
            name: default_marker_name(),
            color: default_marker_color(),
            reason: default_marker_reason(),
        }
    }
}

fn default_marker_name() -> String {
    DEFAULT_MARKER_NAME.to_string()
}

fn default_marker_color() -> u32 {
    DEFAULT_MARKER_COLOR
}

fn default_marker_reason() -> String {
    DEFAULT_MARKER_REASON.to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresenceConfig {
    #[serde(default = "default_period_secs")]
    pub period_secs: u64,
    #[serde(default = "default_refresh_secs")]
    pub refresh_secs: u64,
    #[serde(default)]
    pub status: OnlineStatus,
    /// Rotation entries; `{guild_count}` in the text is filled in at apply time
    #[serde(default = "default_presence_entries")]
    pub entries: Vec<PresenceEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresenceEntry {
    pub text: String,
    #[serde(default)]
    pub kind: ActivityKind,
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            period_secs: default_period_secs(),
            refresh_secs: default_refresh_secs(),
            status: OnlineStatus::default(),
            entries: default_presence_entries(),
        }
    }
}

fn default_period_secs() -> u64 {
    120
}

fn default_refresh_secs() -> u64 {
    600
}

fn default_presence_entries() -> Vec<PresenceEntry> {
    ["/help", "mchbee.cloud {guild_count}", "https://mchbee.cloud"]
        .into_iter()
        .map(|text| PresenceEntry {
            text: text.to_string(),
            kind: ActivityKind::Streaming,
        })
        .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReactionConfig {
    #[serde(default = "default_image_url")]
    pub image_url: String,
}

impl Default for ReactionConfig {
    fn default() -> Self {
        Self {
            image_url: default_image_url(),
        }
    }
}

fn default_image_url() -> String {
    DEFAULT_IMAGE_URL.to_string()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommandsConfig {
    /// Optional TOML manifest; the built-in table is used when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manifest: Option<String>,
}

impl Config {
    /// Find the config file, checking multiple locations in order:
    /// 1. SKIDBOT_CONFIG_PATH env var (if set)
    /// 2. ./config.toml (current directory - for development)
    /// 3. ~/.config/skidbot/config.toml (XDG config dir)
    fn find_config_file() -> Option<PathBuf> {
        if let Ok(env_path) = std::env::var(CONFIG_PATH_ENV) {
            let path = PathBuf::from(&env_path);
            if path.exists() {
                return Some(path);
            }
        }

        let local_config = PathBuf::from("config.toml");
        if local_config.exists() {
            return Some(local_config);
        }

        let xdg_config = paths::config_file();
        if xdg_config.exists() {
            return Some(xdg_config);
        }

        None
    }

    /// Load configuration from config.toml with environment variable overrides
    pub fn load() -> Result<Self> {
        let mut config = if let Some(config_path) = Self::find_config_file() {
            tracing::info!(
                path = %config_path.display(),
                "Loading configuration from file"
            );
            let content = std::fs::read_to_string(&config_path)
                .with_context(|| format!("Failed to read {}", config_path.display()))?;
            Self::from_toml_str(&content)
                .with_context(|| format!("Failed to parse {}", config_path.display()))?
        } else {
            tracing::info!("No config file found, using environment variables and defaults");
            Config::default()
        };

        config.apply_env_overrides()?;
        config.flags.path = paths::expand_tilde(&config.flags.path);
        if let Some(manifest) = config.commands.manifest.as_mut() {
            *manifest = paths::expand_tilde(manifest);
        }
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(val) = std::env::var("DISCORD_TOKEN").or_else(|_| std::env::var("BOT_TOKEN")) {
            self.discord.token = Some(val);
        }
        if let Ok(val) = std::env::var("FLAGS_PATH") {
            self.flags.path = val;
        }
        if let Ok(val) = std::env::var("COMMANDS_MANIFEST") {
            self.commands.manifest = Some(val).filter(|v| !v.trim().is_empty());
        }
        if let Ok(val) = std::env::var("PRESENCE_PERIOD_SECS") {
            self.presence.period_secs = val.parse().with_context(|| {
                format!("PRESENCE_PERIOD_SECS must be a whole number of seconds, got '{}'", val)
            })?;
        }
        Ok(())
    }

    /// Checks that do not depend on what the process is about to do
    pub fn validate(&self) -> Result<()> {
        if self.presence.period_secs == 0 {
            anyhow::bail!("presence.period_secs must be greater than zero");
        }
        if self.presence.refresh_secs == 0 {
            anyhow::bail!("presence.refresh_secs must be greater than zero");
        }
        if self.presence.entries.is_empty() {
            anyhow::bail!("presence.entries must contain at least one entry");
        }
        if self.marker.name.trim().is_empty() {
            anyhow::bail!("marker.name must not be empty");
        }
        if self.flags.path.trim().is_empty() {
            anyhow::bail!("flags.path must not be empty");
        }
        Ok(())
    }

    /// The bot token, required to connect
    pub fn require_token(&self) -> Result<&str> {
        self.discord
            .token
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .context("discord.token is required (set in config.toml or DISCORD_TOKEN env var)")
    }

    pub fn marker_spec(&self) -> RoleSpec {
        RoleSpec {
            name: self.marker.name.trim().to_string(),
            color: self.marker.color,
            reason: self.marker.reason.clone(),
        }
    }

    pub fn presence_schedule(&self) -> Result<PresenceSchedule> {
        let entries = self
            .presence
            .entries
            .iter()
            .map(|e| StatusDescriptor::template(e.text.clone(), e.kind))
            .collect();
        PresenceSchedule::new(entries, self.presence.status)
    }

    pub fn dispatcher_settings(&self) -> Result<DispatcherSettings> {
        Ok(DispatcherSettings {
            schedule: self.presence_schedule()?,
            presence_period: Duration::from_secs(self.presence.period_secs),
            presence_refresh: Duration::from_secs(self.presence.refresh_secs),
            deck: ReactionDeck::default().with_image_url(self.reaction.image_url.clone()),
        })
    }
}
