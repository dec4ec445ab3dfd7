// ABOUTME: Command definitions, command sources, and the immutable command registry
// ABOUTME: Loads definitions once, rejects malformed ones individually, bulk-registers with the platform

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::{CommandError, RegistrationError};
use crate::events::SlashInvocation;
use crate::traits::{CommandDescriptor, CommandPublisher, ParameterSpec, Reply};

/// Description submitted for commands that do not provide one
pub const DEFAULT_DESCRIPTION: &str = "No description provided";

/// Everything a command sees while executing
pub struct CommandContext<'a> {
    pub invocation: &'a SlashInvocation,
    /// The registry the command was resolved from (read-only)
    pub registry: &'a CommandRegistry,
}

impl CommandContext<'_> {
    /// Reply to the invoking actor
    pub async fn reply(&self, reply: Reply) -> Result<()> {
        self.invocation.responder.reply(reply).await
    }
}

/// The execute capability of a command
#[async_trait]
pub trait CommandHandler: Send + Sync {
    async fn execute(&self, ctx: CommandContext<'_>) -> Result<()>;
}

/// A validated, loaded command. Immutable once in the registry.
#[derive(Clone)]
pub struct Command {
    pub name: String,
    pub description: Option<String>,
    pub options: Vec<ParameterSpec>,
    handler: Arc<dyn CommandHandler>,
}

impl Command {
    /// The form submitted to the platform
    pub fn descriptor(&self) -> CommandDescriptor {
        CommandDescriptor {
            name: self.name.clone(),
            description: self
                .description
                .clone()
                .filter(|d| !d.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_DESCRIPTION.to_string()),
            options: self.options.clone(),
        }
    }

    pub async fn execute(&self, ctx: CommandContext<'_>) -> Result<()> {
        self.handler.execute(ctx).await
    }
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Command")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("options", &self.options.len())
            .finish_non_exhaustive()
    }
}

/// An unvalidated definition as produced by a source
#[derive(Clone, Default)]
pub struct CommandDefinition {
    /// Where the definition came from, for logs
    pub origin: String,
    pub name: Option<String>,
    pub description: Option<String>,
    pub options: Vec<ParameterSpec>,
    pub handler: Option<Arc<dyn CommandHandler>>,
}

impl CommandDefinition {
    pub fn new(name: impl Into<String>, handler: Arc<dyn CommandHandler>) -> Self {
        let name = name.into();
        Self {
            origin: format!("builtin:{}", name),
            name: Some(name),
            handler: Some(handler),
            ..Self::default()
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn option(mut self, option: ParameterSpec) -> Self {
        self.options.push(option);
        self
    }

    /// A definition is loadable iff it has a non-empty name and a handler
    pub fn validate(self) -> Result<Command, CommandError> {
        let name = match self.name {
            Some(name) if !name.trim().is_empty() => name.trim().to_string(),
            _ => {
                return Err(CommandError::DefinitionInvalid {
                    origin: self.origin,
                    reason: "missing 'name'".to_string(),
                })
            }
        };
        let Some(handler) = self.handler else {
            return Err(CommandError::DefinitionInvalid {
                origin: self.origin,
                reason: format!("command '{}' has no execute handler", name),
            });
        };
        Ok(Command {
            name,
            description: self.description,
            options: self.options,
            handler,
        })
    }
}

/// Where command definitions are discovered
pub trait CommandSource: Send + Sync {
    /// Human-readable source name for logs
    fn describe(&self) -> String;

    /// All definitions, valid or not. Fails only if the source is unreadable.
    fn definitions(&self) -> Result<Vec<CommandDefinition>, CommandError>;
}

/// Compiled-in command table
#[derive(Clone, Default)]
pub struct StaticSource {
    definitions: Vec<CommandDefinition>,
}

impl StaticSource {
    pub fn new(definitions: Vec<CommandDefinition>) -> Self {
        Self { definitions }
    }
}

impl CommandSource for StaticSource {
    fn describe(&self) -> String {
        "builtin command table".to_string()
    }

    fn definitions(&self) -> Result<Vec<CommandDefinition>, CommandError> {
        Ok(self.definitions.clone())
    }
}

#[derive(Debug, Deserialize)]
struct Manifest {
    #[serde(default, rename = "command")]
    commands: Vec<ManifestEntry>,
}

#[derive(Debug, Deserialize)]
struct ManifestEntry {
    name: Option<String>,
    description: Option<String>,
    /// Id of a known handler; an unknown id leaves the entry without one
    handler: Option<String>,
    #[serde(default)]
    options: Vec<ParameterSpec>,
}

/// TOML manifest that selects and describes known handlers:
///
/// ```toml
/// [[command]]
/// name = "help"
/// description = "List available commands"
/// handler = "help"
/// ```
pub struct ManifestSource {
    path: PathBuf,
    handlers: HashMap<String, Arc<dyn CommandHandler>>,
}

impl ManifestSource {
    pub fn new(
        path: impl Into<PathBuf>,
        handlers: HashMap<String, Arc<dyn CommandHandler>>,
    ) -> Self {
        Self {
            path: path.into(),
            handlers,
        }
    }
}

impl CommandSource for ManifestSource {
    fn describe(&self) -> String {
        format!("manifest {}", self.path.display())
    }

    fn definitions(&self) -> Result<Vec<CommandDefinition>, CommandError> {
        let content =
            std::fs::read_to_string(&self.path).map_err(|e| CommandError::Discovery {
                origin: self.describe(),
                reason: e.to_string(),
            })?;
        let manifest: Manifest = toml::from_str(&content).map_err(|e| CommandError::Discovery {
            origin: self.describe(),
            reason: e.to_string(),
        })?;

        let definitions = manifest
            .commands
            .into_iter()
            .enumerate()
            .map(|(index, entry)| {
                let handler = entry.handler.as_deref().and_then(|id| {
                    let found = self.handlers.get(id).cloned();
                    if found.is_none() {
                        tracing::warn!(
                            manifest = %self.path.display(),
                            entry = index,
                            handler = id,
                            "Manifest entry references an unknown handler"
                        );
                    }
                    found
                });
                CommandDefinition {
                    origin: format!("{}#{}", self.path.display(), index),
                    name: entry.name,
                    description: entry.description,
                    options: entry.options,
                    handler,
                }
            })
            .collect();
        Ok(definitions)
    }
}

/// Name → command mapping. Built once at startup, read-only afterwards.
#[derive(Default)]
pub struct CommandRegistry {
    commands: HashMap<String, Command>,
}

impl CommandRegistry {
    /// Build the registry from a source, skipping invalid definitions
    pub fn load(source: &dyn CommandSource) -> Result<Self, CommandError> {
        let definitions = source.definitions()?;
        let mut commands = HashMap::new();

        for definition in definitions {
            match definition.validate() {
                Ok(command) => {
                    tracing::info!(command = %command.name, "Loaded command");
                    if let Some(previous) = commands.insert(command.name.clone(), command) {
                        tracing::warn!(
                            command = %previous.name,
                            "Duplicate command name, later definition replaces the earlier one"
                        );
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping invalid command definition");
                }
            }
        }

        tracing::info!(
            source = %source.describe(),
            count = commands.len(),
            "Command registry built"
        );
        Ok(Self { commands })
    }

    pub fn lookup(&self, name: &str) -> Option<&Command> {
        self.commands.get(name)
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Command names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.commands.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Loaded commands, sorted by name
    pub fn commands(&self) -> Vec<&Command> {
        let mut commands: Vec<&Command> = self.commands.values().collect();
        commands.sort_by(|a, b| a.name.cmp(&b.name));
        commands
    }

    /// Descriptors for the platform, sorted by name
    pub fn descriptors(&self) -> Vec<CommandDescriptor> {
        self.commands().into_iter().map(Command::descriptor).collect()
    }

    /// Replace the platform's global command table with this registry in one
    /// bulk call. Not retried; commands stay usable locally on failure.
    pub async fn register_with_platform(
        &self,
        publisher: &dyn CommandPublisher,
    ) -> Result<usize, RegistrationError> {
        let descriptors = self.descriptors();
        let count = descriptors.len();

        publisher
            .set_global_commands(&descriptors)
            .await
            .map_err(|e| RegistrationError {
                count,
                reason: format!("{:#}", e),
            })?;

        tracing::info!(
            count,
            commands = %self.names().join(", "),
            "Registered global commands"
        );
        Ok(count)
    }
}
