// ABOUTME: Built-in slash commands and the command source selected by configuration
// ABOUTME: The compiled-in table is the default; a manifest can pick and redescribe handlers by id

pub mod help;
pub mod ping;
pub mod slowmode;

pub use help::HelpCommand;
pub use ping::PingCommand;
pub use slowmode::{SlowmodeCommand, SlowmodeMenu, SLOWMODE_MENU_ID};

use skidbot_core::commands::{
    CommandDefinition, CommandHandler, CommandSource, ManifestSource, StaticSource,
};
use skidbot_core::config::Config;
use std::collections::HashMap;
use std::sync::Arc;

/// Handlers addressable by id from a command manifest
pub fn handlers() -> HashMap<String, Arc<dyn CommandHandler>> {
    let mut handlers: HashMap<String, Arc<dyn CommandHandler>> = HashMap::new();
    handlers.insert("help".to_string(), Arc::new(HelpCommand));
    handlers.insert("ping".to_string(), Arc::new(PingCommand));
    handlers.insert("slowmode".to_string(), Arc::new(SlowmodeCommand));
    handlers
}

/// The compiled-in command table
pub fn builtin_definitions() -> Vec<CommandDefinition> {
    vec![
        CommandDefinition::new("help", Arc::new(HelpCommand))
            .description("List the commands this bot understands"),
        CommandDefinition::new("ping", Arc::new(PingCommand))
            .description("Check that the bot is responsive"),
        CommandDefinition::new("slowmode", Arc::new(SlowmodeCommand))
            .description("Set the slowmode delay for this channel"),
    ]
}

/// Manifest when configured, otherwise the built-in table
pub fn source(config: &Config) -> Arc<dyn CommandSource> {
    match &config.commands.manifest {
        Some(path) => {
            tracing::info!(manifest = %path, "Loading commands from manifest");
            Arc::new(ManifestSource::new(path, handlers()))
        }
        None => Arc::new(StaticSource::new(builtin_definitions())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skidbot_core::commands::CommandRegistry;

    #[test]
    fn test_builtin_table_loads_completely() {
        let registry = CommandRegistry::load(&StaticSource::new(builtin_definitions())).unwrap();
        assert_eq!(registry.names(), vec!["help", "ping", "slowmode"]);
        assert!(registry
            .descriptors()
            .iter()
            .all(|d| d.description != skidbot_core::commands::DEFAULT_DESCRIPTION));
    }

    #[test]
    fn test_every_builtin_has_a_manifest_handler() {
        let handlers = handlers();
        for definition in builtin_definitions() {
            let name = definition.name.unwrap();
            assert!(handlers.contains_key(&name), "no handler id for {}", name);
        }
    }

    #[test]
    fn test_source_follows_config() {
        let config = Config::default();
        assert_eq!(source(&config).describe(), "builtin command table");

        let mut config = Config::default();
        config.commands.manifest = Some("commands.toml".to_string());
        assert_eq!(source(&config).describe(), "manifest commands.toml");
    }
}
