// ABOUTME: Routes slash invocations and menu selections to their handlers
// ABOUTME: Contains every failure (errors and panics) to the interaction that raised it

use anyhow::Result;
use async_trait::async_trait;
use futures_util::FutureExt;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use crate::commands::{CommandContext, CommandRegistry};
use crate::error::{panic_message, InteractionError};
use crate::events::{Interaction, MenuSelection, SlashInvocation};
use crate::metrics;
use crate::traits::{Notice, Reply};

pub const FAILURE_TITLE: &str = "❌ Error";
pub const FAILURE_DESCRIPTION: &str = "Something went wrong while performing that action.";
pub const NOT_FOUND_TITLE: &str = "❌ Command Not Found";

/// Handles selections from one select menu
#[async_trait]
pub trait MenuHandler: Send + Sync {
    async fn handle(&self, selection: &MenuSelection) -> Result<()>;
}

/// Terminal state of one routed interaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    /// The handler ran to completion
    Executed,
    /// Unknown command; the actor was told privately
    NotFound,
    /// Unrecognised menu; dropped without a reply
    Ignored,
    /// The handler failed or panicked; a generic notice was attempted
    Failed,
}

impl RouteOutcome {
    fn as_str(self) -> &'static str {
        match self {
            Self::Executed => "executed",
            Self::NotFound => "not_found",
            Self::Ignored => "ignored",
            Self::Failed => "failed",
        }
    }
}

pub struct InteractionRouter {
    registry: Arc<CommandRegistry>,
    menus: HashMap<String, Arc<dyn MenuHandler>>,
}

impl InteractionRouter {
    pub fn new(registry: Arc<CommandRegistry>) -> Self {
        Self {
            registry,
            menus: HashMap::new(),
        }
    }

    /// Attach the handler for a menu custom id
    pub fn with_menu(
        mut self,
        custom_id: impl Into<String>,
        handler: Arc<dyn MenuHandler>,
    ) -> Self {
        self.menus.insert(custom_id.into(), handler);
        self
    }

    pub fn registry(&self) -> &Arc<CommandRegistry> {
        &self.registry
    }

    /// Route one interaction to completion. Never fails.
    pub async fn route(&self, interaction: Interaction) -> RouteOutcome {
        let result = AssertUnwindSafe(self.dispatch(&interaction))
            .catch_unwind()
            .await;

        let failure = match result {
            Ok(Ok(outcome)) => {
                metrics::record_interaction(outcome.as_str());
                return outcome;
            }
            Ok(Err(e)) => InteractionError::Execution {
                label: interaction.label().to_string(),
                reason: format!("{:#}", e),
            },
            Err(panic) => InteractionError::Panicked {
                label: interaction.label().to_string(),
                reason: panic_message(panic.as_ref()),
            },
        };

        let actor = interaction.actor();
        tracing::error!(
            interaction = interaction.label(),
            user_id = %actor.id,
            user = %actor.tag,
            error = %failure,
            "Interaction failed"
        );
        metrics::record_interaction(RouteOutcome::Failed.as_str());

        let notice = Reply::notice(Notice::error(FAILURE_TITLE, FAILURE_DESCRIPTION)).ephemeral();
        if let Err(e) = interaction.responder().reply(notice).await {
            tracing::debug!(
                interaction = interaction.label(),
                error = format!("{:#}", e),
                "Could not deliver failure notice"
            );
        }
        RouteOutcome::Failed
    }

    async fn dispatch(&self, interaction: &Interaction) -> Result<RouteOutcome> {
        match interaction {
            Interaction::SlashInvocation(invocation) => self.run_command(invocation).await,
            Interaction::MenuSelection(selection) => self.run_menu(selection).await,
        }
    }

    async fn run_command(&self, invocation: &SlashInvocation) -> Result<RouteOutcome> {
        let Some(command) = self.registry.lookup(&invocation.command_name) else {
            tracing::info!(
                command = %invocation.command_name,
                user_id = %invocation.actor.id,
                "Unknown command"
            );
            let notice = Notice::error(
                NOT_FOUND_TITLE,
                format!(
                    "The command `/{}` does not exist or is no longer available.",
                    invocation.command_name
                ),
            );
            if let Err(e) = invocation.responder.reply(Reply::notice(notice).ephemeral()).await {
                tracing::debug!(error = format!("{:#}", e), "Could not deliver not-found notice");
            }
            return Ok(RouteOutcome::NotFound);
        };

        tracing::debug!(
            command = %command.name,
            user_id = %invocation.actor.id,
            group_id = ?invocation.group,
            "Executing command"
        );
        command
            .execute(CommandContext {
                invocation,
                registry: &self.registry,
            })
            .await?;
        Ok(RouteOutcome::Executed)
    }

    async fn run_menu(&self, selection: &MenuSelection) -> Result<RouteOutcome> {
        let Some(handler) = self.menus.get(&selection.custom_id) else {
            tracing::debug!(custom_id = %selection.custom_id, "Ignoring unrecognised menu");
            return Ok(RouteOutcome::Ignored);
        };
        handler.handle(selection).await?;
        Ok(RouteOutcome::Executed)
    }
}
