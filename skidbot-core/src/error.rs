// ABOUTME: Error taxonomy for the control core and the two process-scope error handlers
// ABOUTME: Every error is contained to the event that raised it; only these handlers see what escapes

use std::path::PathBuf;
use thiserror::Error;

use crate::traits::{GroupId, UserId};

/// Failures while building the command registry
#[derive(Debug, Error)]
pub enum CommandError {
    /// The command source itself could not be read. Aborts the load step.
    #[error("command source {origin} is unreadable: {reason}")]
    Discovery { origin: String, reason: String },

    /// One definition is malformed. Skipped; loading continues.
    #[error("command definition {origin} is invalid: {reason}")]
    DefinitionInvalid { origin: String, reason: String },
}

/// The platform rejected the bulk command submit
#[derive(Debug, Error)]
#[error("failed to register {count} commands with the platform: {reason}")]
pub struct RegistrationError {
    pub count: usize,
    pub reason: String,
}

/// The flag file could not be read; callers see an empty mapping instead
#[derive(Debug, Error)]
pub enum PersistenceReadError {
    #[error("failed to read flag file {}: {reason}", path.display())]
    Io { path: PathBuf, reason: String },

    #[error("flag file {} is malformed: {reason}", path.display())]
    Malformed { path: PathBuf, reason: String },
}

/// Marker role failures; each abandons reconciliation for the current event
#[derive(Debug, Error)]
pub enum RoleError {
    #[error("failed to resolve roles in group {group}: {reason}")]
    Resolution { group: GroupId, reason: String },

    #[error("failed to create marker role in group {group}: {reason}")]
    Creation { group: GroupId, reason: String },

    #[error("failed to grant marker role to {user} in group {group}: {reason}")]
    Grant {
        group: GroupId,
        user: UserId,
        reason: String,
    },
}

/// A handler failed while serving an interaction
#[derive(Debug, Error)]
pub enum InteractionError {
    #[error("interaction '{label}' failed: {reason}")]
    Execution { label: String, reason: String },

    #[error("interaction '{label}' panicked: {reason}")]
    Panicked { label: String, reason: String },
}

/// A single presence update could not be applied
#[derive(Debug, Error)]
#[error("failed to apply presence '{activity}': {reason}")]
pub struct PresenceApplyError {
    pub activity: String,
    pub reason: String,
}

/// Render a panic payload as text
pub fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Non-critical handler: an error escaped a single event task
pub fn report_error(context: &str, error: &anyhow::Error) {
    crate::metrics::record_task_failure("error");
    tracing::error!(context, error = format!("{:#}", error), "Unhandled error");
}

/// Critical handler: a panic or other process-scope failure
pub fn report_critical(context: &str, detail: &str) {
    crate::metrics::record_task_failure("critical");
    tracing::error!(target: "skidbot::critical", context, detail, "Critical error");
}
