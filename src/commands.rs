//! Typed commands over the engine: pre-validation and keyed user messages.
//!
//! The surrounding dispatch framework is out of scope; this module is its
//! boundary. Commands arrive as plain serde structs, incoming validators
//! reject malformed or unauthorized commands *before* any state transition
//! runs, and handlers translate engine outcomes into structured messages
//! with stable keys that a front end can localize.

use crate::engine::{AuthEngine, CreateMode, CreateResult};
use crate::error::AuthError;
use crate::store::CredentialStore;
use serde::{Deserialize, Serialize};

// ── Commands ─────────────────────────────────────────────────────────

/// Set (overwrite) the caller's own password.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetPasswordCommand {
    pub actor_id: i64,
    pub user_id: i64,
    pub password: String,
}

/// Establish or update a user's password under an explicit mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateOrUpdatePasswordCommand {
    pub actor_id: i64,
    pub user_id: i64,
    pub password: String,
    #[serde(default)]
    pub mode: CreateMode,
}

// ── User messages ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageLevel {
    Info,
    Error,
}

/// A user-facing message with a stable, localizable key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserMessage {
    pub level: MessageLevel,
    /// Stable key, e.g. `user.invalid_user_id`.
    pub key: String,
    /// Default English text.
    pub text: String,
}

/// Collects the messages produced while validating and handling a command.
#[derive(Debug, Default)]
pub struct MessageCollector {
    messages: Vec<UserMessage>,
}

impl MessageCollector {
    pub fn info(&mut self, key: &str, text: impl Into<String>) {
        self.messages.push(UserMessage {
            level: MessageLevel::Info,
            key: key.to_string(),
            text: text.into(),
        });
    }

    pub fn error(&mut self, key: &str, text: impl Into<String>) {
        self.messages.push(UserMessage {
            level: MessageLevel::Error,
            key: key.to_string(),
            text: text.into(),
        });
    }

    pub fn has_errors(&self) -> bool {
        self.messages
            .iter()
            .any(|m| m.level == MessageLevel::Error)
    }

    pub fn messages(&self) -> &[UserMessage] {
        &self.messages
    }
}

/// Outcome of handling a command: success flag plus the collected messages.
#[derive(Debug)]
pub struct CommandResult {
    pub success: bool,
    pub messages: Vec<UserMessage>,
}

impl CommandResult {
    fn from_collector(collector: MessageCollector) -> Self {
        Self {
            success: !collector.has_errors(),
            messages: collector.messages,
        }
    }
}

// ── Incoming validation ──────────────────────────────────────────────

/// Typed authorization check: setting a password through this command is a
/// self-service operation, so the actor must be the target user.
pub fn authorize_set_password(cmd: &SetPasswordCommand) -> Result<(), AuthError> {
    if cmd.actor_id != cmd.user_id {
        return Err(AuthError::NotAuthorized {
            actor_id: cmd.actor_id,
            user_id: cmd.user_id,
        });
    }
    Ok(())
}

/// Reject a malformed or unauthorized `SetPasswordCommand` before it
/// reaches the engine.
pub fn validate_set_password(cmd: &SetPasswordCommand, collector: &mut MessageCollector) {
    if cmd.user_id <= 0 {
        collector.error("user.invalid_user_id", "Invalid user id.");
    }
    if cmd.password.trim().is_empty() {
        collector.error("user.invalid_password", "Invalid password.");
    }
    if let Err(err) = authorize_set_password(cmd) {
        collector.error("user.actor_must_match", err.to_string());
    }
}

/// Reject a malformed `CreateOrUpdatePasswordCommand` before it reaches
/// the engine (administrative command, no actor/target match required).
pub fn validate_create_or_update(
    cmd: &CreateOrUpdatePasswordCommand,
    collector: &mut MessageCollector,
) {
    if cmd.user_id <= 0 {
        collector.error("user.invalid_user_id", "Invalid user id.");
    }
    if cmd.password.trim().is_empty() {
        collector.error("user.invalid_password", "Invalid password.");
    }
}

// ── Handlers ─────────────────────────────────────────────────────────

/// Handle a [`SetPasswordCommand`] end to end.
pub fn handle_set_password<S: CredentialStore>(
    engine: &AuthEngine<S>,
    cmd: &SetPasswordCommand,
) -> CommandResult {
    let mut collector = MessageCollector::default();
    validate_set_password(cmd, &mut collector);
    if collector.has_errors() {
        return CommandResult::from_collector(collector);
    }

    match engine.set_password(cmd.actor_id, cmd.user_id, &cmd.password) {
        Ok(()) => {
            tracing::info!(actor_id = cmd.actor_id, user_id = cmd.user_id, "password set");
            collector.info("user.password_set", "The password has been set.");
        }
        Err(err) => {
            tracing::error!(
                actor_id = cmd.actor_id,
                user_id = cmd.user_id,
                error = %err,
                "set password failed"
            );
            collector.error(
                "user.password_set_failed",
                "An error occurred while setting the password.",
            );
        }
    }
    CommandResult::from_collector(collector)
}

/// Handle a [`CreateOrUpdatePasswordCommand`] end to end. An unmet mode
/// precondition (e.g. `CreateOnly` on an established credential) is a keyed
/// error message, not an engine error.
pub fn handle_create_or_update<S: CredentialStore>(
    engine: &AuthEngine<S>,
    cmd: &CreateOrUpdatePasswordCommand,
) -> CommandResult {
    let mut collector = MessageCollector::default();
    validate_create_or_update(cmd, &mut collector);
    if collector.has_errors() {
        return CommandResult::from_collector(collector);
    }

    match engine.create_or_update(cmd.actor_id, cmd.user_id, &cmd.password, cmd.mode, false) {
        Ok(result) => match (cmd.mode, result) {
            (CreateMode::CreateOnly, r) if r != CreateResult::Created => {
                collector.error(
                    "user.password_creation_failed",
                    "The password has not been created.",
                );
            }
            (CreateMode::UpdateOnly, r) if r != CreateResult::Updated => {
                collector.error(
                    "user.password_update_failed",
                    "The password has not been updated.",
                );
            }
            (CreateMode::CreateOrUpdate, CreateResult::None) => {
                collector.error(
                    "user.password_create_or_update_failed",
                    "The password has not been created nor updated.",
                );
            }
            _ => {
                collector.info(
                    "user.password_saved",
                    "The password has been created or updated.",
                );
            }
        },
        Err(err) => {
            tracing::error!(
                actor_id = cmd.actor_id,
                user_id = cmd.user_id,
                error = %err,
                "create or update password failed"
            );
            let key = match err {
                AuthError::InvalidActor | AuthError::InvalidTarget => "user.invalid_user_id",
                AuthError::EmptyPassword => "user.invalid_password",
                _ => "user.password_create_or_update_failed",
            };
            collector.error(key, "An error occurred while saving the password.");
        }
    }
    CommandResult::from_collector(collector)
}

// ── Tests ───────────────────────────────────────────────────────────
