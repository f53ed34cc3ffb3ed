//! Error taxonomy for the credential engine.
//!
//! Authentication *failure* is never an error: a wrong password (or an
//! unknown user) surfaces as the `user_id == 0` result path with no detail,
//! so callers cannot distinguish the two. Errors here are reserved for
//! rejected inputs and infrastructure faults.

use thiserror::Error;

/// Persistence-layer failure.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying SQLite error.
    #[error("credential database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A user name collided on creation.
    #[error("user name '{0}' is already taken")]
    NameTaken(String),
}

/// Engine-level error.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Actor id was zero or negative.
    #[error("invalid actor id")]
    InvalidActor,

    /// Target user id was zero or negative.
    #[error("invalid target user id")]
    InvalidTarget,

    /// Password was empty or whitespace-only.
    #[error("password must not be empty")]
    EmptyPassword,

    /// Actor is not allowed to set another user's password.
    #[error("actor {actor_id} may not set the password of user {user_id}")]
    NotAuthorized { actor_id: i64, user_id: i64 },

    /// Persistence failed. Not safely retryable for `login`: a retried
    /// failed attempt would double-increment the failure counter.
    #[error(transparent)]
    Storage(#[from] StoreError),
}
