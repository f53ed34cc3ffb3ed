//! Password credential lifecycle engine.
//!
//! Authenticates users by password and manages the stored credential's
//! whole lifecycle: hashing, verification, transparent cost-parameter
//! upgrades, brute-force attempt tracking, and one-time migration from a
//! legacy credential source.
//!
//! ## Design
//! - Password hashing uses salted iterated SHA-256 with a per-record work
//!   factor, so cost upgrades happen lazily per user instead of in bulk.
//! - All per-user state transitions flow through a single atomic
//!   load-mutate-persist store primitive (SQLite, row-serialized), so
//!   concurrent logins cannot double-migrate or double-rehash.
//! - Authentication failure is a plain `user_id == 0` result that reveals
//!   nothing about whether the user exists.
//! - The login hook and migration callback fire post-commit and cannot
//!   roll back a committed success.

pub mod commands;
pub mod config;
pub mod directory;
pub mod engine;
pub mod error;
pub mod hash;
pub mod migrate;
pub mod store;

pub use config::AuthConfig;
pub use directory::{SqliteUserDirectory, UserDirectory};
pub use engine::{
    AuthEngine, CreateMode, CreateResult, LoginIdentifier, LoginListener, LoginResult,
};
pub use error::{AuthError, StoreError};
pub use hash::HashPolicy;
pub use migrate::PasswordMigrator;
pub use store::{CredentialRecord, CredentialStore, Database, SqliteCredentialStore};
