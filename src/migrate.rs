//! One-time migration from a legacy credential source.
//!
//! When a user's local record is in the empty-hash state (absent, or a
//! pending-migration placeholder), the engine can fall back to an external
//! legacy check. A successful check establishes a real hash at the current
//! cost inside the same atomic transition that read the record, so two
//! concurrent logins can never both finalize the migration.

/// Pluggable legacy-credential verifier. One process-wide instance at most,
/// replaceable on the engine but never multiply-registered.
pub trait PasswordMigrator: Send + Sync {
    /// Check `password` against the legacy credential source.
    fn verify_password(&self, user_id: i64, password: &str) -> bool;

    /// Called exactly once per user, after the migrated credential has been
    /// committed. A typical implementation clears the legacy entry.
    fn migration_done(&self, user_id: i64);
}
