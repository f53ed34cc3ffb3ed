//! The verification engine: login, credential create/update, transparent
//! cost upgrades, and legacy migration, all driven through the store's
//! atomic load-mutate-persist contract.
//!
//! ## Design
//! - Every state transition for a user runs inside one
//!   [`CredentialStore::upsert_atomic`] call, so the hash upgrade on a
//!   successful verify and the migration finalization are part of the same
//!   atomic transition as the read that decided them.
//! - Authentication failure is a result (`user_id == 0`), never an error,
//!   and carries no detail about *why* it failed.
//! - The login hook and `migration_done` fire after the transition commits;
//!   a hook failure is logged and cannot undo the committed success.

use crate::directory::UserDirectory;
use crate::error::AuthError;
use crate::hash::{self, HashPolicy};
use crate::migrate::PasswordMigrator;
use crate::store::{CredentialRecord, CredentialStore};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

// ── Operation inputs and results ─────────────────────────────────────

/// How `create_or_update` treats an existing (or missing) credential.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CreateMode {
    /// Only establish a credential where none exists; no-op otherwise.
    CreateOnly,
    /// Only overwrite an established credential; no-op otherwise.
    UpdateOnly,
    /// Always establish or overwrite.
    #[default]
    CreateOrUpdate,
}

/// Tri-state outcome of `create_or_update`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CreateResult {
    /// No established credential existed; one does now.
    Created,
    /// An established credential was overwritten.
    Updated,
    /// The mode's precondition was not met; nothing changed.
    None,
}

/// Who is trying to log in: a resolved id, or a name the user directory
/// resolves for us.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginIdentifier {
    Id(i64),
    Name(String),
}

impl From<i64> for LoginIdentifier {
    fn from(id: i64) -> Self {
        Self::Id(id)
    }
}

impl From<&str> for LoginIdentifier {
    fn from(name: &str) -> Self {
        Self::Name(name.to_string())
    }
}

/// Login outcome. `user_id == 0` denotes failure, with no detail about
/// whether the user was unknown or the password wrong.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginResult {
    pub user_id: i64,
}

impl LoginResult {
    pub const fn failure() -> Self {
        Self { user_id: 0 }
    }

    pub fn is_success(&self) -> bool {
        self.user_id != 0
    }
}

/// Post-commit observer for genuine (non-probe) successful logins.
///
/// Errors are caught and logged by the engine; they never roll back the
/// already-committed authentication success.
pub trait LoginListener: Send + Sync {
    fn on_login(&self, user_id: i64) -> anyhow::Result<()>;
}

/// Internal classification of a login transition.
enum LoginOutcome {
    Success,
    Migrated,
    Failure,
}

// ── Engine ───────────────────────────────────────────────────────────

/// Password verification engine over an abstract [`CredentialStore`].
pub struct AuthEngine<S: CredentialStore> {
    store: S,
    directory: Arc<dyn UserDirectory>,
    hash_policy: HashPolicy,
    migrator: Option<Arc<dyn PasswordMigrator>>,
    login_listener: Option<Arc<dyn LoginListener>>,
}

impl AuthEngine<crate::store::SqliteCredentialStore> {
    /// Open the SQLite-backed engine described by `config`.
    pub fn open(config: &crate::config::AuthConfig) -> Result<Self, AuthError> {
        let db = crate::store::Database::open(&config.db_path)?;
        let directory = Arc::new(crate::directory::SqliteUserDirectory::new(&db));
        let engine = Self::new(db.credentials(), directory);
        engine
            .hash_policy()
            .set_iteration_count(config.hash_iteration_count);
        Ok(engine)
    }
}

impl<S: CredentialStore> AuthEngine<S> {
    pub fn new(store: S, directory: Arc<dyn UserDirectory>) -> Self {
        Self {
            store,
            directory,
            hash_policy: HashPolicy::default(),
            migrator: None,
            login_listener: None,
        }
    }

    /// The mutable work-factor configuration for new hashes.
    pub fn hash_policy(&self) -> &HashPolicy {
        &self.hash_policy
    }

    /// Install or remove the legacy-credential migrator. A single instance
    /// at most; replacing it affects subsequent logins only.
    pub fn set_migrator(&mut self, migrator: Option<Arc<dyn PasswordMigrator>>) {
        self.migrator = migrator;
    }

    pub fn set_login_listener(&mut self, listener: Option<Arc<dyn LoginListener>>) {
        self.login_listener = listener;
    }

    /// Establish or overwrite a user's credential, honoring `mode`.
    ///
    /// On success the hash is computed at the currently configured cost and
    /// the failed-attempt counter resets. With `with_actual_login` the
    /// operation also counts as a real login: `last_login_time` is stamped
    /// and the login hook fires after commit.
    pub fn create_or_update(
        &self,
        actor_id: i64,
        user_id: i64,
        password: &str,
        mode: CreateMode,
        with_actual_login: bool,
    ) -> Result<CreateResult, AuthError> {
        validate_ids(actor_id, user_id)?;
        if password.trim().is_empty() {
            return Err(AuthError::EmptyPassword);
        }

        let cost = self.hash_policy.iteration_count();
        let outcome = self.store.upsert_atomic(user_id, |existing| {
            let established = existing.is_some_and(CredentialRecord::is_established);
            let result = match mode {
                CreateMode::CreateOnly if established => return (None, CreateResult::None),
                CreateMode::UpdateOnly if !established => return (None, CreateResult::None),
                _ if established => CreateResult::Updated,
                _ => CreateResult::Created,
            };

            let mut next = existing
                .cloned()
                .unwrap_or_else(|| CredentialRecord::empty(user_id));
            next.pwd_hash = hash::compute(password, cost);
            next.iteration_count = cost;
            next.failed_attempt_count = 0;
            if with_actual_login {
                next.last_login_time = Some(Utc::now());
            }
            (Some(next), result)
        })?;

        if outcome != CreateResult::None {
            tracing::info!(actor_id, user_id, result = ?outcome, "password credential written");
            if with_actual_login {
                self.fire_login_hook(user_id);
            }
        }
        Ok(outcome)
    }

    /// Unconditional administrative overwrite: always establishes the new
    /// hash at the current cost and resets the failed-attempt counter,
    /// regardless of prior state or knowledge of the old password.
    pub fn set_password(&self, actor_id: i64, user_id: i64, password: &str) -> Result<(), AuthError> {
        self.create_or_update(actor_id, user_id, password, CreateMode::CreateOrUpdate, false)
            .map(|_| ())
    }

    /// Verify a password and update the credential state accordingly.
    ///
    /// `actual_login` marks a genuine session login: on success it stamps
    /// `last_login_time` and fires the login hook. Probes leave both alone.
    ///
    /// A `Storage` error leaves the attempt outcome ambiguous — callers
    /// must not blindly retry, or a failed attempt could be counted twice.
    pub fn login(
        &self,
        identifier: impl Into<LoginIdentifier>,
        password: &str,
        actual_login: bool,
    ) -> Result<LoginResult, AuthError> {
        let user_id = match identifier.into() {
            LoginIdentifier::Id(id) => id,
            LoginIdentifier::Name(name) => match self.directory.resolve_name(&name)? {
                Some(id) => id,
                None => return Ok(LoginResult::failure()),
            },
        };
        if user_id <= 0 {
            return Ok(LoginResult::failure());
        }

        let cost = self.hash_policy.iteration_count();
        let migrator = self.migrator.as_deref();

        let outcome = self.store.upsert_atomic(user_id, |existing| match existing {
            Some(rec) if rec.is_established() => {
                if hash::verify(password, &rec.pwd_hash, rec.iteration_count) {
                    let mut next = rec.clone();
                    if next.iteration_count != cost {
                        // Transparent upgrade to the configured cost.
                        next.pwd_hash = hash::compute(password, cost);
                        next.iteration_count = cost;
                    }
                    next.failed_attempt_count = 0;
                    if actual_login {
                        next.last_login_time = Some(Utc::now());
                    }
                    (Some(next), LoginOutcome::Success)
                } else {
                    let mut next = rec.clone();
                    next.failed_attempt_count += 1;
                    (Some(next), LoginOutcome::Failure)
                }
            }
            // Empty hash: pending migration (or never set).
            Some(rec) => match migrator {
                Some(m) if m.verify_password(user_id, password) => {
                    let mut next = rec.clone();
                    next.pwd_hash = hash::compute(password, cost);
                    next.iteration_count = cost;
                    next.failed_attempt_count = 0;
                    if actual_login {
                        next.last_login_time = Some(Utc::now());
                    }
                    (Some(next), LoginOutcome::Migrated)
                }
                _ => {
                    let mut next = rec.clone();
                    next.failed_attempt_count += 1;
                    (Some(next), LoginOutcome::Failure)
                }
            },
            None => match migrator {
                Some(m) => {
                    if m.verify_password(user_id, password) {
                        let mut next = CredentialRecord::empty(user_id);
                        next.pwd_hash = hash::compute(password, cost);
                        next.iteration_count = cost;
                        if actual_login {
                            next.last_login_time = Some(Utc::now());
                        }
                        (Some(next), LoginOutcome::Migrated)
                    } else {
                        // Placeholder row: FailedAttemptCount is the
                        // throttling signal for future migration attempts.
                        let mut next = CredentialRecord::empty(user_id);
                        next.failed_attempt_count = 1;
                        (Some(next), LoginOutcome::Failure)
                    }
                }
                // No record, no migrator: nothing to track.
                None => (None, LoginOutcome::Failure),
            },
        })?;

        match outcome {
            LoginOutcome::Success | LoginOutcome::Migrated => {
                if matches!(outcome, LoginOutcome::Migrated) {
                    if let Some(m) = &self.migrator {
                        m.migration_done(user_id);
                    }
                    tracing::info!(user_id, "legacy credential migrated");
                }
                if actual_login {
                    self.fire_login_hook(user_id);
                }
                Ok(LoginResult { user_id })
            }
            LoginOutcome::Failure => Ok(LoginResult::failure()),
        }
    }

    fn fire_login_hook(&self, user_id: i64) {
        if let Some(listener) = &self.login_listener {
            if let Err(err) = listener.on_login(user_id) {
                tracing::warn!(
                    user_id,
                    error = %err,
                    "login listener failed; authentication result unaffected"
                );
            }
        }
    }
}

fn validate_ids(actor_id: i64, user_id: i64) -> Result<(), AuthError> {
    if actor_id <= 0 {
        return Err(AuthError::InvalidActor);
    }
    if user_id <= 0 {
        return Err(AuthError::InvalidTarget);
    }
    Ok(())
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::SqliteUserDirectory;
    use crate::store::{Database, SqliteCredentialStore};
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    fn test_engine() -> (TempDir, Database, AuthEngine<SqliteCredentialStore>) {
        let tmp = TempDir::new().unwrap();
        let db = Database::open(&tmp.path().join("credgate.db")).unwrap();
        let engine = AuthEngine::new(db.credentials(), Arc::new(SqliteUserDirectory::new(&db)));
        // Keep the stretching loop cheap in tests.
        engine.hash_policy().set_iteration_count(50);
        (tmp, db, engine)
    }

    fn create_user(db: &Database, name: &str) -> i64 {
        SqliteUserDirectory::new(db).create_user(name).unwrap()
    }

    fn stored_hash(db: &Database, user_id: i64) -> Vec<u8> {
        db.credentials().get(user_id).unwrap().unwrap().pwd_hash
    }

    struct MigrationSupport {
        user_id: i64,
        pwd: String,
        done_calls: AtomicUsize,
    }

    impl MigrationSupport {
        fn new(user_id: i64, pwd: &str) -> Arc<Self> {
            Arc::new(Self {
                user_id,
                pwd: pwd.to_string(),
                done_calls: AtomicUsize::new(0),
            })
        }

        fn done_count(&self) -> usize {
            self.done_calls.load(Ordering::SeqCst)
        }
    }

    impl PasswordMigrator for MigrationSupport {
        fn verify_password(&self, user_id: i64, password: &str) -> bool {
            user_id == self.user_id && password == self.pwd
        }

        fn migration_done(&self, _user_id: i64) {
            self.done_calls.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[derive(Default)]
    struct RecordingListener {
        calls: Mutex<Vec<i64>>,
    }

    impl LoginListener for RecordingListener {
        fn on_login(&self, user_id: i64) -> anyhow::Result<()> {
            self.calls.lock().push(user_id);
            Ok(())
        }
    }

    struct FailingListener;

    impl LoginListener for FailingListener {
        fn on_login(&self, _user_id: i64) -> anyhow::Result<()> {
            anyhow::bail!("downstream notification exploded")
        }
    }

    #[test]
    fn create_login_set_password_scenario() {
        let (_tmp, db, engine) = test_engine();
        let uid = create_user(&db, "scenario");

        let res = engine
            .create_or_update(1, uid, "pwddetestcrrr", CreateMode::CreateOrUpdate, false)
            .unwrap();
        assert_eq!(res, CreateResult::Created);

        assert_eq!(engine.login(uid, "pwddetestcrrr", false).unwrap().user_id, uid);
        assert_eq!(engine.login(uid, "wrong", false).unwrap().user_id, 0);

        engine.set_password(1, uid, "newpwd").unwrap();
        assert_eq!(engine.login(uid, "pwddetestcrrr", false).unwrap().user_id, 0);
        assert_eq!(engine.login(uid, "newpwd", false).unwrap().user_id, uid);
    }

    #[test]
    fn login_by_name_resolves_through_the_directory() {
        let (_tmp, db, engine) = test_engine();
        let uid = create_user(&db, "named");
        engine.set_password(1, uid, "pwd").unwrap();

        assert_eq!(engine.login("named", "pwd", false).unwrap().user_id, uid);
        assert_eq!(engine.login("named", "nope", false).unwrap().user_id, 0);
        assert_eq!(engine.login("ghost", "pwd", false).unwrap().user_id, 0);
    }

    #[test]
    fn create_only_on_established_user_is_a_noop() {
        let (_tmp, db, engine) = test_engine();
        let uid = create_user(&db, "co");
        engine
            .create_or_update(1, uid, "first", CreateMode::CreateOnly, false)
            .unwrap();
        let before = stored_hash(&db, uid);

        let res = engine
            .create_or_update(1, uid, "second", CreateMode::CreateOnly, false)
            .unwrap();
        assert_eq!(res, CreateResult::None);
        assert_eq!(stored_hash(&db, uid), before, "stored hash must be untouched");
        assert_eq!(engine.login(uid, "first", false).unwrap().user_id, uid);
    }

    #[test]
    fn update_only_without_established_credential_is_a_noop() {
        let (_tmp, db, engine) = test_engine();
        let uid = create_user(&db, "uo");

        let res = engine
            .create_or_update(1, uid, "pwd", CreateMode::UpdateOnly, false)
            .unwrap();
        assert_eq!(res, CreateResult::None);
        assert!(db.credentials().get(uid).unwrap().is_none(), "no row created");

        engine
            .create_or_update(1, uid, "pwd", CreateMode::CreateOnly, false)
            .unwrap();
        let res = engine
            .create_or_update(1, uid, "pwd2", CreateMode::UpdateOnly, false)
            .unwrap();
        assert_eq!(res, CreateResult::Updated);
        assert_eq!(engine.login(uid, "pwd2", false).unwrap().user_id, uid);
    }

    #[test]
    fn pending_migration_record_counts_as_not_established() {
        let (_tmp, db, mut engine) = test_engine();
        let uid = create_user(&db, "pending");
        let migrator = MigrationSupport::new(uid, "legacy");
        engine.set_migrator(Some(migrator));

        // Failed migration attempt leaves an empty-hash placeholder.
        assert_eq!(engine.login(uid, "wrong", false).unwrap().user_id, 0);
        assert!(!db.credentials().get(uid).unwrap().unwrap().is_established());

        // CreateOnly still counts as Created over a placeholder.
        let res = engine
            .create_or_update(1, uid, "pwd", CreateMode::CreateOnly, false)
            .unwrap();
        assert_eq!(res, CreateResult::Created);
    }

    #[test]
    fn invalid_ids_and_empty_password_are_rejected() {
        let (_tmp, _db, engine) = test_engine();

        assert!(matches!(
            engine.create_or_update(1, 0, "x", CreateMode::CreateOrUpdate, false),
            Err(AuthError::InvalidTarget)
        ));
        assert!(matches!(
            engine.create_or_update(0, 1, "x", CreateMode::CreateOrUpdate, false),
            Err(AuthError::InvalidActor)
        ));
        assert!(matches!(
            engine.create_or_update(1, 0, "x", CreateMode::UpdateOnly, false),
            Err(AuthError::InvalidTarget)
        ));
        assert!(matches!(
            engine.create_or_update(0, 1, "x", CreateMode::UpdateOnly, false),
            Err(AuthError::InvalidActor)
        ));
        assert!(matches!(
            engine.set_password(1, 1, "  "),
            Err(AuthError::EmptyPassword)
        ));
    }

    #[test]
    fn unknown_user_without_migrator_fails_and_creates_no_row() {
        let (_tmp, db, engine) = test_engine();

        assert_eq!(engine.login(4242i64, "pwd", false).unwrap().user_id, 0);
        assert!(db.credentials().get(4242).unwrap().is_none());
        assert_eq!(engine.login(-1i64, "pwd", false).unwrap().user_id, 0);
        assert_eq!(engine.login(0i64, "pwd", true).unwrap().user_id, 0);
    }

    #[test]
    fn failed_logins_increment_the_counter_and_success_resets_it() {
        let (_tmp, db, engine) = test_engine();
        let uid = create_user(&db, "counter");
        engine.set_password(1, uid, "pwd").unwrap();

        for expected in 1..=3u32 {
            assert_eq!(engine.login(uid, "bad", false).unwrap().user_id, 0);
            let rec = db.credentials().get(uid).unwrap().unwrap();
            assert_eq!(rec.failed_attempt_count, expected);
            assert!(rec.last_login_time.is_none(), "failures never stamp the timestamp");
        }

        assert_eq!(engine.login(uid, "pwd", false).unwrap().user_id, uid);
        assert_eq!(db.credentials().get(uid).unwrap().unwrap().failed_attempt_count, 0);
    }

    #[test]
    fn changing_iteration_count_upgrades_the_hash_on_login() {
        let (_tmp, db, engine) = test_engine();
        let uid = create_user(&db, "upgrade");

        engine.hash_policy().set_iteration_count(50);
        engine.set_password(1, uid, "pwd").unwrap();
        let hash1 = stored_hash(&db, uid);
        assert_eq!(db.credentials().get(uid).unwrap().unwrap().iteration_count, 50);

        engine.hash_policy().set_iteration_count(500);
        assert_eq!(engine.login(uid, "pwd", false).unwrap().user_id, uid);
        let hash2 = stored_hash(&db, uid);
        assert_ne!(hash1, hash2, "hash has been upgraded");
        assert_eq!(db.credentials().get(uid).unwrap().unwrap().iteration_count, 500);

        engine.hash_policy().set_iteration_count(50);
        assert_eq!(engine.login(uid, "pwd", false).unwrap().user_id, uid);
        let hash3 = stored_hash(&db, uid);
        assert_ne!(hash2, hash3);
        assert_ne!(hash1, hash3);

        // Same cost: no rewrite of the hash bytes.
        assert_eq!(engine.login(uid, "pwd", false).unwrap().user_id, uid);
        assert_eq!(stored_hash(&db, uid), hash3);
    }

    #[test]
    fn migration_walks_the_counter_and_finalizes_exactly_once() {
        let (_tmp, db, mut engine) = test_engine();
        let uid = create_user(&db, "migrant");
        let migrator = MigrationSupport::new(uid, "toto");
        engine.set_migrator(Some(Arc::clone(&migrator) as Arc<dyn PasswordMigrator>));

        // Attempt 1, wrong password: placeholder row, counter 1.
        assert_eq!(engine.login(uid, "failed", false).unwrap().user_id, 0);
        let rec = db.credentials().get(uid).unwrap().unwrap();
        assert!(rec.pwd_hash.is_empty(), "row created but with an empty hash");
        assert_eq!(rec.failed_attempt_count, 1);
        assert!(db.credentials().established_users().unwrap().is_empty());

        // Attempt 2, wrong again: counter 2, still empty.
        assert_eq!(engine.login(uid, "failed again", false).unwrap().user_id, 0);
        let rec = db.credentials().get(uid).unwrap().unwrap();
        assert!(rec.pwd_hash.is_empty());
        assert_eq!(rec.failed_attempt_count, 2);
        assert_eq!(migrator.done_count(), 0);

        // Attempt 3, correct legacy password: migrated.
        assert_eq!(engine.login(uid, "toto", false).unwrap().user_id, uid);
        let rec = db.credentials().get(uid).unwrap().unwrap();
        assert!(rec.is_established());
        assert_eq!(rec.failed_attempt_count, 0);
        assert_eq!(migrator.done_count(), 1);
        assert_eq!(db.credentials().established_users().unwrap(), vec![uid]);

        // Subsequent logins verify locally; migration_done stays at one.
        assert_eq!(engine.login(uid, "toto", false).unwrap().user_id, uid);
        assert_eq!(migrator.done_count(), 1);
    }

    #[test]
    fn migration_works_by_user_name() {
        let (_tmp, db, mut engine) = test_engine();
        let uid = create_user(&db, "legacy-name");
        let migrator = MigrationSupport::new(uid, "toto");
        engine.set_migrator(Some(Arc::clone(&migrator) as Arc<dyn PasswordMigrator>));

        assert_eq!(engine.login("legacy-name", "failed", false).unwrap().user_id, 0);
        assert_eq!(
            db.credentials().get(uid).unwrap().unwrap().failed_attempt_count,
            1
        );

        assert_eq!(engine.login("legacy-name", "toto", false).unwrap().user_id, uid);
        assert_eq!(
            db.credentials().get(uid).unwrap().unwrap().failed_attempt_count,
            0
        );
        assert_eq!(migrator.done_count(), 1);
    }

    #[test]
    fn removing_the_migrator_leaves_the_placeholder_counting_mismatches() {
        let (_tmp, db, mut engine) = test_engine();
        let uid = create_user(&db, "stranded");
        engine.set_migrator(Some(MigrationSupport::new(uid, "toto")));
        assert_eq!(engine.login(uid, "failed", false).unwrap().user_id, 0);

        engine.set_migrator(None);
        assert_eq!(engine.login(uid, "toto", false).unwrap().user_id, 0);
        let rec = db.credentials().get(uid).unwrap().unwrap();
        assert!(rec.pwd_hash.is_empty());
        assert_eq!(rec.failed_attempt_count, 2);
    }

    #[test]
    fn probe_logins_never_stamp_time_or_fire_the_hook() {
        let (_tmp, db, mut engine) = test_engine();
        let uid = create_user(&db, "probe");
        let listener = Arc::new(RecordingListener::default());
        engine.set_login_listener(Some(Arc::clone(&listener) as Arc<dyn LoginListener>));
        engine.set_password(1, uid, "pwd").unwrap();

        assert_eq!(engine.login(uid, "pwd", false).unwrap().user_id, uid);
        assert!(db.credentials().get(uid).unwrap().unwrap().last_login_time.is_none());
        assert!(listener.calls.lock().is_empty());
    }

    #[test]
    fn actual_login_stamps_time_and_fires_the_hook_once() {
        let (_tmp, db, mut engine) = test_engine();
        let uid = create_user(&db, "actual");
        let listener = Arc::new(RecordingListener::default());
        engine.set_login_listener(Some(Arc::clone(&listener) as Arc<dyn LoginListener>));
        engine.set_password(1, uid, "pwd").unwrap();

        assert_eq!(engine.login(uid, "pwd", true).unwrap().user_id, uid);
        let first = db.credentials().get(uid).unwrap().unwrap().last_login_time;
        assert!(first.is_some());
        assert_eq!(*listener.calls.lock(), vec![uid]);

        // A failed actual login changes neither the timestamp nor the hook.
        assert_eq!(engine.login(uid, "bad", true).unwrap().user_id, 0);
        assert_eq!(db.credentials().get(uid).unwrap().unwrap().last_login_time, first);
        assert_eq!(listener.calls.lock().len(), 1);
    }

    #[test]
    fn create_or_update_with_actual_login_counts_as_a_login() {
        let (_tmp, db, mut engine) = test_engine();
        let uid = create_user(&db, "first-login");
        let listener = Arc::new(RecordingListener::default());
        engine.set_login_listener(Some(Arc::clone(&listener) as Arc<dyn LoginListener>));

        let res = engine
            .create_or_update(1, uid, "password", CreateMode::CreateOrUpdate, true)
            .unwrap();
        assert_eq!(res, CreateResult::Created);
        assert!(db.credentials().get(uid).unwrap().unwrap().last_login_time.is_some());
        assert_eq!(*listener.calls.lock(), vec![uid]);
    }

    #[test]
    fn listener_failure_cannot_undo_a_committed_login() {
        let (_tmp, db, mut engine) = test_engine();
        let uid = create_user(&db, "resilient");
        engine.set_login_listener(Some(Arc::new(FailingListener)));
        engine.set_password(1, uid, "pwd").unwrap();

        let res = engine.login(uid, "pwd", true).unwrap();
        assert_eq!(res.user_id, uid);
        assert!(db.credentials().get(uid).unwrap().unwrap().last_login_time.is_some());
    }

    #[test]
    fn engine_opens_from_config() {
        let tmp = TempDir::new().unwrap();
        let config = crate::config::AuthConfig {
            db_path: tmp.path().join("configured.db"),
            hash_iteration_count: 50,
        };
        let engine = AuthEngine::open(&config).unwrap();
        assert_eq!(engine.hash_policy().iteration_count(), 50);

        let db = Database::open(&config.db_path).unwrap();
        let uid = SqliteUserDirectory::new(&db).create_user("cfg").unwrap();
        engine.set_password(uid, uid, "pwd").unwrap();
        assert_eq!(engine.login("cfg", "pwd", false).unwrap().user_id, uid);
    }

    #[test]
    fn set_password_resets_the_failed_counter() {
        let (_tmp, db, engine) = test_engine();
        let uid = create_user(&db, "reset");
        engine.set_password(1, uid, "pwd").unwrap();
        engine.login(uid, "bad", false).unwrap();
        engine.login(uid, "bad", false).unwrap();
        assert_eq!(db.credentials().get(uid).unwrap().unwrap().failed_attempt_count, 2);

        engine.set_password(1, uid, "newpwd").unwrap();
        assert_eq!(db.credentials().get(uid).unwrap().unwrap().failed_attempt_count, 0);
    }
}
