//! SQLite-backed credential storage.
//!
//! Tables:
//! - `users`: user identity directory (id, unique name)
//! - `user_password`: one credential row per user, cascade-deleted with it
//!
//! The store owns every credential row exclusively and exposes a single
//! atomic load-mutate-persist primitive, [`CredentialStore::upsert_atomic`]:
//! the mutator is a pure state-transition function applied inside an
//! IMMEDIATE transaction, so per-user transitions are serialized and a
//! failed operation leaves the row exactly as it was.

use crate::error::StoreError;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, TransactionBehavior};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

/// The persisted credential state for one user.
///
/// An empty `pwd_hash` is a sentinel meaning "no established credential":
/// either never set, or a pending-migration placeholder. It is never a
/// valid hash of any real password.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CredentialRecord {
    pub user_id: i64,
    /// `salt || digest`, or empty when not established.
    pub pwd_hash: Vec<u8>,
    /// Work factor the current `pwd_hash` was computed with.
    pub iteration_count: u32,
    /// Consecutive failed verification attempts since the last success.
    pub failed_attempt_count: u32,
    /// Last genuine (non-probe) successful login.
    pub last_login_time: Option<DateTime<Utc>>,
}

impl CredentialRecord {
    /// A fresh not-yet-established record for `user_id`.
    pub fn empty(user_id: i64) -> Self {
        Self {
            user_id,
            pwd_hash: Vec::new(),
            iteration_count: 0,
            failed_attempt_count: 0,
            last_login_time: None,
        }
    }

    /// Whether a real credential is established (non-empty hash).
    pub fn is_established(&self) -> bool {
        !self.pwd_hash.is_empty()
    }
}

/// Abstract credential persistence.
///
/// `upsert_atomic` is the only write path for verification-driven state:
/// it loads the current row (if any), applies the pure `mutate` transition,
/// and persists the result all-or-nothing. Returning `None` from the
/// mutator persists nothing — the row is neither created nor touched.
pub trait CredentialStore: Send + Sync {
    fn get(&self, user_id: i64) -> Result<Option<CredentialRecord>, StoreError>;

    fn upsert_atomic<T, F>(&self, user_id: i64, mutate: F) -> Result<T, StoreError>
    where
        F: FnOnce(Option<&CredentialRecord>) -> (Option<CredentialRecord>, T);

    /// Remove the credential row. Invoked by the user-destruction cascade
    /// path, not by the verification engine.
    fn delete(&self, user_id: i64) -> Result<bool, StoreError>;

    /// Users with an established (non-empty-hash) credential, for
    /// cross-provider introspection.
    fn established_users(&self) -> Result<Vec<i64>, StoreError>;
}

/// Shared SQLite database handle for the credential store and the user
/// directory (one file, one schema, foreign keys enforced).
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open (or create) the database at the given path.
    pub fn open(db_path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(db_path)?;
        Self::init(conn)
    }

    /// In-memory database, mainly for tests and probes.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        // WAL mode for concurrent reads + crash safety
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA foreign_keys = ON;",
        )?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE COLLATE NOCASE,
                created_at INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS user_password (
                user_id INTEGER PRIMARY KEY REFERENCES users(id) ON DELETE CASCADE,
                pwd_hash BLOB NOT NULL,
                iteration_count INTEGER NOT NULL,
                failed_attempt_count INTEGER NOT NULL DEFAULT 0,
                last_login_at INTEGER
            );",
        )?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub(crate) fn handle(&self) -> Arc<Mutex<Connection>> {
        Arc::clone(&self.conn)
    }

    /// The credential store backed by this database.
    pub fn credentials(&self) -> SqliteCredentialStore {
        SqliteCredentialStore {
            conn: self.handle(),
        }
    }
}

/// [`CredentialStore`] over the shared SQLite database.
pub struct SqliteCredentialStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteCredentialStore {
    fn read_record(conn: &Connection, user_id: i64) -> Result<Option<CredentialRecord>, StoreError> {
        let row = conn.query_row(
            "SELECT pwd_hash, iteration_count, failed_attempt_count, last_login_at
             FROM user_password WHERE user_id = ?1",
            params![user_id],
            |row| {
                Ok((
                    row.get::<_, Vec<u8>>(0)?,
                    row.get::<_, u32>(1)?,
                    row.get::<_, u32>(2)?,
                    row.get::<_, Option<i64>>(3)?,
                ))
            },
        );

        match row {
            Ok((pwd_hash, iteration_count, failed_attempt_count, last_login_at)) => {
                Ok(Some(CredentialRecord {
                    user_id,
                    pwd_hash,
                    iteration_count,
                    failed_attempt_count,
                    last_login_time: last_login_at.and_then(DateTime::from_timestamp_millis),
                }))
            }
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

impl CredentialStore for SqliteCredentialStore {
    fn get(&self, user_id: i64) -> Result<Option<CredentialRecord>, StoreError> {
        let conn = self.conn.lock();
        Self::read_record(&conn, user_id)
    }

    fn upsert_atomic<T, F>(&self, user_id: i64, mutate: F) -> Result<T, StoreError>
    where
        F: FnOnce(Option<&CredentialRecord>) -> (Option<CredentialRecord>, T),
    {
        let mut conn = self.conn.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let existing = Self::read_record(&tx, user_id)?;
        let (next, out) = mutate(existing.as_ref());

        if let Some(rec) = next {
            tx.execute(
                "INSERT INTO user_password
                    (user_id, pwd_hash, iteration_count, failed_attempt_count, last_login_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(user_id) DO UPDATE SET
                    pwd_hash = excluded.pwd_hash,
                    iteration_count = excluded.iteration_count,
                    failed_attempt_count = excluded.failed_attempt_count,
                    last_login_at = excluded.last_login_at",
                params![
                    user_id,
                    rec.pwd_hash,
                    rec.iteration_count,
                    rec.failed_attempt_count,
                    rec.last_login_time.map(|t| t.timestamp_millis()),
                ],
            )?;
        }

        tx.commit()?;
        Ok(out)
    }

    fn delete(&self, user_id: i64) -> Result<bool, StoreError> {
        let conn = self.conn.lock();
        let deleted = conn.execute(
            "DELETE FROM user_password WHERE user_id = ?1",
            params![user_id],
        )?;
        Ok(deleted > 0)
    }

    fn established_users(&self) -> Result<Vec<i64>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT user_id FROM user_password
             WHERE length(pwd_hash) > 0 ORDER BY user_id",
        )?;
        let ids = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<i64>, _>>()?;
        Ok(ids)
    }
}

// ── Tests ───────────────────────────────────────────────────────────
