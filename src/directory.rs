//! Minimal user directory: the external collaborator the engine resolves
//! login identifiers against.
//!
//! The engine only needs name→id resolution ([`UserDirectory`]); user
//! creation and destruction live here so the credential cascade (destroying
//! a user destroys its credential row, never the reverse) is enforced by
//! the schema itself.

use crate::error::StoreError;
use crate::store::Database;
use chrono::Utc;
use parking_lot::Mutex;
use rusqlite::{params, Connection};
use std::sync::Arc;

/// Name→id resolution, as seen by the verification engine.
pub trait UserDirectory: Send + Sync {
    fn resolve_name(&self, name: &str) -> Result<Option<i64>, StoreError>;
}

/// Directory over the shared SQLite `users` table.
pub struct SqliteUserDirectory {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteUserDirectory {
    pub fn new(db: &Database) -> Self {
        Self { conn: db.handle() }
    }

    /// Create a user and return its id.
    pub fn create_user(&self, name: &str) -> Result<i64, StoreError> {
        let trimmed = name.trim();
        let conn = self.conn.lock();
        let result = conn.execute(
            "INSERT INTO users (name, created_at) VALUES (?1, ?2)",
            params![trimmed, Utc::now().timestamp()],
        );

        match result {
            Ok(_) => Ok(conn.last_insert_rowid()),
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(StoreError::NameTaken(trimmed.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Destroy a user. The credential row goes with it (`ON DELETE CASCADE`).
    pub fn destroy_user(&self, user_id: i64) -> Result<bool, StoreError> {
        let conn = self.conn.lock();
        let deleted = conn.execute("DELETE FROM users WHERE id = ?1", params![user_id])?;
        Ok(deleted > 0)
    }
}

impl UserDirectory for SqliteUserDirectory {
    fn resolve_name(&self, name: &str) -> Result<Option<i64>, StoreError> {
        let conn = self.conn.lock();
        let row = conn.query_row(
            "SELECT id FROM users WHERE name = ?1 COLLATE NOCASE",
            params![name.trim()],
            |row| row.get(0),
        );

        match row {
            Ok(id) => Ok(Some(id)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

// ── Tests ───────────────────────────────────────────────────────────
