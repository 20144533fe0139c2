//! Scoped unit-of-work over one pooled connection.
//!
//! # Responsibility
//! - Own one checked-out connection and one open transaction.
//! - Translate SQLite failures into the storage error taxonomy.
//!
//! # Invariants
//! - A session is owned by exactly one caller; it is `Send` but not shared.
//! - Dropping a session with an open transaction rolls it back, and the
//!   connection always returns to the pool, including during unwinding.

use crate::error::{ConstraintKind, StorageError, StorageResult};
use log::{debug, warn};
use r2d2::PooledConnection;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{ffi, Connection, ErrorCode};
use std::fmt::{Debug, Formatter};

pub struct ScopedSession {
    conn: PooledConnection<SqliteConnectionManager>,
    scope_id: u64,
}

impl ScopedSession {
    pub(crate) fn begin(
        conn: PooledConnection<SqliteConnectionManager>,
        scope_id: u64,
    ) -> StorageResult<Self> {
        // IMMEDIATE takes the write lock up front so a read-then-write scope
        // cannot fail halfway on lock upgrade.
        conn.execute_batch("BEGIN IMMEDIATE;")?;
        debug!("event=scope_open module=db status=ok scope_id={scope_id}");
        Ok(Self { conn, scope_id })
    }

    /// Connection bound to this scope's transaction.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn scope_id(&self) -> u64 {
        self.scope_id
    }

    /// Returns `true` while the scope's transaction is still open.
    pub fn in_transaction(&self) -> bool {
        !self.conn.is_autocommit()
    }

    /// Commits the scope's transaction. A no-op once already finished.
    pub fn commit(&mut self) -> StorageResult<()> {
        if !self.in_transaction() {
            return Ok(());
        }
        self.conn.execute_batch("COMMIT;")?;
        debug!(
            "event=scope_commit module=db status=ok scope_id={}",
            self.scope_id
        );
        Ok(())
    }

    /// Rolls back the scope's transaction. A no-op once already finished.
    pub fn rollback(&mut self) -> StorageResult<()> {
        if !self.in_transaction() {
            return Ok(());
        }
        self.conn.execute_batch("ROLLBACK;")?;
        debug!(
            "event=scope_rollback module=db status=ok scope_id={}",
            self.scope_id
        );
        Ok(())
    }
}

impl Drop for ScopedSession {
    fn drop(&mut self) {
        if !self.in_transaction() {
            return;
        }
        match self.conn.execute_batch("ROLLBACK;") {
            Ok(()) => debug!(
                "event=scope_rollback module=db status=ok scope_id={} reason=dropped",
                self.scope_id
            ),
            Err(err) => warn!(
                "event=scope_rollback module=db status=error scope_id={} reason=dropped error={}",
                self.scope_id, err
            ),
        }
    }
}

impl Debug for ScopedSession {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopedSession")
            .field("scope_id", &self.scope_id)
            .field("in_transaction", &self.in_transaction())
            .finish()
    }
}

impl From<rusqlite::Error> for StorageError {
    fn from(value: rusqlite::Error) -> Self {
        translate(value)
    }
}

/// Maps a SQLite error onto the storage taxonomy.
///
/// - no row → `NotFound`
/// - constraint violation → `IntegrityViolation` with its constraint class
/// - anything else → `StorageFailure` wrapping the original error
pub(crate) fn translate(err: rusqlite::Error) -> StorageError {
    match err {
        rusqlite::Error::QueryReturnedNoRows => {
            StorageError::NotFound("query returned no rows".to_string())
        }
        rusqlite::Error::SqliteFailure(code, message)
            if code.code == ErrorCode::ConstraintViolation =>
        {
            StorageError::IntegrityViolation {
                kind: constraint_kind(code.extended_code),
                message: message.unwrap_or_else(|| code.to_string()),
            }
        }
        other => StorageError::failure(other),
    }
}

fn constraint_kind(extended_code: std::os::raw::c_int) -> ConstraintKind {
    match extended_code {
        ffi::SQLITE_CONSTRAINT_UNIQUE => ConstraintKind::Unique,
        ffi::SQLITE_CONSTRAINT_PRIMARYKEY => ConstraintKind::PrimaryKey,
        ffi::SQLITE_CONSTRAINT_FOREIGNKEY => ConstraintKind::ForeignKey,
        ffi::SQLITE_CONSTRAINT_NOTNULL => ConstraintKind::NotNull,
        ffi::SQLITE_CONSTRAINT_CHECK => ConstraintKind::Check,
        _ => ConstraintKind::Other,
    }
}
