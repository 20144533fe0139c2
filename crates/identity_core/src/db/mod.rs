//! Session manager: pooled SQLite storage with scoped transactions.
//!
//! # Responsibility
//! - Own the process-wide connection pool.
//! - Hand out exclusively owned, transactional [`ScopedSession`]s.
//! - Normalize storage failures into [`StorageError`] at the scope boundary.
//!
//! # Invariants
//! - Commit is the caller's responsibility; this module only rolls back.
//! - A scope that fails is rolled back before its error propagates.
//! - Connections are returned to the pool on every exit path.
//! - After `shutdown` no clone of the manager opens new scopes.

pub mod migrations;
mod open;
mod session;

pub use session::ScopedSession;

use crate::config::DatabaseConfig;
use crate::error::{StorageError, StorageResult};
use log::{debug, error, info, warn};
use open::{open_pool, SqlitePool};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// Snapshot of pool occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStatus {
    pub connections: u32,
    pub idle_connections: u32,
    pub max_size: u32,
}

/// Process-wide owner of the connection pool.
///
/// Cloning is cheap and shares the same pool.
#[derive(Clone)]
pub struct SessionManager {
    pool: SqlitePool,
    next_scope_id: Arc<AtomicU64>,
    closed: Arc<AtomicBool>,
}

impl SessionManager {
    /// Builds the pool from configuration and applies pending migrations.
    pub fn new(config: &DatabaseConfig) -> StorageResult<Self> {
        Ok(Self {
            pool: open_pool(config)?,
            next_scope_id: Arc::new(AtomicU64::new(1)),
            closed: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Single-connection in-memory database, used by tests and tooling.
    pub fn open_in_memory() -> StorageResult<Self> {
        Self::new(&DatabaseConfig::in_memory())
    }

    /// Checks out one connection and opens a transaction on it.
    ///
    /// The caller owns the returned session until it is dropped. Fails with
    /// [`StorageError::StorageFailure`] once the manager has been shut down.
    pub fn open_scope(&self) -> StorageResult<ScopedSession> {
        if self.is_shut_down() {
            error!("event=scope_open module=db status=error error_code=shut_down");
            return Err(StorageError::failure("session manager has been shut down"));
        }
        let conn = self.pool.get().map_err(|err| {
            error!("event=scope_open module=db status=error error_code=pool_exhausted error={err}");
            StorageError::failure(err)
        })?;
        let scope_id = self.next_scope_id.fetch_add(1, Ordering::Relaxed);
        ScopedSession::begin(conn, scope_id)
    }

    /// Runs one unit of work inside a fresh scope.
    ///
    /// The operation decides whether to commit. When it returns an error the
    /// scope is rolled back before the error is handed back unchanged.
    pub fn scope<T, F>(&self, operation: F) -> StorageResult<T>
    where
        F: FnOnce(&mut ScopedSession) -> StorageResult<T>,
    {
        let mut session = self.open_scope()?;
        match operation(&mut session) {
            Ok(value) => Ok(value),
            Err(err) => {
                if let Err(rollback_err) = session.rollback() {
                    warn!(
                        "event=scope_rollback module=db status=error scope_id={} error={}",
                        session.scope_id(),
                        rollback_err
                    );
                }
                match &err {
                    StorageError::StorageFailure(_) => error!(
                        "event=scope_failed module=db status=error scope_id={} error_code={} error={}",
                        session.scope_id(),
                        err.code(),
                        err
                    ),
                    _ => debug!(
                        "event=scope_failed module=db status=error scope_id={} error_code={}",
                        session.scope_id(),
                        err.code()
                    ),
                }
                Err(err)
            }
        }
    }

    pub fn pool_status(&self) -> PoolStatus {
        let state = self.pool.state();
        PoolStatus {
            connections: state.connections,
            idle_connections: state.idle_connections,
            max_size: self.pool.max_size(),
        }
    }

    pub fn is_shut_down(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Stops the manager and every clone of it from opening new scopes.
    ///
    /// Sessions already checked out keep working until they are dropped.
    /// The pooled connections close when the last clone goes away.
    pub fn shutdown(self) {
        self.closed.store(true, Ordering::Release);
        let status = self.pool_status();
        info!(
            "event=db_shutdown module=db status=ok connections={} idle_connections={}",
            status.connections, status.idle_connections
        );
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("pool", &self.pool_status())
            .field("shut_down", &self.is_shut_down())
            .finish()
    }
}
