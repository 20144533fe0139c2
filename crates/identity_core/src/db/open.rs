//! Connection pool bootstrap for SQLite.
//!
//! # Responsibility
//! - Build file or in-memory connection pools.
//! - Configure per-connection pragmas required by core behavior.
//! - Apply schema migrations before the pool is handed out.
//!
//! # Invariants
//! - Every pooled connection has `foreign_keys=ON` and a busy timeout.
//! - In-memory pools hold exactly one connection that is never recycled,
//!   otherwise the database would silently vanish.

use super::migrations::apply_migrations;
use crate::config::{DatabaseConfig, DatabaseLocation};
use crate::error::{StorageError, StorageResult};
use log::{error, info};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;
use std::time::{Duration, Instant};

pub(crate) type SqlitePool = Pool<SqliteConnectionManager>;

/// Builds a connection pool and applies all pending migrations.
///
/// # Side effects
/// - Opens at least one connection eagerly.
/// - Emits `db_open` logging events with duration and status.
pub(crate) fn open_pool(config: &DatabaseConfig) -> StorageResult<SqlitePool> {
    let started_at = Instant::now();
    let mode = config.location.mode();
    info!("event=db_open module=db status=start mode={mode}");

    let pool = match build_pool(config) {
        Ok(pool) => pool,
        Err(err) => {
            error!(
                "event=db_open module=db status=error mode={} duration_ms={} error_code=db_open_failed error={}",
                mode,
                started_at.elapsed().as_millis(),
                err
            );
            return Err(StorageError::failure(err));
        }
    };

    match migrate(&pool) {
        Ok(()) => {
            info!(
                "event=db_open module=db status=ok mode={} pool_size={} duration_ms={}",
                mode,
                pool.max_size(),
                started_at.elapsed().as_millis()
            );
            Ok(pool)
        }
        Err(err) => {
            error!(
                "event=db_open module=db status=error mode={} duration_ms={} error_code=db_bootstrap_failed error={}",
                mode,
                started_at.elapsed().as_millis(),
                err
            );
            Err(err)
        }
    }
}

fn build_pool(config: &DatabaseConfig) -> Result<SqlitePool, r2d2::Error> {
    let busy_timeout = config.busy_timeout;
    let builder = Pool::builder().connection_timeout(config.connection_timeout);

    match &config.location {
        DatabaseLocation::File(path) => {
            let manager = SqliteConnectionManager::file(path)
                .with_init(move |conn| bootstrap_connection(conn, busy_timeout));
            builder.max_size(config.pool_size.max(1)).build(manager)
        }
        DatabaseLocation::Memory => {
            let manager = SqliteConnectionManager::memory()
                .with_init(move |conn| bootstrap_connection(conn, busy_timeout));
            builder
                .max_size(1)
                .min_idle(Some(1))
                .idle_timeout(None)
                .max_lifetime(None)
                .build(manager)
        }
    }
}

fn bootstrap_connection(conn: &mut Connection, busy_timeout: Duration) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(busy_timeout)?;
    Ok(())
}

fn migrate(pool: &SqlitePool) -> StorageResult<()> {
    let mut conn = pool.get().map_err(StorageError::failure)?;
    apply_migrations(&mut conn)
}
