//! Connection bootstrap utilities for SQLite.
//!
//! # Responsibility
//! - Resolve the configured location into a connection target.
//! - Open the write connection and, after schema materialization, the read one.
//! - Configure connection pragmas required by core behavior.
//!
//! # Invariants
//! - Both connections of one store point at the same database.
//! - The read connection is `query_only` and never reads uncommitted rows.
//! - In-memory stores use a uniquely named shared-cache URI, so two stores in
//!   one process never see each other's rows.

use super::config::{StoreConfig, StoreLocation};
use super::DbResult;
use log::{error, info};
use rusqlite::{Connection, OpenFlags};
use std::path::PathBuf;
use std::time::Instant;
use uuid::Uuid;

/// Concrete database a store's connections attach to.
#[derive(Debug, Clone)]
pub(crate) enum ConnectionTarget {
    File(PathBuf),
    SharedMemory(String),
}

impl ConnectionTarget {
    pub(crate) fn resolve(config: &StoreConfig) -> Self {
        match &config.location {
            StoreLocation::File(path) => Self::File(path.clone()),
            StoreLocation::Memory => Self::SharedMemory(format!(
                "file:rowkeep-{}?mode=memory&cache=shared",
                Uuid::new_v4().simple()
            )),
        }
    }

    /// Shared-cache connections take table locks instead of snapshots, so a
    /// reader fails with `SQLITE_LOCKED` while a write transaction is open.
    pub(crate) fn needs_reader_exclusion(&self) -> bool {
        matches!(self, Self::SharedMemory(_))
    }

    pub(crate) fn mode(&self) -> &'static str {
        match self {
            Self::File(_) => "file",
            Self::SharedMemory(_) => "memory",
        }
    }

    fn open(&self) -> rusqlite::Result<Connection> {
        match self {
            Self::File(path) => Connection::open(path),
            Self::SharedMemory(uri) => Connection::open_with_flags(
                uri,
                OpenFlags::SQLITE_OPEN_READ_WRITE
                    | OpenFlags::SQLITE_OPEN_CREATE
                    | OpenFlags::SQLITE_OPEN_URI
                    | OpenFlags::SQLITE_OPEN_NO_MUTEX,
            ),
        }
    }
}

/// Opens the connection used by every write path.
///
/// # Side effects
/// - Creates the database file when missing.
/// - Emits `db_open` logging events with duration and status.
pub(crate) fn open_write_connection(
    target: &ConnectionTarget,
    config: &StoreConfig,
) -> DbResult<Connection> {
    open_with(target, "write", |conn| {
        if let ConnectionTarget::File(_) = target {
            // WAL keeps the read connection on a committed snapshot while a
            // batch transaction is open on the write connection.
            conn.query_row("PRAGMA journal_mode = WAL;", [], |_| Ok(()))?;
        }
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.busy_timeout(config.busy_timeout())?;
        Ok(())
    })
}

/// Opens the read-only connection.
pub(crate) fn open_read_connection(
    target: &ConnectionTarget,
    config: &StoreConfig,
) -> DbResult<Connection> {
    open_with(target, "read", |conn| {
        conn.execute_batch("PRAGMA query_only = ON;")?;
        conn.busy_timeout(config.busy_timeout())?;
        Ok(())
    })
}

fn open_with(
    target: &ConnectionTarget,
    role: &'static str,
    configure: impl FnOnce(&Connection) -> rusqlite::Result<()>,
) -> DbResult<Connection> {
    let started_at = Instant::now();
    let mode = target.mode();
    info!("event=db_open module=db status=start mode={mode} role={role}");

    let conn = match target.open() {
        Ok(conn) => conn,
        Err(err) => {
            error!(
                "event=db_open module=db status=error mode={mode} role={role} duration_ms={} error_code=db_open_failed error={}",
                started_at.elapsed().as_millis(),
                err
            );
            return Err(err.into());
        }
    };

    match configure(&conn) {
        Ok(()) => {
            info!(
                "event=db_open module=db status=ok mode={mode} role={role} duration_ms={}",
                started_at.elapsed().as_millis()
            );
            Ok(conn)
        }
        Err(err) => {
            error!(
                "event=db_open module=db status=error mode={mode} role={role} duration_ms={} error_code=db_bootstrap_failed error={}",
                started_at.elapsed().as_millis(),
                err
            );
            Err(err.into())
        }
    }
}
