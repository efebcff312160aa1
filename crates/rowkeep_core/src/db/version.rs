//! Schema version tracking and table materialization.
//!
//! # Responsibility
//! - Create every registered table with `CREATE TABLE IF NOT EXISTS`.
//! - Drop and recreate all registered tables when the schema version is bumped.
//!
//! # Invariants
//! - The applied version is mirrored to `PRAGMA user_version`.
//! - Materialization runs in one transaction; a failure leaves the file untouched.
//! - There is no column-level migration: an upgrade discards existing rows.

use crate::db::{DbError, DbResult};
use crate::schema::sql::{create_table_sql, drop_table_sql};
use crate::schema::SchemaRegistry;
use log::{info, warn};
use rusqlite::Connection;

/// What materialization did to the database.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaAction {
    /// Fresh database: tables created at `version`.
    Created { version: u32 },
    /// Version matched; missing tables (if any) were created.
    Unchanged { version: u32 },
    /// Older version found: registered tables were dropped and recreated.
    Recreated { from: u32, to: u32 },
}

/// Brings the connection's schema to `target_version`.
///
/// # Errors
/// - `UnsupportedSchemaVersion` when the file was written by a newer schema.
/// - SQLite errors from DDL execution.
pub fn materialize_schema(
    conn: &mut Connection,
    registry: &SchemaRegistry,
    target_version: u32,
) -> DbResult<SchemaAction> {
    let current_version = current_user_version(conn)?;
    if current_version > target_version {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: current_version,
            latest_supported: target_version,
        });
    }

    let action = match current_version {
        0 => SchemaAction::Created {
            version: target_version,
        },
        version if version == target_version => SchemaAction::Unchanged { version },
        from => SchemaAction::Recreated {
            from,
            to: target_version,
        },
    };

    let tx = conn.transaction()?;
    if let SchemaAction::Recreated { from, to } = action {
        warn!(
            "event=schema_recreate module=db status=start from_version={from} to_version={to} tables={}",
            registry.descriptors().len()
        );
        for descriptor in registry.descriptors() {
            tx.execute_batch(&drop_table_sql(descriptor.table_name()))?;
        }
    }
    for descriptor in registry.descriptors() {
        tx.execute_batch(&create_table_sql(descriptor))?;
    }
    tx.execute_batch(&format!("PRAGMA user_version = {target_version};"))?;
    tx.commit()?;

    info!(
        "event=schema_materialize module=db status=ok action={:?} tables={}",
        action,
        registry.descriptors().len()
    );
    Ok(action)
}

/// Reads `PRAGMA user_version`.
pub fn current_user_version(conn: &Connection) -> DbResult<u32> {
    let version = conn.query_row("PRAGMA user_version;", [], |row| row.get::<_, u32>(0))?;
    Ok(version)
}
