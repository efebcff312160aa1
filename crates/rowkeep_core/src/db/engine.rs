//! Storage engine owning the connection pair and the write lock.
//!
//! # Responsibility
//! - Open both connections and materialize the registered schema once.
//! - Keep one prepared fast-insert plan per registered table.
//! - Apply synchronous writes, one statement per write-lock acquisition.
//! - Provide the read-side queries used by row repositories.
//!
//! # Invariants
//! - The write connection lives behind a mutex that doubles as the
//!   synchronous-write lock; batch flushes take the same lock for the whole
//!   phase transaction, so the two write paths never interleave.
//! - All values travel as bound parameters.
//! - Reads only observe committed rows. File stores get this from WAL
//!   snapshots; in-memory stores make readers wait for the write lock.

use super::config::StoreConfig;
use super::open::{open_read_connection, open_write_connection, ConnectionTarget};
use super::version::{materialize_schema, SchemaAction};
use super::{DbError, DbResult};
use crate::batch::op::RawStatement;
use crate::model::value::FieldValue;
use crate::schema::sql::{insert_sql, select_sql, update_sql, EqualityFilter};
use crate::schema::{SchemaRegistry, TableDescriptor};
use log::{debug, error};
use rusqlite::{params_from_iter, Connection};
use std::collections::HashMap;
use std::ops::Deref;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

/// Column name/value pairs of one row, in no particular order.
pub type ColumnValues = Vec<(&'static str, FieldValue)>;

static NULL_VALUE: FieldValue = FieldValue::Null;

/// Prepared insert for one table; bound in `columns` order.
#[derive(Debug, Clone)]
pub(crate) struct InsertPlan {
    pub(crate) sql: String,
    pub(crate) columns: Vec<&'static str>,
}

impl InsertPlan {
    fn for_table(descriptor: &TableDescriptor) -> Self {
        Self {
            sql: insert_sql(descriptor),
            columns: descriptor.value_columns().map(|field| field.name).collect(),
        }
    }

    /// Orders `values` by plan column; absent columns bind `NULL`.
    fn bind<'v>(&self, values: &'v ColumnValues) -> Vec<&'v FieldValue> {
        self.columns
            .iter()
            .map(|column| {
                values
                    .iter()
                    .find(|(name, _)| name == column)
                    .map_or(&NULL_VALUE, |(_, value)| value)
            })
            .collect()
    }

    /// Executes the plan on `conn` and returns the generated key.
    pub(crate) fn execute(&self, conn: &Connection, values: &ColumnValues) -> rusqlite::Result<i64> {
        let mut stmt = conn.prepare_cached(&self.sql)?;
        stmt.execute(params_from_iter(self.bind(values)))?;
        Ok(conn.last_insert_rowid())
    }
}

/// Read connection, plus the write lock when readers must not overlap a
/// write transaction.
pub struct ReadHandle<'e> {
    conn: MutexGuard<'e, Connection>,
    _writer: Option<MutexGuard<'e, Connection>>,
}

impl Deref for ReadHandle<'_> {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        &self.conn
    }
}

/// Owner of the store's connections, schema and write lock.
pub struct StorageEngine {
    registry: Arc<SchemaRegistry>,
    write: Mutex<Connection>,
    read: Mutex<Connection>,
    reader_exclusion: bool,
    insert_plans: HashMap<&'static str, InsertPlan>,
    schema_action: SchemaAction,
}

impl StorageEngine {
    /// Opens the store described by `config` and materializes `registry`.
    ///
    /// Runs on the calling thread; the returned engine is the only owner of
    /// both connections.
    ///
    /// # Errors
    /// - `InvalidConfig` for an unusable configuration.
    /// - `UnsupportedSchemaVersion` when the file is newer than `schema_version`.
    /// - SQLite errors from opening or DDL.
    pub fn open(config: &StoreConfig, registry: Arc<SchemaRegistry>) -> DbResult<Self> {
        config.validate()?;
        let target = ConnectionTarget::resolve(config);

        let mut write = open_write_connection(&target, config)?;
        let schema_action = materialize_schema(&mut write, &registry, config.schema_version)?;
        let read = open_read_connection(&target, config)?;

        let insert_plans = registry
            .descriptors()
            .iter()
            .map(|descriptor| (descriptor.table_name(), InsertPlan::for_table(descriptor)))
            .collect();

        Ok(Self {
            registry,
            write: Mutex::new(write),
            read: Mutex::new(read),
            reader_exclusion: target.needs_reader_exclusion(),
            insert_plans,
            schema_action,
        })
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    /// What opening did to the schema.
    pub fn schema_action(&self) -> SchemaAction {
        self.schema_action
    }

    /// Acquires the write lock and returns the write connection.
    ///
    /// Holding the guard excludes every other writer, batch flushes included.
    pub fn write_handle(&self) -> DbResult<MutexGuard<'_, Connection>> {
        self.write
            .lock()
            .map_err(|_| DbError::LockPoisoned("write connection"))
    }

    /// Returns the read-only connection.
    ///
    /// For in-memory stores this also takes the write lock, so it blocks
    /// while a flush phase is open. Never call it while holding
    /// [`write_handle`](Self::write_handle) on the same thread.
    pub fn read_handle(&self) -> DbResult<ReadHandle<'_>> {
        let writer = if self.reader_exclusion {
            Some(self.write_handle()?)
        } else {
            None
        };
        let conn = self
            .read
            .lock()
            .map_err(|_| DbError::LockPoisoned("read connection"))?;
        Ok(ReadHandle {
            conn,
            _writer: writer,
        })
    }

    pub fn describe_table(&self, table: &str) -> DbResult<&TableDescriptor> {
        self.registry
            .by_table(table)
            .ok_or_else(|| DbError::UnknownTable(table.to_string()))
    }

    pub(crate) fn insert_plan(&self, table: &str) -> DbResult<&InsertPlan> {
        self.insert_plans
            .get(table)
            .ok_or_else(|| DbError::UnknownTable(table.to_string()))
    }

    /// Synchronous insert; returns the generated key.
    pub fn insert_row(&self, table: &str, values: &ColumnValues) -> DbResult<i64> {
        let plan = self.insert_plan(table)?;
        self.sync_write("insert", table, |conn| plan.execute(conn, values))
    }

    /// Synchronous `UPDATE table SET values WHERE filter`; returns changed rows.
    pub fn update_rows(
        &self,
        table: &str,
        values: &ColumnValues,
        filter: &EqualityFilter,
    ) -> DbResult<usize> {
        self.describe_table(table)?;
        self.sync_write("update", table, |conn| apply_update(conn, table, values, filter))
    }

    /// Synchronous raw statement; returns changed rows.
    pub fn execute_raw(&self, statement: &RawStatement) -> DbResult<usize> {
        self.sync_write("raw", "-", |conn| apply_raw(conn, statement))
    }

    fn sync_write<T>(
        &self,
        op: &'static str,
        table: &str,
        apply: impl FnOnce(&Connection) -> rusqlite::Result<T>,
    ) -> DbResult<T> {
        let started_at = Instant::now();
        let conn = self.write_handle()?;
        match apply(&conn) {
            Ok(value) => {
                debug!(
                    "event=sync_write module=db status=ok op={op} table={table} duration_ms={}",
                    started_at.elapsed().as_millis()
                );
                Ok(value)
            }
            Err(err) => {
                error!(
                    "event=sync_write module=db status=error op={op} table={table} duration_ms={} error={}",
                    started_at.elapsed().as_millis(),
                    err
                );
                Err(err.into())
            }
        }
    }

    /// Keys of rows matching `filter`, ascending.
    pub fn query_ids(&self, descriptor: &TableDescriptor, filter: &EqualityFilter) -> DbResult<Vec<i64>> {
        let sql = select_sql(descriptor, &[descriptor.primary_key().name], filter);
        let conn = self.read_handle()?;
        let mut stmt = conn.prepare_cached(&sql)?;
        let ids = stmt
            .query_map(params_from_iter(filter.values()), |row| row.get::<_, i64>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(ids)
    }

    /// Reads every persisted column of the row keyed by `id`.
    pub fn fetch_row(&self, descriptor: &TableDescriptor, id: i64) -> DbResult<Option<ColumnValues>> {
        let filter = EqualityFilter::by_id(descriptor.primary_key().name, id);
        Ok(self.fetch_rows(descriptor, &filter)?.into_iter().next())
    }

    /// Reads every persisted column of the rows matching `filter`, by key.
    pub fn fetch_rows(
        &self,
        descriptor: &TableDescriptor,
        filter: &EqualityFilter,
    ) -> DbResult<Vec<ColumnValues>> {
        let sql = select_sql(descriptor, &[], filter);
        let fields: Vec<_> = descriptor.columns().collect();
        let conn = self.read_handle()?;
        let mut stmt = conn.prepare_cached(&sql)?;
        let mut rows = stmt.query(params_from_iter(filter.values()))?;

        let mut decoded = Vec::new();
        while let Some(row) = rows.next()? {
            let mut values = ColumnValues::with_capacity(fields.len());
            for (index, field) in fields.iter().enumerate() {
                let raw = row.get_ref(index)?;
                let value = FieldValue::from_column(field.field_type, raw).map_err(|message| {
                    DbError::InvalidData(format!(
                        "{}.{}: {message}",
                        descriptor.table_name(),
                        field.name
                    ))
                })?;
                values.push((field.name, value));
            }
            decoded.push(values);
        }
        Ok(decoded)
    }
}

pub(crate) fn apply_update(
    conn: &Connection,
    table: &str,
    values: &ColumnValues,
    filter: &EqualityFilter,
) -> rusqlite::Result<usize> {
    if values.is_empty() {
        return Ok(0);
    }
    let columns: Vec<&str> = values.iter().map(|(name, _)| *name).collect();
    let sql = update_sql(table, &columns, filter);
    let params = values
        .iter()
        .map(|(_, value)| value)
        .chain(filter.values());
    conn.execute(&sql, params_from_iter(params))
}

pub(crate) fn apply_raw(conn: &Connection, statement: &RawStatement) -> rusqlite::Result<usize> {
    conn.execute(&statement.sql, params_from_iter(statement.params.iter()))
}
