//! Row entity repository contracts and store-backed implementation.
//!
//! # Responsibility
//! - Provide the entity lifecycle: insert, update, delete, load and existence
//!   checks, each on the synchronous or deferred write path.
//! - Translate entities to column values through their registered descriptor.
//!
//! # Invariants
//! - Lifecycle checks run before any statement is built or queued, so a
//!   rejected call never mutates the store.
//! - `insert` requires a transient entity; `update`, `delete` and `load`
//!   require a persisted one.
//! - A deleted handle is rejected by every operation.
//! - Match queries compare with `IS`, so empty and `NULL` values still match.
//!
//! # See also
//! - `batch` for what happens to deferred writes.

use crate::batch::{ArgumentError, RawStatement};
use crate::db::{ColumnValues, DbError};
use crate::model::row::RowEntity;
use crate::model::value::FieldValue;
use crate::schema::sql::{delete_by_id_sql, EqualityFilter};
use crate::schema::TableDescriptor;
use crate::store::Store;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub use crate::store::{WriteMode, WriteOutcome};

pub type RowResult<T> = Result<T, RowError>;

/// Entity used in a lifecycle state that does not allow the operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateError {
    /// `update`, `delete` or `load` on an entity with `id <= 0`.
    NotPersisted {
        table: &'static str,
        operation: &'static str,
    },
    /// `insert` on an entity that already has a key.
    AlreadyPersisted { table: &'static str, id: i64 },
    /// `insert`, `load` or `load_matching` while an insert of the same entity
    /// is still in flight.
    InsertPending { table: &'static str },
    /// Any operation on a handle whose row was deleted through it.
    Deleted { table: &'static str, id: i64 },
}

impl Display for StateError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotPersisted { table, operation } => {
                write!(f, "cannot {operation} a `{table}` row that has no id")
            }
            Self::AlreadyPersisted { table, id } => {
                write!(f, "`{table}` row {id} is already persisted; use update")
            }
            Self::InsertPending { table } => {
                write!(f, "an insert of this `{table}` row is still in flight")
            }
            Self::Deleted { table, id } => write!(f, "`{table}` row {id} was deleted"),
        }
    }
}

impl Error for StateError {}

/// Row lookup that did not resolve to exactly one row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    NotFound {
        table: &'static str,
        criteria: String,
    },
    Ambiguous {
        table: &'static str,
        matches: usize,
    },
}

impl Display for LoadError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound { table, criteria } => {
                write!(f, "no `{table}` row matches {criteria}")
            }
            Self::Ambiguous { table, matches } => {
                write!(f, "{matches} `{table}` rows match; expected exactly one")
            }
        }
    }
}

impl Error for LoadError {}

#[derive(Debug)]
pub enum RowError {
    State(StateError),
    Load(LoadError),
    Argument(ArgumentError),
    Db(DbError),
    /// Entity kind was never registered with the store.
    UnregisteredKind(&'static str),
    /// Match column is not a persisted column of the table.
    UnknownColumn { table: &'static str, column: String },
    /// `load_matching` called without columns.
    EmptyMatchColumns { table: &'static str },
    /// Entity and descriptor disagree, or a column value cannot be applied.
    InvalidData(String),
}

impl Display for RowError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::State(err) => write!(f, "{err}"),
            Self::Load(err) => write!(f, "{err}"),
            Self::Argument(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::UnregisteredKind(kind) => write!(f, "entity kind `{kind}` is not registered"),
            Self::UnknownColumn { table, column } => {
                write!(f, "`{table}` has no persisted column `{column}`")
            }
            Self::EmptyMatchColumns { table } => {
                write!(f, "matching a `{table}` row needs at least one column")
            }
            Self::InvalidData(message) => write!(f, "invalid row data: {message}"),
        }
    }
}

impl Error for RowError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::State(err) => Some(err),
            Self::Load(err) => Some(err),
            Self::Argument(err) => Some(err),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<StateError> for RowError {
    fn from(value: StateError) -> Self {
        Self::State(value)
    }
}

impl From<LoadError> for RowError {
    fn from(value: LoadError) -> Self {
        Self::Load(value)
    }
}

impl From<ArgumentError> for RowError {
    fn from(value: ArgumentError) -> Self {
        Self::Argument(value)
    }
}

impl From<DbError> for RowError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

/// Repository interface for the row entity lifecycle.
pub trait RowRepository {
    /// Persists a transient entity; the outcome yields the generated key.
    fn insert<E: RowEntity>(&self, entity: &E, mode: WriteMode) -> RowResult<WriteOutcome<i64>>;
    /// Writes every non-key field of a persisted entity to its row.
    fn update<E: RowEntity>(&self, entity: &E, mode: WriteMode) -> RowResult<WriteOutcome<()>>;
    /// Deletes the entity's row and retires the handle.
    fn delete<E: RowEntity>(&self, entity: &E, mode: WriteMode) -> RowResult<WriteOutcome<()>>;
    /// Checks by id, or for a transient entity by `compare_columns` (all
    /// value columns when empty), adopting the first match's id.
    fn exists_in_database<E: RowEntity>(&self, entity: &E, compare_columns: &[&str]) -> RowResult<bool>;
    /// Refreshes every field from the row keyed by the entity's id.
    fn load<E: RowEntity>(&self, entity: &mut E) -> RowResult<()>;
    /// Adopts the id of the single row matching `match_columns`, then loads it.
    fn load_matching<E: RowEntity>(&self, entity: &mut E, match_columns: &[&str]) -> RowResult<()>;
    /// Every row of the kind, ordered by id.
    fn list_all<E: RowEntity + Default>(&self) -> RowResult<Vec<E>>;
}

/// Row repository over an open `Store`.
pub struct SqliteRowRepository<'store> {
    store: &'store Store,
}

impl<'store> SqliteRowRepository<'store> {
    pub fn new(store: &'store Store) -> Self {
        Self { store }
    }

    fn descriptor<E: RowEntity>(&self) -> RowResult<&'store TableDescriptor> {
        self.store
            .registry()
            .describe(E::KIND)
            .ok_or(RowError::UnregisteredKind(E::KIND))
    }
}

impl RowRepository for SqliteRowRepository<'_> {
    fn insert<E: RowEntity>(&self, entity: &E, mode: WriteMode) -> RowResult<WriteOutcome<i64>> {
        let descriptor = self.descriptor::<E>()?;
        let table = descriptor.table_name();
        let row_id = entity.row_id();
        ensure_not_deleted(entity, table)?;
        let values = column_values(entity, descriptor)?;

        // The claim covers both paths; the key is checked only once it is held.
        if !row_id.begin_pending_insert() {
            return Err(StateError::InsertPending { table }.into());
        }
        if row_id.is_persisted() {
            row_id.abort_insert();
            return Err(StateError::AlreadyPersisted {
                table,
                id: row_id.get(),
            }
            .into());
        }

        match mode {
            WriteMode::Immediate => match self.store.engine().insert_row(table, &values) {
                Ok(id) => {
                    row_id.finish_insert(id);
                    Ok(WriteOutcome::Applied(id))
                }
                Err(err) => {
                    row_id.abort_insert();
                    Err(err.into())
                }
            },
            WriteMode::Deferred => {
                let ticket = self
                    .store
                    .queue()
                    .queue_insert_for(table, values, row_id.slot());
                Ok(WriteOutcome::Queued(ticket))
            }
        }
    }

    fn update<E: RowEntity>(&self, entity: &E, mode: WriteMode) -> RowResult<WriteOutcome<()>> {
        let descriptor = self.descriptor::<E>()?;
        let id = require_persisted(entity, descriptor, "update")?;
        let table = descriptor.table_name();
        let values = column_values(entity, descriptor)?;
        let filter = EqualityFilter::by_id(descriptor.primary_key().name, id);

        match mode {
            WriteMode::Immediate => {
                self.store.engine().update_rows(table, &values, &filter)?;
                Ok(WriteOutcome::Applied(()))
            }
            WriteMode::Deferred => Ok(WriteOutcome::Queued(
                self.store.queue().queue_update(table, values, filter),
            )),
        }
    }

    fn delete<E: RowEntity>(&self, entity: &E, mode: WriteMode) -> RowResult<WriteOutcome<()>> {
        let descriptor = self.descriptor::<E>()?;
        let id = require_persisted(entity, descriptor, "delete")?;
        let statement =
            RawStatement::with_params(delete_by_id_sql(descriptor), vec![FieldValue::Integer(id)]);

        let outcome = match mode {
            WriteMode::Immediate => {
                self.store.engine().execute_raw(&statement)?;
                WriteOutcome::Applied(())
            }
            WriteMode::Deferred => WriteOutcome::Queued(self.store.queue().queue_delete(statement)?),
        };
        entity.row_id().mark_deleted();
        Ok(outcome)
    }

    fn exists_in_database<E: RowEntity>(
        &self,
        entity: &E,
        compare_columns: &[&str],
    ) -> RowResult<bool> {
        let descriptor = self.descriptor::<E>()?;
        ensure_not_deleted(entity, descriptor.table_name())?;
        let row_id = entity.row_id();
        let engine = self.store.engine();

        if row_id.is_persisted() {
            let filter = EqualityFilter::by_id(descriptor.primary_key().name, row_id.get());
            return Ok(!engine.query_ids(descriptor, &filter)?.is_empty());
        }

        let filter = if compare_columns.is_empty() {
            let all: Vec<&str> = descriptor.value_columns().map(|field| field.name).collect();
            match_filter(entity, descriptor, &all)?
        } else {
            match_filter(entity, descriptor, compare_columns)?
        };
        match engine.query_ids(descriptor, &filter)?.first() {
            Some(&id) => {
                if !row_id.is_insert_pending() {
                    row_id.set(id);
                }
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn load<E: RowEntity>(&self, entity: &mut E) -> RowResult<()> {
        let descriptor = self.descriptor::<E>()?;
        ensure_no_pending_insert(entity, descriptor.table_name())?;
        let id = require_persisted(entity, descriptor, "load")?;
        let row = self
            .store
            .engine()
            .fetch_row(descriptor, id)?
            .ok_or_else(|| LoadError::NotFound {
                table: descriptor.table_name(),
                criteria: format!("{} = {id}", descriptor.primary_key().name),
            })?;
        apply_values(entity, descriptor, row)
    }

    fn load_matching<E: RowEntity>(&self, entity: &mut E, match_columns: &[&str]) -> RowResult<()> {
        let descriptor = self.descriptor::<E>()?;
        let table = descriptor.table_name();
        ensure_not_deleted(entity, table)?;
        ensure_no_pending_insert(entity, table)?;
        if match_columns.is_empty() {
            return Err(RowError::EmptyMatchColumns { table });
        }

        let filter = match_filter(entity, descriptor, match_columns)?;
        let ids = self.store.engine().query_ids(descriptor, &filter)?;
        match ids.as_slice() {
            [] => Err(LoadError::NotFound {
                table,
                criteria: format!("columns [{}]", match_columns.join(", ")),
            }
            .into()),
            [id] => {
                entity.row_id().set(*id);
                self.load(entity)
            }
            many => Err(LoadError::Ambiguous {
                table,
                matches: many.len(),
            }
            .into()),
        }
    }

    fn list_all<E: RowEntity + Default>(&self) -> RowResult<Vec<E>> {
        let descriptor = self.descriptor::<E>()?;
        let rows = self
            .store
            .engine()
            .fetch_rows(descriptor, &EqualityFilter::new())?;

        let mut entities = Vec::with_capacity(rows.len());
        for row in rows {
            let mut entity = E::default();
            apply_values(&mut entity, descriptor, row)?;
            entities.push(entity);
        }
        Ok(entities)
    }
}

fn ensure_not_deleted<E: RowEntity>(entity: &E, table: &'static str) -> Result<(), StateError> {
    let row_id = entity.row_id();
    if row_id.is_deleted() {
        return Err(StateError::Deleted {
            table,
            id: row_id.get(),
        });
    }
    Ok(())
}

/// A queued insert owns the handle's identity until its flush resolves.
fn ensure_no_pending_insert<E: RowEntity>(entity: &E, table: &'static str) -> Result<(), StateError> {
    if entity.row_id().is_insert_pending() {
        return Err(StateError::InsertPending { table });
    }
    Ok(())
}

fn require_persisted<E: RowEntity>(
    entity: &E,
    descriptor: &TableDescriptor,
    operation: &'static str,
) -> Result<i64, StateError> {
    let table = descriptor.table_name();
    ensure_not_deleted(entity, table)?;
    let id = entity.id();
    if id <= 0 {
        return Err(StateError::NotPersisted { table, operation });
    }
    Ok(id)
}

/// Serializes every non-excluded, non-key field.
fn column_values<E: RowEntity>(entity: &E, descriptor: &TableDescriptor) -> RowResult<ColumnValues> {
    descriptor
        .value_columns()
        .map(|field| {
            entity
                .field_value(field.name)
                .map(|value| (field.name, value))
                .ok_or_else(|| missing_field(descriptor, field.name))
        })
        .collect()
}

/// Equality filter over `columns` using the entity's current values.
fn match_filter<E: RowEntity>(
    entity: &E,
    descriptor: &TableDescriptor,
    columns: &[&str],
) -> RowResult<EqualityFilter> {
    let mut filter = EqualityFilter::new();
    for column in columns {
        let field = descriptor
            .column(column)
            .ok_or_else(|| RowError::UnknownColumn {
                table: descriptor.table_name(),
                column: (*column).to_string(),
            })?;
        let value = if field.is_primary_key {
            FieldValue::Integer(entity.id())
        } else {
            entity
                .field_value(field.name)
                .ok_or_else(|| missing_field(descriptor, field.name))?
        };
        filter = filter.and(field.name, value);
    }
    Ok(filter)
}

/// Applies a fetched row: the key goes to the identity, the rest to fields.
fn apply_values<E: RowEntity>(
    entity: &mut E,
    descriptor: &TableDescriptor,
    row: ColumnValues,
) -> RowResult<()> {
    let key = descriptor.primary_key().name;
    for (name, value) in row {
        if name == key {
            let id = value.as_i64().ok_or_else(|| {
                RowError::InvalidData(format!("{}.{key} is not an integer", descriptor.table_name()))
            })?;
            entity.row_id().set(id);
            continue;
        }
        entity
            .set_field_value(name, value)
            .map_err(RowError::InvalidData)?;
    }
    Ok(())
}

fn missing_field(descriptor: &TableDescriptor, field: &str) -> RowError {
    RowError::InvalidData(format!(
        "entity for `{}` does not expose declared field `{field}`",
        descriptor.table_name()
    ))
}
