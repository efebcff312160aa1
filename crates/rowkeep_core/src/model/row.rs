//! Persistable row contract and row identity.
//!
//! # Responsibility
//! - Define `RowEntity`, the statically described persistable object.
//! - Hold row identity in a shared cell so a deferred insert can assign the
//!   generated key after its batch commits.
//!
//! # Invariants
//! - Identity moves transient (`id <= 0`) -> persisted (`id > 0`) at most once.
//! - A deleted handle never becomes usable again.
//! - The batch queue only holds a weak reference to the cell; dropping the
//!   entity before its flush is allowed and simply skips the write-back.

use crate::model::value::FieldValue;
use crate::schema::{EntityKind, FieldDescriptor, RegistrationError, TableDescriptor};
use std::fmt::{Debug, Formatter};
use std::sync::atomic::{AtomicI64, AtomicU8, Ordering};
use std::sync::{Arc, Weak};

const FLAG_INSERT_PENDING: u8 = 0b01;
const FLAG_DELETED: u8 = 0b10;

#[derive(Default)]
struct RowIdCell {
    id: AtomicI64,
    flags: AtomicU8,
}

/// Identity of one row entity.
///
/// `Clone` produces a detached copy carrying the current id and deleted flag;
/// only the original handle receives ids assigned by a later flush.
#[derive(Default)]
pub struct RowId {
    cell: Arc<RowIdCell>,
}

impl RowId {
    /// Transient identity (`id = 0`).
    pub fn new() -> Self {
        Self::default()
    }

    /// Identity pointing at an existing row.
    pub fn from_id(id: i64) -> Self {
        let row_id = Self::new();
        row_id.cell.id.store(id, Ordering::Release);
        row_id
    }

    /// Current key value; `<= 0` while transient.
    pub fn get(&self) -> i64 {
        self.cell.id.load(Ordering::Acquire)
    }

    pub fn is_persisted(&self) -> bool {
        self.get() > 0
    }

    pub fn is_deleted(&self) -> bool {
        self.flags() & FLAG_DELETED != 0
    }

    /// Whether a deferred insert for this row is queued but not flushed yet.
    pub fn is_insert_pending(&self) -> bool {
        self.flags() & FLAG_INSERT_PENDING != 0
    }

    pub(crate) fn set(&self, id: i64) {
        self.cell.id.store(id, Ordering::Release);
    }

    pub(crate) fn mark_deleted(&self) {
        self.cell.flags.fetch_or(FLAG_DELETED, Ordering::AcqRel);
    }

    /// Claims the pending-insert flag; `false` when already claimed.
    pub(crate) fn begin_pending_insert(&self) -> bool {
        let previous = self
            .cell
            .flags
            .fetch_or(FLAG_INSERT_PENDING, Ordering::AcqRel);
        previous & FLAG_INSERT_PENDING == 0
    }

    /// Publishes the key of a synchronously inserted row and drops the claim.
    pub(crate) fn finish_insert(&self, id: i64) {
        self.cell.id.store(id, Ordering::Release);
        self.cell
            .flags
            .fetch_and(!FLAG_INSERT_PENDING, Ordering::AcqRel);
    }

    /// Drops a claim taken by `begin_pending_insert` without assigning a key.
    pub(crate) fn abort_insert(&self) {
        self.cell
            .flags
            .fetch_and(!FLAG_INSERT_PENDING, Ordering::AcqRel);
    }

    pub(crate) fn slot(&self) -> RowIdSlot {
        RowIdSlot {
            cell: Arc::downgrade(&self.cell),
        }
    }

    fn flags(&self) -> u8 {
        self.cell.flags.load(Ordering::Acquire)
    }
}

impl Clone for RowId {
    fn clone(&self) -> Self {
        let copy = Self::from_id(self.get());
        if self.is_deleted() {
            copy.mark_deleted();
        }
        copy
    }
}

impl PartialEq for RowId {
    fn eq(&self, other: &Self) -> bool {
        self.get() == other.get()
    }
}

impl Debug for RowId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "RowId({})", self.get())
    }
}

/// Weak back-reference used by a queued insert to publish its generated key.
#[derive(Debug, Clone)]
pub(crate) struct RowIdSlot {
    cell: Weak<RowIdCell>,
}

impl RowIdSlot {
    /// Publishes the committed key and clears the pending flag.
    pub(crate) fn assign(&self, id: i64) {
        if let Some(cell) = self.cell.upgrade() {
            cell.id.store(id, Ordering::Release);
            cell.flags
                .fetch_and(!FLAG_INSERT_PENDING, Ordering::AcqRel);
        }
    }

    /// Clears the pending flag after a rolled-back insert.
    pub(crate) fn release(&self) {
        if let Some(cell) = self.cell.upgrade() {
            cell.flags
                .fetch_and(!FLAG_INSERT_PENDING, Ordering::AcqRel);
        }
    }
}

impl Debug for RowIdCell {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.id.load(Ordering::Acquire))
    }
}

/// A flat object persisted as one row of one table.
///
/// Implementors declare their layout statically; the key field named by
/// `fields()` is backed by `row_id()` and never passes through
/// `field_value`/`set_field_value`.
pub trait RowEntity {
    /// Registry key of this entity kind.
    const KIND: EntityKind;
    const TABLE_NAME: &'static str;

    /// Declared fields in column order, primary key included.
    fn fields() -> Vec<FieldDescriptor>;

    /// Validated descriptor for registration.
    fn descriptor() -> Result<TableDescriptor, RegistrationError> {
        TableDescriptor::new(Self::TABLE_NAME, Self::KIND, Self::fields())
    }

    fn row_id(&self) -> &RowId;

    /// Current value of a non-key field, `None` for unknown names.
    fn field_value(&self, name: &str) -> Option<FieldValue>;

    /// Assigns a non-key field from a decoded column value.
    fn set_field_value(&mut self, name: &str, value: FieldValue) -> Result<(), String>;

    /// Shorthand for `row_id().get()`.
    fn id(&self) -> i64 {
        self.row_id().get()
    }
}
