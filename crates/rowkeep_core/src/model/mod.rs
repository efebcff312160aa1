//! Row entity model.
//!
//! # Responsibility
//! - Define the persistable-row contract (`RowEntity`) and its identity cell.
//! - Define the scalar value type exchanged with SQLite.
//! - Provide the concrete entity kinds shipped with the core.
//!
//! # Invariants
//! - An entity with `id <= 0` is transient; `id > 0` names a stored row.
//! - Field serialization is driven by a static descriptor, never by introspection.

pub mod ignore_item;
pub mod row;
pub mod value;

pub use ignore_item::IgnoreItem;
pub use row::{RowEntity, RowId};
pub use value::FieldValue;
