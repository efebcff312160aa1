//! Optional process-wide store slot.
//!
//! # Responsibility
//! - Offer `create_instance` / `instance` for hosts that want one global store
//!   instead of passing a `Store` reference around.
//!
//! # Invariants
//! - The slot is written at most once per process; a second
//!   `create_instance` is rejected and never reopens the database.
//! - `instance` before `create_instance` fails with `DbError::NotInitialized`.

use crate::db::{DbError, DbResult, StoreConfig};
use crate::schema::SchemaRegistry;
use crate::store::Store;
use once_cell::sync::OnceCell;

static STORE_INSTANCE: OnceCell<Store> = OnceCell::new();

/// Opens the process-wide store.
///
/// # Errors
/// - `AlreadyInitialized` when a store was created before.
/// - Any error from `Store::open`.
pub fn create_instance(config: StoreConfig, registry: SchemaRegistry) -> DbResult<&'static Store> {
    if STORE_INSTANCE.get().is_some() {
        return Err(DbError::AlreadyInitialized);
    }

    let mut created = false;
    let store = STORE_INSTANCE.get_or_try_init(|| {
        created = true;
        Store::open(config, registry)
    })?;
    if created {
        Ok(store)
    } else {
        Err(DbError::AlreadyInitialized)
    }
}

/// Returns the process-wide store.
pub fn instance() -> DbResult<&'static Store> {
    STORE_INSTANCE.get().ok_or(DbError::NotInitialized)
}
