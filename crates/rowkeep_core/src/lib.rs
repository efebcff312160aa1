//! Core persistence logic for rowkeep.
//! Flat row entities over SQLite, with synchronous and batched write paths.

pub mod batch;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod schema;
pub mod service;
pub mod store;

pub use batch::{
    ArgumentError, BatchQueue, FlushError, FlushPhase, FlushReport, FlushTicket, PendingCounts,
    RawKind, RawStatement,
};
pub use db::{DbError, DbResult, StoreConfig, StoreLocation};
pub use logging::{default_log_level, init_logging, logging_status, LoggingConfig, LoggingError};
pub use model::{FieldValue, IgnoreItem, RowEntity, RowId};
pub use repo::row_repo::{
    LoadError, RowError, RowRepository, RowResult, SqliteRowRepository, StateError,
};
pub use schema::{
    EntityKind, FieldDescriptor, FieldType, RegistrationError, SchemaRegistry, TableDescriptor,
};
pub use service::ignore_list_service::{IgnoreListService, ServiceError, ServiceResult};
pub use store::{Store, WriteMode, WriteOutcome};

/// Registry holding every entity kind shipped with the core.
pub fn builtin_registry() -> Result<SchemaRegistry, RegistrationError> {
    let mut registry = SchemaRegistry::new();
    registry.register_entity::<IgnoreItem>()?;
    Ok(registry)
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
