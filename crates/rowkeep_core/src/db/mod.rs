//! SQLite storage engine: connections, schema materialization and sync writes.
//!
//! # Responsibility
//! - Open and configure the read/write connection pair.
//! - Materialize registered tables and track the schema version.
//! - Serialize every write (synchronous or batched) through one write lock.
//!
//! # Invariants
//! - Schema version is tracked via `PRAGMA user_version`.
//! - A version bump drops and recreates every registered table.
//! - Core code must not read/write rows before materialization succeeds.

use crate::schema::RegistrationError;
use std::error::Error;
use std::fmt::{Display, Formatter};

mod config;
mod engine;
pub mod instance;
mod open;
pub mod version;

pub use config::{StoreConfig, StoreLocation};
pub use engine::{ColumnValues, ReadHandle, StorageEngine};
pub(crate) use engine::{apply_raw, apply_update};

pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug)]
pub enum DbError {
    Sqlite(rusqlite::Error),
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },
    Registration(RegistrationError),
    InvalidConfig(String),
    /// Entity kind has no descriptor in the registry.
    UnknownKind(String),
    /// Table name has no descriptor in the registry.
    UnknownTable(String),
    /// Persisted value cannot be decoded into its declared field type.
    InvalidData(String),
    /// A thread panicked while holding the named lock.
    LockPoisoned(&'static str),
    NotInitialized,
    AlreadyInitialized,
    Thread(String),
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::UnsupportedSchemaVersion {
                db_version,
                latest_supported,
            } => write!(
                f,
                "database schema version {db_version} is newer than supported {latest_supported}"
            ),
            Self::Registration(err) => write!(f, "{err}"),
            Self::InvalidConfig(message) => write!(f, "invalid store configuration: {message}"),
            Self::UnknownKind(kind) => write!(f, "entity kind `{kind}` is not registered"),
            Self::UnknownTable(table) => write!(f, "table `{table}` is not registered"),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
            Self::LockPoisoned(name) => write!(f, "{name} lock is poisoned"),
            Self::NotInitialized => write!(f, "store instance has not been created"),
            Self::AlreadyInitialized => write!(f, "store instance has already been created"),
            Self::Thread(message) => write!(f, "{message}"),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::Registration(err) => Some(err),
            _ => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}

impl From<RegistrationError> for DbError {
    fn from(value: RegistrationError) -> Self {
        Self::Registration(value)
    }
}
