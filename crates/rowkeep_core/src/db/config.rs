//! Store configuration.

use super::{DbError, DbResult};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_FLUSH_INTERVAL_MS: u64 = 30_000;
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// Where the database lives.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreLocation {
    File(PathBuf),
    /// Private in-memory database shared by the store's two connections.
    Memory,
}

/// Runtime options for one store.
///
/// Deserializable so hosts can keep it next to their own settings; missing
/// keys fall back to `StoreConfig::default()`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub location: StoreLocation,
    /// Bumping this drops and recreates every registered table.
    pub schema_version: u32,
    /// Period of the background flush; `None` disables the timer.
    pub flush_interval_ms: Option<u64>,
    pub busy_timeout_ms: u64,
    /// Run one last flush cycle when the store is closed.
    pub flush_on_close: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            location: StoreLocation::Memory,
            schema_version: 1,
            flush_interval_ms: Some(DEFAULT_FLUSH_INTERVAL_MS),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            flush_on_close: true,
        }
    }
}

impl StoreConfig {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            location: StoreLocation::File(path.into()),
            ..Self::default()
        }
    }

    pub fn in_memory() -> Self {
        Self::default()
    }

    pub fn with_schema_version(mut self, version: u32) -> Self {
        self.schema_version = version;
        self
    }

    pub fn with_flush_interval(mut self, interval: Option<Duration>) -> Self {
        self.flush_interval_ms = interval.map(|value| value.as_millis() as u64);
        self
    }

    /// Disables the background timer; flushes happen only on demand.
    pub fn manual_flush(self) -> Self {
        self.with_flush_interval(None)
    }

    pub fn with_flush_on_close(mut self, enabled: bool) -> Self {
        self.flush_on_close = enabled;
        self
    }

    pub fn flush_interval(&self) -> Option<Duration> {
        self.flush_interval_ms.map(Duration::from_millis)
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }

    pub(crate) fn validate(&self) -> DbResult<()> {
        if self.schema_version == 0 {
            return Err(DbError::InvalidConfig(
                "schema_version must be at least 1".to_string(),
            ));
        }
        if self.flush_interval_ms == Some(0) {
            return Err(DbError::InvalidConfig(
                "flush_interval_ms must be positive; use null to disable the timer".to_string(),
            ));
        }
        if let StoreLocation::File(path) = &self.location {
            if path.as_os_str().is_empty() {
                return Err(DbError::InvalidConfig("database path cannot be empty".to_string()));
            }
        }
        Ok(())
    }
}
