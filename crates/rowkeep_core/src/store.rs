//! Opened store: storage engine, batch queue and flush schedule together.
//!
//! # Responsibility
//! - Wire `StorageEngine`, `BatchQueue` and `FlushScheduler` from one config.
//! - Route raw statements to the synchronous or deferred path.
//! - Shut down with an optional final flush so queued work is not lost.
//!
//! # Invariants
//! - Exactly one flush schedule per store; it stops before the final flush.
//! - `shutdown` is idempotent and also runs on drop.
//!
//! # See also
//! - `repo::row_repo` for entity-level writes.

use crate::batch::{BatchQueue, FlushError, FlushReport, FlushScheduler, FlushTicket, RawKind, RawStatement};
use crate::db::{DbResult, StorageEngine, StoreConfig};
use crate::repo::row_repo::{RowError, RowResult};
use crate::schema::SchemaRegistry;
use log::info;
use std::sync::{Arc, Mutex, PoisonError};

/// Which path a write takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteMode {
    /// Applied now, under the write lock, before the call returns.
    #[default]
    Immediate,
    /// Queued for the next flush cycle.
    Deferred,
}

/// Result of a write issued in either mode.
#[derive(Debug)]
pub enum WriteOutcome<T> {
    Applied(T),
    Queued(FlushTicket<T>),
}

impl<T> WriteOutcome<T> {
    pub fn is_queued(&self) -> bool {
        matches!(self, Self::Queued(_))
    }

    /// Returns the value, blocking on the flush for queued writes.
    pub fn wait(self) -> Result<T, FlushError> {
        match self {
            Self::Applied(value) => Ok(value),
            Self::Queued(ticket) => ticket.wait(),
        }
    }

    pub fn into_ticket(self) -> Option<FlushTicket<T>> {
        match self {
            Self::Applied(_) => None,
            Self::Queued(ticket) => Some(ticket),
        }
    }
}

pub struct Store {
    engine: Arc<StorageEngine>,
    queue: Arc<BatchQueue>,
    scheduler: Mutex<Option<FlushScheduler>>,
    flush_on_close: bool,
    closed: Mutex<bool>,
}

impl Store {
    /// Opens the database, materializes `registry` and starts the flush schedule.
    ///
    /// # Errors
    /// Any `DbError` from opening the engine or spawning the flush thread.
    pub fn open(config: StoreConfig, registry: SchemaRegistry) -> DbResult<Self> {
        let engine = Arc::new(StorageEngine::open(&config, Arc::new(registry))?);
        let queue = Arc::new(BatchQueue::new());
        let scheduler = match config.flush_interval() {
            Some(interval) => Some(FlushScheduler::spawn(
                Arc::clone(&engine),
                Arc::clone(&queue),
                interval,
            )?),
            None => None,
        };

        Ok(Self {
            engine,
            queue,
            scheduler: Mutex::new(scheduler),
            flush_on_close: config.flush_on_close,
            closed: Mutex::new(false),
        })
    }

    pub fn engine(&self) -> &StorageEngine {
        &self.engine
    }

    pub fn queue(&self) -> &BatchQueue {
        &self.queue
    }

    pub fn registry(&self) -> &SchemaRegistry {
        self.engine.registry()
    }

    /// Runs one flush cycle on the calling thread.
    pub fn flush_now(&self) -> FlushReport {
        self.queue.flush(&self.engine)
    }

    /// Executes or queues a caller-written statement.
    ///
    /// The statement must contain the verb of `kind` in both modes.
    ///
    /// # Errors
    /// - `RowError::Argument` when the verb is missing.
    /// - `RowError::Db` for immediate statements SQLite rejects.
    pub fn execute_raw(
        &self,
        kind: RawKind,
        statement: RawStatement,
        mode: WriteMode,
    ) -> RowResult<WriteOutcome<()>> {
        match mode {
            WriteMode::Immediate => {
                kind.check(&statement)?;
                self.engine
                    .execute_raw(&statement)
                    .map_err(RowError::from)?;
                Ok(WriteOutcome::Applied(()))
            }
            WriteMode::Deferred => Ok(WriteOutcome::Queued(self.queue.queue_raw(kind, statement)?)),
        }
    }

    /// Stops the flush schedule, then flushes queued work when configured to.
    ///
    /// Returns the final flush report; `None` when no final flush ran or the
    /// store was already shut down.
    pub fn shutdown(&self) -> Option<FlushReport> {
        {
            let mut closed = self.closed.lock().unwrap_or_else(PoisonError::into_inner);
            if *closed {
                return None;
            }
            *closed = true;
        }

        if let Some(mut scheduler) = self
            .scheduler
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            scheduler.stop();
        }

        if !self.flush_on_close {
            let pending = self.queue.pending().total();
            info!("event=store_close module=store status=ok final_flush=false dropped_ops={pending}");
            return None;
        }
        let report = self.flush_now();
        info!(
            "event=store_close module=store status={} final_flush=true applied={}",
            if report.is_clean() { "ok" } else { "error" },
            report.applied()
        );
        Some(report)
    }

    /// Consumes the store after `shutdown`.
    pub fn close(self) -> Option<FlushReport> {
        self.shutdown()
    }
}

impl Drop for Store {
    fn drop(&mut self) {
        self.shutdown();
    }
}
