//! Deferred write queue and its flush cycle.
//!
//! # Responsibility
//! - Hold pending inserts (grouped per table), raw inserts, updates, raw
//!   updates and deletes, each behind its own lock.
//! - Drain and commit them in ordered phases, one transaction per phase.
//! - Resolve every operation's `FlushTicket` after its phase finishes.
//!
//! # Invariants
//! - Draining swaps a queue with an empty one under that queue's lock; the lock
//!   is released before any I/O, so producers never wait on a flush.
//! - Phase order per cycle: inserts (structured, then raw), updates
//!   (structured, then raw), deletes.
//! - A failed phase rolls back as a unit; later phases of the cycle still run.
//! - Generated keys are published to entities only after their phase commits.
//! - At most one flush cycle runs at a time.
//!
//! # See also
//! - `batch::scheduler` for the periodic trigger.

use crate::db::{apply_raw, apply_update, ColumnValues, DbResult, StorageEngine};
use crate::model::row::RowIdSlot;
use crate::schema::sql::EqualityFilter;
use log::{debug, error, info};
use rusqlite::{Transaction, TransactionBehavior};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Instant;

pub mod op;
pub mod scheduler;
pub mod ticket;

use op::{PendingInsert, PendingRaw, PendingUpdate};
pub use op::{ArgumentError, RawKind, RawStatement};
pub use scheduler::FlushScheduler;
pub use ticket::{FlushError, FlushPhase, FlushTicket};

/// Number of queued operations per category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PendingCounts {
    pub inserts: usize,
    pub raw_inserts: usize,
    pub updates: usize,
    pub raw_updates: usize,
    pub deletes: usize,
}

impl PendingCounts {
    pub fn total(&self) -> usize {
        self.inserts + self.raw_inserts + self.updates + self.raw_updates + self.deletes
    }
}

/// Outcome of one flush cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlushReport {
    /// Committed insert operations, structured and raw.
    pub inserted: usize,
    /// Committed update operations, structured and raw.
    pub updated: usize,
    pub deleted: usize,
    /// Phases that rolled back during this cycle.
    pub failures: Vec<FlushError>,
}

impl FlushReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn applied(&self) -> usize {
        self.inserted + self.updated + self.deleted
    }
}

/// Queues of deferred operations.
#[derive(Default)]
pub struct BatchQueue {
    inserts: Mutex<HashMap<&'static str, Vec<PendingInsert>>>,
    raw_inserts: Mutex<Vec<PendingRaw>>,
    updates: Mutex<Vec<PendingUpdate>>,
    raw_updates: Mutex<Vec<PendingRaw>>,
    deletes: Mutex<Vec<PendingRaw>>,
    flush_cycle: Mutex<()>,
}

impl BatchQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a structured insert into `table`; the ticket yields the new key.
    pub fn queue_insert(&self, table: &'static str, values: ColumnValues) -> FlushTicket<i64> {
        self.push_insert(table, values, None)
    }

    /// Queues an insert whose generated key is written back into `target`.
    pub(crate) fn queue_insert_for(
        &self,
        table: &'static str,
        values: ColumnValues,
        target: RowIdSlot,
    ) -> FlushTicket<i64> {
        self.push_insert(table, values, Some(target))
    }

    fn push_insert(
        &self,
        table: &'static str,
        values: ColumnValues,
        target: Option<RowIdSlot>,
    ) -> FlushTicket<i64> {
        let (sender, ticket) = ticket::ticket();
        lock_queue(&self.inserts)
            .entry(table)
            .or_default()
            .push(PendingInsert {
                values,
                target,
                ticket: sender,
            });
        debug!("event=batch_enqueue module=batch status=ok op=insert table={table}");
        ticket
    }

    /// Queues a raw insert statement.
    ///
    /// # Errors
    /// `ArgumentError` when the text does not contain `INSERT`; nothing is queued.
    pub fn queue_raw_insert(&self, statement: RawStatement) -> Result<FlushTicket<()>, ArgumentError> {
        push_raw(&self.raw_inserts, RawKind::Insert, statement)
    }

    /// Queues `UPDATE table SET values WHERE filter`.
    pub fn queue_update(
        &self,
        table: &'static str,
        values: ColumnValues,
        filter: EqualityFilter,
    ) -> FlushTicket<()> {
        let (sender, ticket) = ticket::ticket();
        lock_queue(&self.updates).push(PendingUpdate {
            table,
            values,
            filter,
            ticket: sender,
        });
        debug!("event=batch_enqueue module=batch status=ok op=update table={table}");
        ticket
    }

    /// Queues a raw update statement.
    ///
    /// # Errors
    /// `ArgumentError` when the text does not contain `UPDATE`; nothing is queued.
    pub fn queue_raw_update(&self, statement: RawStatement) -> Result<FlushTicket<()>, ArgumentError> {
        push_raw(&self.raw_updates, RawKind::Update, statement)
    }

    /// Queues a delete statement.
    ///
    /// # Errors
    /// `ArgumentError` when the text does not contain `DELETE`; nothing is queued.
    pub fn queue_delete(&self, statement: RawStatement) -> Result<FlushTicket<()>, ArgumentError> {
        push_raw(&self.deletes, RawKind::Delete, statement)
    }

    /// Queues a raw statement in the queue matching `kind`.
    pub fn queue_raw(
        &self,
        kind: RawKind,
        statement: RawStatement,
    ) -> Result<FlushTicket<()>, ArgumentError> {
        match kind {
            RawKind::Insert => self.queue_raw_insert(statement),
            RawKind::Update => self.queue_raw_update(statement),
            RawKind::Delete => self.queue_delete(statement),
        }
    }

    /// Current queue depths.
    pub fn pending(&self) -> PendingCounts {
        PendingCounts {
            inserts: lock_queue(&self.inserts).values().map(Vec::len).sum(),
            raw_inserts: lock_queue(&self.raw_inserts).len(),
            updates: lock_queue(&self.updates).len(),
            raw_updates: lock_queue(&self.raw_updates).len(),
            deletes: lock_queue(&self.deletes).len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.pending().total() == 0
    }

    /// Runs one flush cycle against `engine`.
    ///
    /// Never fails as a whole: phase failures are rolled back, reported in
    /// `FlushReport::failures` and delivered to the affected tickets.
    pub fn flush(&self, engine: &StorageEngine) -> FlushReport {
        let _cycle = lock_queue(&self.flush_cycle);
        let started_at = Instant::now();
        let mut report = FlushReport::default();

        match self.flush_inserts(engine) {
            Ok(count) => report.inserted = count,
            Err(err) => report.failures.push(err),
        }
        match self.flush_updates(engine) {
            Ok(count) => report.updated = count,
            Err(err) => report.failures.push(err),
        }
        match self.flush_deletes(engine) {
            Ok(count) => report.deleted = count,
            Err(err) => report.failures.push(err),
        }

        if report.applied() > 0 || !report.is_clean() {
            info!(
                "event=flush_cycle module=batch status={} inserted={} updated={} deleted={} failed_phases={} duration_ms={}",
                if report.is_clean() { "ok" } else { "error" },
                report.inserted,
                report.updated,
                report.deleted,
                report.failures.len(),
                started_at.elapsed().as_millis()
            );
        }
        report
    }

    fn flush_inserts(&self, engine: &StorageEngine) -> Result<usize, FlushError> {
        let mut groups: Vec<(&'static str, Vec<PendingInsert>)> =
            std::mem::take(&mut *lock_queue(&self.inserts))
                .into_iter()
                .filter(|(_, ops)| !ops.is_empty())
                .collect();
        groups.sort_by_key(|(table, _)| *table);
        let raws = std::mem::take(&mut *lock_queue(&self.raw_inserts));

        let count = groups.iter().map(|(_, ops)| ops.len()).sum::<usize>() + raws.len();
        if count == 0 {
            return Ok(0);
        }

        let result = run_phase(engine, FlushPhase::Inserts, count, |tx| {
            let mut generated = Vec::with_capacity(count);
            for (table, ops) in &groups {
                let plan = engine.insert_plan(table)?;
                for op in ops {
                    generated.push(plan.execute(tx, &op.values)?);
                }
            }
            for raw in &raws {
                apply_raw(tx, &raw.statement)?;
            }
            Ok(generated)
        });

        match result {
            Ok(generated) => {
                let ops = groups.into_iter().flat_map(|(_, ops)| ops);
                for (op, id) in ops.zip(generated) {
                    if let Some(target) = &op.target {
                        target.assign(id);
                    }
                    op.ticket.resolve(Ok(id));
                }
                resolve_raws(raws, Ok(()));
                Ok(count)
            }
            Err(err) => {
                for op in groups.into_iter().flat_map(|(_, ops)| ops) {
                    if let Some(target) = &op.target {
                        target.release();
                    }
                    op.ticket.resolve(Err(err.clone()));
                }
                resolve_raws(raws, Err(err.clone()));
                Err(err)
            }
        }
    }

    fn flush_updates(&self, engine: &StorageEngine) -> Result<usize, FlushError> {
        let updates = std::mem::take(&mut *lock_queue(&self.updates));
        let raws = std::mem::take(&mut *lock_queue(&self.raw_updates));
        let count = updates.len() + raws.len();
        if count == 0 {
            return Ok(0);
        }

        let result = run_phase(engine, FlushPhase::Updates, count, |tx| {
            for update in &updates {
                apply_update(tx, update.table, &update.values, &update.filter)?;
            }
            for raw in &raws {
                apply_raw(tx, &raw.statement)?;
            }
            Ok(())
        });

        for update in updates {
            update.ticket.resolve(result.clone());
        }
        resolve_raws(raws, result.clone());
        result.map(|()| count)
    }

    fn flush_deletes(&self, engine: &StorageEngine) -> Result<usize, FlushError> {
        let deletes = std::mem::take(&mut *lock_queue(&self.deletes));
        let count = deletes.len();
        if count == 0 {
            return Ok(0);
        }

        let result = run_phase(engine, FlushPhase::Deletes, count, |tx| {
            for delete in &deletes {
                apply_raw(tx, &delete.statement)?;
            }
            Ok(())
        });

        resolve_raws(deletes, result.clone());
        result.map(|()| count)
    }
}

/// Runs `apply` inside one immediate transaction holding the write lock.
fn run_phase<T>(
    engine: &StorageEngine,
    phase: FlushPhase,
    ops: usize,
    apply: impl FnOnce(&Transaction<'_>) -> DbResult<T>,
) -> Result<T, FlushError> {
    let started_at = Instant::now();
    let result = (|| -> DbResult<T> {
        let mut conn = engine.write_handle()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let value = apply(&tx)?;
        tx.commit()?;
        Ok(value)
    })();

    match result {
        Ok(value) => {
            info!(
                "event=flush_phase module=batch status=ok phase={phase} ops={ops} duration_ms={}",
                started_at.elapsed().as_millis()
            );
            Ok(value)
        }
        Err(err) => {
            error!(
                "event=flush_phase module=batch status=error phase={phase} ops={ops} duration_ms={} error={}",
                started_at.elapsed().as_millis(),
                err
            );
            Err(FlushError::RolledBack {
                phase,
                message: err.to_string(),
            })
        }
    }
}

fn push_raw(
    queue: &Mutex<Vec<PendingRaw>>,
    kind: RawKind,
    statement: RawStatement,
) -> Result<FlushTicket<()>, ArgumentError> {
    kind.check(&statement)?;
    let (sender, ticket) = ticket::ticket();
    lock_queue(queue).push(PendingRaw {
        statement,
        ticket: sender,
    });
    debug!(
        "event=batch_enqueue module=batch status=ok op=raw_{}",
        kind.verb().to_ascii_lowercase()
    );
    Ok(ticket)
}

fn resolve_raws(raws: Vec<PendingRaw>, result: Result<(), FlushError>) {
    for raw in raws {
        raw.ticket.resolve(result.clone());
    }
}

/// Queue contents stay consistent across a panic (pushes and swaps only), so
/// a poisoned queue lock is recovered instead of propagated.
fn lock_queue<T>(queue: &Mutex<T>) -> MutexGuard<'_, T> {
    queue
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
}
