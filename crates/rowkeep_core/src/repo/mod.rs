//! Repository layer: entity lifecycle over the storage engine and batch queue.
//!
//! # Responsibility
//! - Define the row entity data access contract.
//! - Isolate descriptor-driven SQL and write-path routing from services.
//!
//! # Invariants
//! - Repository writes check entity lifecycle state before touching storage.
//! - Repository APIs return semantic errors (`StateError`, `LoadError`) in
//!   addition to storage errors.

pub mod row_repo;
