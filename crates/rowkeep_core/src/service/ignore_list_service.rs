//! Ignore-list use-case service.
//!
//! # Responsibility
//! - Provide list/add/update/remove entry points for ignore items.
//! - Seed the default ignore items into an empty table.
//!
//! # Invariants
//! - Seeding is a single bounded attempt: it inserts only into an empty
//!   table and fails with `DefaultsUnavailable` if the table is still empty.
//! - Service APIs never bypass repository lifecycle checks.

use crate::model::ignore_item::IgnoreItem;
use crate::model::row::RowEntity;
use crate::repo::row_repo::{RowError, RowRepository, WriteMode};
use log::{error, info};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type ServiceResult<T> = Result<T, ServiceError>;

#[derive(Debug)]
pub enum ServiceError {
    Row(RowError),
    /// Default items were inserted but the table still reads back empty.
    DefaultsUnavailable,
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Row(err) => write!(f, "{err}"),
            Self::DefaultsUnavailable => {
                write!(f, "default ignore items are unavailable after seeding")
            }
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Row(err) => Some(err),
            Self::DefaultsUnavailable => None,
        }
    }
}

impl From<RowError> for ServiceError {
    fn from(value: RowError) -> Self {
        Self::Row(value)
    }
}

/// Items seeded into an empty ignore list.
pub fn default_ignore_items() -> Vec<IgnoreItem> {
    vec![
        IgnoreItem::new("android", "android", "ignore Toast"),
        IgnoreItem::new("android", "System-UI", "trust me on this one"),
        IgnoreItem::new("android", "Systeem-UI", "vertrouw me, dit is nodig"),
        IgnoreItem::new("android", "Google Zoeken", "vertrouw me, dit is nodig"),
        IgnoreItem::new("android", "Google Search", "trust me on this one"),
    ]
}

/// Use-case service wrapper for ignore-list editing.
pub struct IgnoreListService<R: RowRepository> {
    repo: R,
}

impl<R: RowRepository> IgnoreListService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// All ignore items, ordered by id.
    pub fn list_items(&self) -> ServiceResult<Vec<IgnoreItem>> {
        Ok(self.repo.list_all::<IgnoreItem>()?)
    }

    /// Inserts `item` immediately and returns its id.
    pub fn add_item(&self, item: &IgnoreItem) -> ServiceResult<i64> {
        self.repo.insert(item, WriteMode::Immediate)?;
        Ok(item.id())
    }

    pub fn update_item(&self, item: &IgnoreItem) -> ServiceResult<()> {
        self.repo.update(item, WriteMode::Immediate)?;
        Ok(())
    }

    pub fn remove_item(&self, item: &IgnoreItem) -> ServiceResult<()> {
        self.repo.delete(item, WriteMode::Immediate)?;
        Ok(())
    }

    /// Whether an item with the same package and app name is listed.
    ///
    /// A match assigns the stored id to `item`.
    pub fn is_ignored(&self, item: &IgnoreItem) -> ServiceResult<bool> {
        Ok(self
            .repo
            .exists_in_database(item, &[IgnoreItem::PACKAGE_NAME, IgnoreItem::APP_NAME])?)
    }

    /// Seeds the default items when the list is empty and returns the list.
    ///
    /// # Errors
    /// - `ServiceError::Row` when reading or inserting fails.
    /// - `ServiceError::DefaultsUnavailable` when the list is still empty
    ///   after seeding.
    pub fn ensure_default_items(&self) -> ServiceResult<Vec<IgnoreItem>> {
        let existing = self.list_items()?;
        if !existing.is_empty() {
            return Ok(existing);
        }

        let defaults = default_ignore_items();
        for item in &defaults {
            if let Err(err) = self.repo.insert(item, WriteMode::Immediate) {
                error!(
                    "event=defaults_seed module=service status=error inserted={} error={}",
                    defaults.iter().filter(|item| item.row_id().is_persisted()).count(),
                    err
                );
                return Err(err.into());
            }
        }

        let seeded = self.list_items()?;
        if seeded.is_empty() {
            error!("event=defaults_seed module=service status=error error=empty_after_seed");
            return Err(ServiceError::DefaultsUnavailable);
        }
        info!(
            "event=defaults_seed module=service status=ok items={}",
            seeded.len()
        );
        Ok(seeded)
    }
}
