//! Pending operations held by the batch queue.
//!
//! # Invariants
//! - Raw statements carry their own bound parameters; callers never splice
//!   values into SQL text.
//! - A raw statement is accepted only when its text contains the SQL verb of
//!   the queue it is submitted to.

use crate::batch::ticket::TicketSender;
use crate::db::ColumnValues;
use crate::model::row::RowIdSlot;
use crate::model::value::FieldValue;
use crate::schema::sql::EqualityFilter;
use once_cell::sync::Lazy;
use regex::Regex;
use std::error::Error;
use std::fmt::{Display, Formatter};

static INSERT_VERB_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\binsert\b").expect("valid insert verb regex"));
static UPDATE_VERB_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bupdate\b").expect("valid update verb regex"));
static DELETE_VERB_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bdelete\b").expect("valid delete verb regex"));

/// Category of a raw statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawKind {
    Insert,
    Update,
    Delete,
}

impl RawKind {
    pub fn verb(self) -> &'static str {
        match self {
            Self::Insert => "INSERT",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
        }
    }

    fn pattern(self) -> &'static Regex {
        match self {
            Self::Insert => &INSERT_VERB_RE,
            Self::Update => &UPDATE_VERB_RE,
            Self::Delete => &DELETE_VERB_RE,
        }
    }

    /// Rejects statements that do not mention this kind's verb.
    pub fn check(self, statement: &RawStatement) -> Result<(), ArgumentError> {
        if self.pattern().is_match(&statement.sql) {
            Ok(())
        } else {
            Err(ArgumentError::MissingVerb {
                expected: self.verb(),
                statement: statement.sql.clone(),
            })
        }
    }
}

/// Caller-written SQL plus its positional parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct RawStatement {
    pub sql: String,
    pub params: Vec<FieldValue>,
}

impl RawStatement {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    pub fn with_params(sql: impl Into<String>, params: Vec<FieldValue>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }
}

/// Raw statement rejected before it entered a queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgumentError {
    MissingVerb {
        expected: &'static str,
        statement: String,
    },
}

impl Display for ArgumentError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingVerb {
                expected,
                statement,
            } => write!(
                f,
                "raw statement is not an {expected} statement: `{statement}`"
            ),
        }
    }
}

impl Error for ArgumentError {}

/// Structured insert; the generated key is published to `target` on commit.
pub(crate) struct PendingInsert {
    pub(crate) values: ColumnValues,
    pub(crate) target: Option<RowIdSlot>,
    pub(crate) ticket: TicketSender<i64>,
}

/// Structured `UPDATE table SET ... WHERE filter`.
pub(crate) struct PendingUpdate {
    pub(crate) table: &'static str,
    pub(crate) values: ColumnValues,
    pub(crate) filter: EqualityFilter,
    pub(crate) ticket: TicketSender<()>,
}

/// Raw insert, raw update or delete statement.
pub(crate) struct PendingRaw {
    pub(crate) statement: RawStatement,
    pub(crate) ticket: TicketSender<()>,
}
