//! Completion handles for deferred operations.
//!
//! # Responsibility
//! - Give every enqueued operation a handle that resolves once the flush
//!   phase containing it has committed or rolled back.
//!
//! # Invariants
//! - A ticket resolves at most once.
//! - A ticket whose operation was dropped without being applied resolves to
//!   `FlushError::Abandoned` instead of blocking forever.

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::mpsc::{self, RecvTimeoutError, TryRecvError};
use std::time::Duration;

/// Flush phase; each one runs in its own transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlushPhase {
    /// Structured inserts followed by raw inserts.
    Inserts,
    /// Structured updates followed by raw updates.
    Updates,
    Deletes,
}

impl Display for FlushPhase {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Inserts => write!(f, "inserts"),
            Self::Updates => write!(f, "updates"),
            Self::Deletes => write!(f, "deletes"),
        }
    }
}

/// Why a deferred operation did not commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlushError {
    /// The phase transaction failed and was rolled back as a unit.
    RolledBack { phase: FlushPhase, message: String },
    /// The operation was dropped before any flush applied it.
    Abandoned,
}

impl Display for FlushError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RolledBack { phase, message } => {
                write!(f, "flush phase `{phase}` rolled back: {message}")
            }
            Self::Abandoned => write!(f, "operation was dropped before it was flushed"),
        }
    }
}

impl Error for FlushError {}

/// Handle resolving to the outcome of one deferred operation.
///
/// Insert tickets resolve to the generated row id.
#[derive(Debug)]
pub struct FlushTicket<T> {
    receiver: mpsc::Receiver<Result<T, FlushError>>,
}

impl<T> FlushTicket<T> {
    /// Blocks until the operation's phase has finished.
    pub fn wait(self) -> Result<T, FlushError> {
        self.receiver.recv().unwrap_or(Err(FlushError::Abandoned))
    }

    /// Waits up to `timeout`; `None` means the operation is still queued.
    pub fn wait_timeout(&mut self, timeout: Duration) -> Option<Result<T, FlushError>> {
        match self.receiver.recv_timeout(timeout) {
            Ok(result) => Some(result),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => Some(Err(FlushError::Abandoned)),
        }
    }

    /// Non-blocking poll; `None` means the operation is still queued.
    pub fn try_result(&mut self) -> Option<Result<T, FlushError>> {
        match self.receiver.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(FlushError::Abandoned)),
        }
    }
}

/// Producer half kept next to the queued operation.
#[derive(Debug)]
pub(crate) struct TicketSender<T> {
    sender: mpsc::Sender<Result<T, FlushError>>,
}

impl<T> TicketSender<T> {
    pub(crate) fn resolve(self, result: Result<T, FlushError>) {
        // The caller may have dropped its ticket; nobody is waiting then.
        let _ = self.sender.send(result);
    }
}

pub(crate) fn ticket<T>() -> (TicketSender<T>, FlushTicket<T>) {
    let (sender, receiver) = mpsc::channel();
    (TicketSender { sender }, FlushTicket { receiver })
}

#[cfg(test)]
mod tests {
    use super::{ticket, FlushError, FlushPhase};
    use std::time::Duration;

    #[test]
    fn resolved_ticket_yields_value() {
        let (sender, ticket) = ticket::<i64>();
        sender.resolve(Ok(9));
        assert_eq!(ticket.wait(), Ok(9));
    }

    #[test]
    fn pending_ticket_polls_as_none_then_abandons_on_drop() {
        let (sender, mut ticket) = ticket::<()>();
        assert!(ticket.try_result().is_none());
        assert!(ticket.wait_timeout(Duration::from_millis(5)).is_none());

        drop(sender);
        assert_eq!(ticket.try_result(), Some(Err(FlushError::Abandoned)));
    }

    #[test]
    fn rollback_message_names_phase() {
        let err = FlushError::RolledBack {
            phase: FlushPhase::Updates,
            message: "no such table".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "flush phase `updates` rolled back: no such table"
        );
    }
}
