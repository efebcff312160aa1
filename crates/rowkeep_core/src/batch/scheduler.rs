//! Background thread running flush cycles at a fixed delay.
//!
//! # Invariants
//! - The first cycle starts one interval after `spawn`; each following cycle
//!   starts one interval after the previous one finished.
//! - A failed cycle never stops the schedule.
//! - `stop` returns only after any in-flight cycle has finished.

use crate::batch::BatchQueue;
use crate::db::{DbError, DbResult, StorageEngine};
use log::{error, info};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

const THREAD_NAME: &str = "rowkeep-batch-flush";

/// Owner of the periodic flush thread. Dropping it stops the thread.
#[derive(Debug)]
pub struct FlushScheduler {
    stop: Option<mpsc::Sender<()>>,
    handle: Option<JoinHandle<()>>,
    interval: Duration,
}

impl FlushScheduler {
    /// Starts flushing `queue` into `engine` every `interval`.
    ///
    /// # Errors
    /// `DbError::Thread` when the OS refuses to spawn the thread.
    pub fn spawn(
        engine: Arc<StorageEngine>,
        queue: Arc<BatchQueue>,
        interval: Duration,
    ) -> DbResult<Self> {
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let handle = thread::Builder::new()
            .name(THREAD_NAME.to_string())
            .spawn(move || run_schedule(&engine, &queue, interval, &stop_rx))
            .map_err(|err| DbError::Thread(format!("failed to spawn flush thread: {err}")))?;

        info!(
            "event=flush_scheduler module=batch status=start interval_ms={}",
            interval.as_millis()
        );
        Ok(Self {
            stop: Some(stop_tx),
            handle: Some(handle),
            interval,
        })
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    /// Stops the schedule and joins the thread. Idempotent.
    pub fn stop(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("event=flush_scheduler module=batch status=error error=flush thread panicked");
                return;
            }
            info!("event=flush_scheduler module=batch status=stopped");
        }
    }
}

impl Drop for FlushScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_schedule(
    engine: &StorageEngine,
    queue: &BatchQueue,
    interval: Duration,
    stop: &mpsc::Receiver<()>,
) {
    loop {
        match stop.recv_timeout(interval) {
            Err(RecvTimeoutError::Timeout) => {
                queue.flush(engine);
            }
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }
    }
}
