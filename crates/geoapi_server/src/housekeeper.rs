//! # Housekeeper
//!
//! Background thread that wakes on a fixed interval and asks the lifecycle
//! manager what has gone idle. The terrain engine is released in place;
//! store closes are queued as [`Task::CloseStore`] so a worker thread
//! performs them.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use crossbeam_channel::{bounded, RecvTimeoutError, Sender};

use crate::context::ServerContext;
use crate::error::{ServerError, ServerResult};
use crate::worker::{Task, TaskQueue};

/// Handle to the running housekeeping thread.
pub struct Housekeeper {
    stop_tx: Sender<()>,
    handle: JoinHandle<()>,
}

impl Housekeeper {
    /// Starts the thread.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Spawn`] if the thread cannot be created.
    pub fn spawn(ctx: &Arc<ServerContext>, queue: &TaskQueue) -> ServerResult<Self> {
        let (stop_tx, stop_rx) = bounded::<()>(1);
        let interval = ctx.config.lifecycle.housekeeping_interval();
        let ctx = Arc::clone(ctx);
        let queue = queue.clone();
        let name = String::from("geoapi-housekeeper");

        let handle = thread::Builder::new()
            .name(name.clone())
            .spawn(move || loop {
                match stop_rx.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => tick(&ctx, &queue),
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            })
            .map_err(|source| ServerError::Spawn { name, source })?;

        Ok(Self { stop_tx, handle })
    }

    /// Signals the thread and waits for it to exit.
    pub fn stop(self) {
        self.stop_tx.send(()).ok();
        if self.handle.join().is_err() {
            tracing::error!(target: "geoapi::system", client = "-", "housekeeper thread panicked");
        }
    }
}

fn tick(ctx: &ServerContext, queue: &TaskQueue) {
    let report = ctx.lifecycle.housekeep_at(Instant::now());
    for worker in report.stores_to_close {
        queue.push(Task::CloseStore(worker));
    }
}
