//! # Worker Pool
//!
//! Fixed number of OS threads pulling [`Task`]s from one unbounded FIFO.
//!
//! ## Design
//!
//! ```text
//! listener ──Serve──►┐
//!                    ├──► [ crossbeam channel ] ──► worker-0 … worker-N
//! housekeeper ─Close─┘
//! shutdown ───Stop───┘   (one per worker)
//! ```
//!
//! Each task is acknowledged after it is handled, whatever the outcome. A
//! panicking handler is caught at this boundary, logged and answered by
//! closing the connection; the worker then takes the next task.

use std::any::Any;
use std::io::Write;
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use crossbeam_channel::{unbounded, Receiver, Sender};

use crate::context::ServerContext;
use crate::error::{ApiError, ServerError, ServerResult};
use crate::handlers;
use crate::lifecycle::WorkerId;
use crate::protocol::{self, Response};

/// Unit of work for a worker.
#[derive(Debug)]
pub enum Task {
    /// Serve one accepted connection.
    Serve(TcpStream, SocketAddr),
    /// Close a worker's store if it is still idle.
    CloseStore(WorkerId),
    /// Exit the worker loop.
    Stop,
}

/// Shared FIFO of tasks with an outstanding-task counter.
#[derive(Clone)]
pub struct TaskQueue {
    tx: Sender<Task>,
    rx: Receiver<Task>,
    outstanding: Arc<AtomicU64>,
}

impl TaskQueue {
    /// Creates an empty, unbounded queue.
    #[must_use]
    pub fn new() -> Self {
        let (tx, rx) = unbounded();
        Self {
            tx,
            rx,
            outstanding: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Enqueues a task. Never blocks.
    pub fn push(&self, task: Task) {
        self.outstanding.fetch_add(1, Ordering::AcqRel);
        // Both ends live in `self`, so the channel cannot be disconnected
        if self.tx.send(task).is_err() {
            self.outstanding.fetch_sub(1, Ordering::AcqRel);
        }
    }

    /// Blocks until a task is available.
    #[must_use]
    pub fn pop(&self) -> Option<Task> {
        self.rx.recv().ok()
    }

    /// Marks one popped task as handled.
    pub fn ack(&self) {
        self.outstanding.fetch_sub(1, Ordering::AcqRel);
    }

    /// Tasks pushed but not yet acknowledged.
    #[must_use]
    pub fn outstanding(&self) -> u64 {
        self.outstanding.load(Ordering::Acquire)
    }
}

impl Default for TaskQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// The running worker threads.
pub struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawns one thread per configured worker.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Spawn`] if a thread cannot be created; workers
    /// already started keep running until they receive [`Task::Stop`].
    pub fn spawn(ctx: &Arc<ServerContext>, queue: &TaskQueue) -> ServerResult<Self> {
        let count = ctx.config.server.workers;
        let mut handles = Vec::with_capacity(count);
        for index in 0..count {
            let id = WorkerId(index);
            let ctx = Arc::clone(ctx);
            let queue = queue.clone();
            let name = format!("geoapi-{id}");
            let handle = thread::Builder::new()
                .name(name.clone())
                .spawn(move || run_worker(id, &ctx, &queue))
                .map_err(|source| ServerError::Spawn { name, source })?;
            handles.push(handle);
        }
        Ok(Self { handles })
    }

    /// Number of worker threads.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// True if no worker was started.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Waits for every worker to exit. Push one [`Task::Stop`] per worker
    /// first.
    pub fn join(self) {
        for handle in self.handles {
            let name = handle.thread().name().unwrap_or("worker").to_owned();
            if handle.join().is_err() {
                tracing::error!(target: "geoapi::system", client = "-", worker = %name, "worker thread panicked");
            }
        }
    }
}

fn run_worker(id: WorkerId, ctx: &ServerContext, queue: &TaskQueue) {
    tracing::debug!(target: "geoapi::system", client = "-", worker = %id, "worker started");
    while let Some(task) = queue.pop() {
        let stop = matches!(task, Task::Stop);
        match task {
            Task::Serve(stream, peer) => serve_connection(id, ctx, stream, peer),
            Task::CloseStore(target) => {
                ctx.lifecycle.close_store(target);
            }
            Task::Stop => {}
        }
        queue.ack();
        if stop {
            break;
        }
    }
    tracing::debug!(target: "geoapi::system", client = "-", worker = %id, "worker stopped");
}

/// Reads, handles and answers one connection, then closes it.
pub(crate) fn serve_connection(worker: WorkerId, ctx: &ServerContext, mut stream: TcpStream, peer: SocketAddr) {
    let started = Instant::now();

    let head = match protocol::read_request(&mut stream) {
        Ok(head) if head.is_empty() => {
            close(&stream);
            return;
        }
        Ok(head) => head,
        Err(e) => {
            tracing::warn!(target: "geoapi::access", client = %peer.ip(), error = %e, "request read failed");
            close(&stream);
            return;
        }
    };

    let (client, request_line, result) = match protocol::parse_request(&head) {
        Ok(request) => {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| handlers::dispatch(ctx, worker, &request)));
            let result = outcome.unwrap_or_else(|payload| Err(ApiError::Handler(panic_message(&*payload))));
            (request.client_ip(peer), request.request_line, result)
        }
        Err(e) => {
            let first_line = String::from_utf8_lossy(&head)
                .lines()
                .next()
                .unwrap_or_default()
                .to_owned();
            (peer.ip().to_string(), first_line, Err(e))
        }
    };

    let response = match result {
        Ok(response) => Some(response),
        Err(e) => match e.status() {
            Some(status) => {
                tracing::debug!(target: "geoapi::access", client = %client, error = %e, "request rejected");
                Some(Response::empty(status))
            }
            None => {
                tracing::error!(
                    target: "geoapi::access",
                    client = %client,
                    request = %request_line,
                    elapsed_ms = elapsed_ms(started),
                    error = %e,
                    "request failed, closing connection"
                );
                None
            }
        },
    };

    if let Some(response) = response {
        if let Err(e) = response.write_to(&mut stream) {
            tracing::warn!(target: "geoapi::access", client = %client, error = %e, "response write failed");
        }
        tracing::info!(
            target: "geoapi::access",
            client = %client,
            status = response.status(),
            request = %request_line,
            elapsed_ms = elapsed_ms(started),
            "request served"
        );
    }
    close(&stream);
}

fn close(mut stream: &TcpStream) {
    stream.flush().ok();
    stream.shutdown(Shutdown::Both).ok();
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("panic: {message}")
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("panic: {message}")
    } else {
        "panic".to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use std::net::TcpListener;

    use geoapi_store::PointStore;
    use geoapi_terrain::TerrainSynthesizer;

    use crate::config::ServerConfig;
    use crate::error::LifecycleError;
    use crate::lifecycle::{StoreLoader, TerrainLoader};

    fn send(queue: &TaskQueue, listener: &TcpListener, target: &str) -> Vec<u8> {
        let mut client = TcpStream::connect(listener.local_addr().unwrap()).unwrap();
        client
            .write_all(format!("GET {target} HTTP/1.1\r\n\r\n").as_bytes())
            .unwrap();
        let (stream, peer) = listener.accept().unwrap();
        queue.push(Task::Serve(stream, peer));
        let mut response = Vec::new();
        client.read_to_end(&mut response).unwrap();
        response
    }

    #[test]
    fn test_queue_fifo_and_ack() {
        let queue = TaskQueue::new();
        queue.push(Task::CloseStore(WorkerId(3)));
        queue.push(Task::Stop);
        assert_eq!(queue.outstanding(), 2);

        assert!(matches!(queue.pop(), Some(Task::CloseStore(WorkerId(3)))));
        queue.ack();
        assert!(matches!(queue.pop(), Some(Task::Stop)));
        queue.ack();
        assert_eq!(queue.outstanding(), 0);
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(&*payload), "panic: boom");
        let payload: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(&*payload), "panic: bang");
        let payload: Box<dyn Any + Send> = Box::new(7u8);
        assert_eq!(panic_message(&*payload), "panic");
    }

    #[test]
    fn test_worker_survives_handler_panic() {
        let id = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let mut config = ServerConfig::default();
        config.server.workers = 1;
        config.cache.dir = std::env::temp_dir().join(format!("test_geoapi_worker_panic_{id}"));

        let terrain_config = config.terrain.clone();
        let terrain_loader: TerrainLoader<TerrainSynthesizer> = Box::new(move || {
            TerrainSynthesizer::init(terrain_config.clone()).map_err(LifecycleError::from)
        });
        let store_loader: StoreLoader<PointStore> =
            Box::new(|_: WorkerId| -> Result<PointStore, LifecycleError> { panic!("store loader exploded") });
        let ctx = ServerContext::with_loaders(config, terrain_loader, store_loader).unwrap();

        let queue = TaskQueue::new();
        let pool = WorkerPool::spawn(&ctx, &queue).unwrap();
        assert_eq!(pool.len(), 1);
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let mapdata = "/mapdata?lat_min=0&lat_max=1&lon_min=0&lon_max=1";

        assert!(send(&queue, &listener, mapdata).is_empty(), "panic closes without a reply");
        let map = send(&queue, &listener, "/map?lat_min=0&lat_max=1&lon_min=0&lon_max=1&step=0.5");
        assert!(map.starts_with(b"HTTP/1.1 200"), "same worker serves the next request");
        assert!(send(&queue, &listener, mapdata).is_empty());

        queue.push(Task::Stop);
        pool.join();
        assert_eq!(queue.outstanding(), 0);
        std::fs::remove_dir_all(&ctx.config.cache.dir).ok();
    }
}
