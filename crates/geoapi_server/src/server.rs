//! # Server
//!
//! Owns the listener and wires the pieces together.
//!
//! ## Design
//!
//! The accept loop runs on the caller's thread and only enqueues accepted
//! sockets. Shutdown flips a flag and wakes the blocking `accept` with a
//! throwaway connection to ourselves, after which the loop drains:
//!
//! 1. one [`Task::Stop`] per worker, queued behind pending connections
//! 2. join workers
//! 3. stop the housekeeper
//! 4. release the terrain engine and every store

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::config::ServerConfig;
use crate::context::ServerContext;
use crate::error::{ServerError, ServerResult};
use crate::housekeeper::Housekeeper;
use crate::worker::{Task, TaskQueue, WorkerPool};

/// A bound, not yet running server.
pub struct GeoServer {
    ctx: Arc<ServerContext>,
    listener: TcpListener,
    addr: SocketAddr,
    running: Arc<AtomicBool>,
}

/// Stops a running [`GeoServer`] from another thread.
#[derive(Clone, Debug)]
pub struct ShutdownHandle {
    running: Arc<AtomicBool>,
    addr: SocketAddr,
}

impl ShutdownHandle {
    /// Requests shutdown. Pending connections are still served.
    pub fn shutdown(&self) {
        if !self.running.swap(false, Ordering::AcqRel) {
            return;
        }
        let mut wake = self.addr;
        if wake.ip().is_unspecified() {
            let loopback = match wake.ip() {
                IpAddr::V4(_) => IpAddr::V4(Ipv4Addr::LOCALHOST),
                IpAddr::V6(_) => IpAddr::V6(Ipv6Addr::LOCALHOST),
            };
            wake.set_ip(loopback);
        }
        // Unblocks accept(); the listener sees the flag and exits
        if let Err(e) = TcpStream::connect(wake) {
            tracing::warn!(target: "geoapi::system", client = "-", error = %e, "shutdown wake-up connect failed");
        }
    }

    /// True until shutdown is requested.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

impl GeoServer {
    /// Validates the configuration, prepares shared state and binds.
    ///
    /// # Errors
    ///
    /// Returns a configuration error, or [`ServerError::Bind`] if the
    /// address is unavailable.
    pub fn bind(config: ServerConfig) -> ServerResult<Self> {
        let bind_address = config.bind_address();
        let ctx = ServerContext::new(config)?;
        let listener = TcpListener::bind(&bind_address).map_err(|source| ServerError::Bind {
            addr: bind_address.clone(),
            source,
        })?;
        let addr = listener.local_addr()?;
        Ok(Self {
            ctx,
            listener,
            addr,
            running: Arc::new(AtomicBool::new(true)),
        })
    }

    /// Address actually bound (resolves port 0).
    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Shared state, for inspection.
    #[must_use]
    pub fn context(&self) -> Arc<ServerContext> {
        Arc::clone(&self.ctx)
    }

    /// A handle that stops [`GeoServer::run`].
    #[must_use]
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            running: Arc::clone(&self.running),
            addr: self.addr,
        }
    }

    /// Serves until shutdown is requested, then drains and releases
    /// everything.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Spawn`] if the worker or housekeeping threads
    /// cannot be started.
    pub fn run(self) -> ServerResult<()> {
        let queue = TaskQueue::new();
        let workers = WorkerPool::spawn(&self.ctx, &queue)?;
        let housekeeper = match Housekeeper::spawn(&self.ctx, &queue) {
            Ok(housekeeper) => housekeeper,
            Err(e) => {
                stop_workers(workers, &queue);
                return Err(e);
            }
        };

        tracing::info!(
            target: "geoapi::system",
            client = "-",
            addr = %self.addr,
            workers = workers.len(),
            "server started"
        );

        for incoming in self.listener.incoming() {
            if !self.running.load(Ordering::Acquire) {
                break;
            }
            match incoming {
                Ok(stream) => match stream.peer_addr() {
                    Ok(peer) => queue.push(Task::Serve(stream, peer)),
                    Err(e) => {
                        tracing::debug!(target: "geoapi::system", client = "-", error = %e, "peer vanished before dispatch");
                    }
                },
                Err(e) => {
                    tracing::warn!(target: "geoapi::system", client = "-", error = %e, "accept failed");
                }
            }
        }

        tracing::info!(
            target: "geoapi::system",
            client = "-",
            pending = queue.outstanding(),
            "shutting down"
        );
        stop_workers(workers, &queue);
        housekeeper.stop();
        self.ctx.lifecycle.shutdown_all();
        tracing::info!(target: "geoapi::system", client = "-", "server stopped");
        Ok(())
    }
}

fn stop_workers(workers: WorkerPool, queue: &TaskQueue) {
    for _ in 0..workers.len() {
        queue.push(Task::Stop);
    }
    workers.join();
}
