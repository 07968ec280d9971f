//! TCP server for the daemon modes.
//!
//! The server:
//! - Accepts connections on the listening socket
//! - Registers a `WorkerHandle` per connection, then spawns its worker
//! - Turns connections away with 421 when the registry is full
//! - On cancellation stops accepting and drains the workers
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │    FtpServer    │
//! │                 │
//! │   TcpListener   │
//! └───────┬─────────┘
//!         │ accept()
//!         ▼
//! ┌─────────────────┐ Insert ┌─────────────────┐
//! │   dispatcher    │───────▶│ RegistryHandle  │◀──┐
//! └───────┬─────────┘        └─────────────────┘   │ Reap
//!         │ spawn                                  │
//!         ▼                                        │
//! ┌─────────────────┐  JoinHandle  ┌────────────┐  │
//! │     worker      │─────────────▶│ supervisor │──┘
//! │ (session loop)  │              └────────────┘
//! └─────────────────┘
//! ```
//!
//! # Panic-Free Guarantees
//!
//! This module follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Accept errors are logged and the loop continues

mod worker;

pub use worker::{duplicate, spawn_worker, WorkerSpawn};

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use ftpd_core::reply::SERVICE_UNAVAILABLE;
use ftpd_core::{DaemonMode, Reply};

use crate::registry::{RegistryError, RegistryHandle, WorkerHandle, WorkerId};
use crate::session::SessionEnv;

/// How long workers get to finish after a termination request.
pub const TERMINATION_GRACE: Duration = Duration::from_secs(5);

/// How long workers get after their sockets were force-closed.
pub const FORCE_CLOSE_GRACE: Duration = Duration::from_secs(1);

/// Write timeout for the capacity rejection (10 seconds)
const WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// Listening server: one worker per accepted connection.
pub struct FtpServer {
    /// Listening socket, never handed to workers
    listener: TcpListener,

    /// Shared session environment
    env: SessionEnv,

    /// Handle to the worker registry
    registry: RegistryHandle,

    /// Fork-daemon or foreground-daemon
    mode: DaemonMode,

    /// Cancellation token for graceful shutdown
    cancel_token: CancellationToken,

    /// Last assigned worker id
    worker_counter: u64,

    termination_grace: Duration,
    force_close_grace: Duration,
}

impl FtpServer {
    /// Creates a server on an already listening socket.
    pub fn new(
        listener: TcpListener,
        env: SessionEnv,
        registry: RegistryHandle,
        mode: DaemonMode,
        cancel_token: CancellationToken,
    ) -> Self {
        Self {
            listener,
            env,
            registry,
            mode,
            cancel_token,
            worker_counter: 0,
            termination_grace: TERMINATION_GRACE,
            force_close_grace: FORCE_CLOSE_GRACE,
        }
    }

    /// Overrides the drain timings.
    pub fn with_grace(mut self, termination: Duration, force_close: Duration) -> Self {
        self.termination_grace = termination;
        self.force_close_grace = force_close;
        self
    }

    /// Returns the bound address.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Runs the accept loop until the cancellation token fires, then drains
    /// the workers.
    pub async fn run(self) {
        let FtpServer {
            listener,
            env,
            registry,
            mode,
            cancel_token,
            mut worker_counter,
            termination_grace,
            force_close_grace,
        } = self;

        info!(
            addr = ?listener.local_addr().ok(),
            mode = %mode,
            "Server accepting connections"
        );

        loop {
            tokio::select! {
                _ = cancel_token.cancelled() => {
                    info!("Server shutdown requested");
                    break;
                }

                result = listener.accept() => {
                    match result {
                        Ok((stream, peer)) => {
                            worker_counter += 1;
                            let id = WorkerId::new(worker_counter);
                            handle_connection(id, stream, peer, &env, &registry, mode, &cancel_token).await;
                        }
                        Err(e) => {
                            warn!(error = %e, "Failed to accept connection");
                        }
                    }
                }
            }
        }

        // Stop accepting before waiting on the workers
        drop(listener);
        drain(&registry, termination_grace, force_close_grace).await;
    }
}

/// Registers and spawns the worker for one accepted connection.
async fn handle_connection(
    id: WorkerId,
    stream: TcpStream,
    peer: SocketAddr,
    env: &SessionEnv,
    registry: &RegistryHandle,
    mode: DaemonMode,
    cancel_token: &CancellationToken,
) {
    let (stream, tracked) = match duplicate(stream) {
        Ok(split) => split,
        Err(e) => {
            warn!(worker = %id, peer = %peer, error = %e, "Dropping connection");
            return;
        }
    };
    let connection = tracked.as_ref().and_then(|socket| socket.try_clone().ok());

    match registry.insert(WorkerHandle::new(id, peer, tracked)).await {
        Ok(()) => {}
        Err(RegistryError::RegistryFull { max }) => {
            warn!(peer = %peer, max, "Too many connections");
            reject(stream).await;
            return;
        }
        Err(e) => {
            warn!(worker = %id, peer = %peer, error = %e, "Could not register worker");
            return;
        }
    }

    spawn_worker(
        WorkerSpawn {
            id,
            peer,
            stream,
            connection,
            mode,
            env: env.clone(),
            cancel: cancel_token.child_token(),
        },
        registry.clone(),
    );
}

async fn reject(mut stream: TcpStream) {
    let reply = Reply::new(SERVICE_UNAVAILABLE, "Too many connections, try again later.");
    match timeout(WRITE_TIMEOUT, stream.write_all(reply.to_wire().as_bytes())).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => debug!(error = %e, "Failed to send 421"),
        Err(_) => debug!("Timed out sending 421"),
    }
}

/// Waits for the workers to be reaped, force-closing stragglers.
async fn drain(registry: &RegistryHandle, termination_grace: Duration, force_close_grace: Duration) {
    let active = registry.count().await;
    if active == 0 {
        return;
    }

    info!(active, "Waiting for workers to finish");
    if registry.wait_until_empty(termination_grace).await {
        info!("All workers finished");
        return;
    }

    let closed = registry.force_close_all().await;
    warn!(closed, "Workers still running after grace period, connections force-closed");

    if !registry.wait_until_empty(force_close_grace).await {
        let remaining = registry.count().await;
        warn!(remaining, "Workers did not exit");
    }
}
