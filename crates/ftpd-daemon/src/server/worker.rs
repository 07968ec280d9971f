//! Worker tasks and their supervisors.
//!
//! A worker owns one accepted connection and runs its session. A supervisor
//! task awaits the worker's `JoinHandle` and turns its completion (normal
//! return, panic, abort) into exactly one reap notification.

use std::io;
use std::net::{Shutdown, SocketAddr};

use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use ftpd_core::DaemonMode;

use crate::registry::{ExitStatus, RegistryHandle, WorkerId};
use crate::session::{serve_connection, SessionEnd, SessionEnv};
use crate::shutdown::{ShutdownSequencer, Stage};

/// Splits ownership of an accepted connection.
///
/// Returns the stream for the worker and, if duplication worked, a std
/// duplicate for the listener side.
pub fn duplicate(stream: TcpStream) -> io::Result<(TcpStream, Option<std::net::TcpStream>)> {
    let std_stream = stream.into_std()?;
    let dup = match std_stream.try_clone() {
        Ok(dup) => Some(dup),
        Err(e) => {
            debug!(error = %e, "Could not duplicate accepted socket");
            None
        }
    };
    Ok((TcpStream::from_std(std_stream)?, dup))
}

/// Everything a worker needs, moved into its task.
pub struct WorkerSpawn {
    pub id: WorkerId,
    pub peer: SocketAddr,
    pub stream: TcpStream,
    /// Socket copy shut down by the worker's `Connection` stage
    pub connection: Option<std::net::TcpStream>,
    pub mode: DaemonMode,
    pub env: SessionEnv,
    pub cancel: CancellationToken,
}

/// Spawns the worker and its supervisor.
pub fn spawn_worker(spawn: WorkerSpawn, registry: RegistryHandle) {
    let id = spawn.id;
    let worker = tokio::spawn(run_worker(spawn));
    tokio::spawn(supervise(id, worker, registry));
}

async fn run_worker(spawn: WorkerSpawn) -> SessionEnd {
    let WorkerSpawn {
        id,
        peer,
        stream,
        connection,
        mode,
        env,
        cancel,
    } = spawn;

    let mut shutdown = ShutdownSequencer::new(id.to_string());
    if mode.owns_descriptors() {
        if let Some(socket) = connection {
            shutdown.register(Stage::Connection, move || {
                if let Err(e) = socket.shutdown(Shutdown::Both) {
                    debug!(error = %e, "Connection already shut down");
                }
            });
        }
    }

    debug!(worker = %id, peer = %peer, "Worker started");
    serve_connection(&env, stream, mode, id.session_id(), cancel, shutdown).await
}

/// Waits for the worker and reports how it ended.
async fn supervise(id: WorkerId, worker: JoinHandle<SessionEnd>, registry: RegistryHandle) {
    let status = exit_status(worker.await);
    registry.notify_exit(id, status).await;
}

fn exit_status(result: Result<SessionEnd, tokio::task::JoinError>) -> ExitStatus {
    match result {
        Ok(end) => ExitStatus::Exited(end),
        Err(e) if e.is_panic() => ExitStatus::Panicked,
        Err(_) => ExitStatus::Aborted,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{spawn_registry, WorkerEvent, WorkerHandle};
    use std::future::pending;
    use std::io::Read;

    #[tokio::test]
    async fn test_duplicate_shares_connection() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let client = std::thread::spawn(move || {
            let mut client = std::net::TcpStream::connect(addr).unwrap();
            let mut buf = [0u8; 1];
            client.read(&mut buf).unwrap()
        });

        let (stream, _) = listener.accept().await.unwrap();
        let (stream, dup) = duplicate(stream).unwrap();
        let dup = dup.unwrap();
        assert_eq!(dup.peer_addr().unwrap(), stream.peer_addr().unwrap());

        // Closing the worker side alone does not hang up on the client
        drop(stream);
        dup.shutdown(Shutdown::Both).unwrap();
        assert_eq!(client.join().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_panicking_worker_is_reaped() {
        let registry = spawn_registry();
        let mut events = registry.subscribe();
        let id = WorkerId::new(1);
        registry
            .insert(WorkerHandle::new(id, "127.0.0.1:1".parse().unwrap(), None))
            .await
            .unwrap();

        let worker: JoinHandle<SessionEnd> = tokio::spawn(async { panic!("worker bug") });
        supervise(id, worker, registry.clone()).await;

        loop {
            if let WorkerEvent::Reaped { id: reaped, status } = events.recv().await.unwrap() {
                assert_eq!(reaped, id);
                assert_eq!(status, ExitStatus::Panicked);
                break;
            }
        }
        assert_eq!(registry.count().await, 0);
    }

    #[tokio::test]
    async fn test_aborted_worker_status() {
        let worker: JoinHandle<SessionEnd> = tokio::spawn(pending());
        worker.abort();
        assert_eq!(exit_status(worker.await), ExitStatus::Aborted);
    }
}
