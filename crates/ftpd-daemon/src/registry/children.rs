//! Child registry - the listener's bookkeeping of live workers.
//!
//! One [`WorkerHandle`] per worker, created when the connection is accepted
//! and destroyed exactly once when the worker is reaped. The handle keeps
//! the listener-side duplicate of the accepted socket; reaping closes it.
//!
//! # Panic-Free Guarantees
//!
//! This module follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Lookups use iterators and `position`, never direct indexing

use std::fmt;
use std::net::{Shutdown, SocketAddr, TcpStream};

use chrono::{DateTime, Utc};
use tracing::debug;

use ftpd_core::SessionId;

use super::commands::RegistryError;

/// Identity of a worker, assigned by the connection dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WorkerId(u64);

impl WorkerId {
    /// Creates a worker id.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the numeric id.
    pub fn get(self) -> u64 {
        self.0
    }

    /// Session id used in logs and accounting for this worker.
    pub fn session_id(self) -> SessionId {
        SessionId::new(self.to_string())
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "worker-{}", self.0)
    }
}

/// Listener-side record of one worker.
#[derive(Debug)]
pub struct WorkerHandle {
    id: WorkerId,
    peer: SocketAddr,
    spawned_at: DateTime<Utc>,
    socket: Option<TcpStream>,
}

impl WorkerHandle {
    /// Creates a handle. `socket` is the listener's duplicate of the
    /// accepted connection, if one could be made.
    pub fn new(id: WorkerId, peer: SocketAddr, socket: Option<TcpStream>) -> Self {
        Self {
            id,
            peer,
            spawned_at: Utc::now(),
            socket,
        }
    }

    pub fn id(&self) -> WorkerId {
        self.id
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub fn spawned_at(&self) -> DateTime<Utc> {
        self.spawned_at
    }

    /// Returns true while the tracked socket is open.
    pub fn has_socket(&self) -> bool {
        self.socket.is_some()
    }

    /// Closes the tracked socket.
    ///
    /// Returns true if this call closed it, false if it was already closed
    /// (or never tracked).
    pub fn close_socket(&mut self) -> bool {
        match self.socket.take() {
            Some(socket) => {
                drop(socket);
                true
            }
            None => false,
        }
    }

    /// Shuts the connection down in both directions without releasing the
    /// descriptor. The worker's pending I/O fails and it ends its session.
    pub fn force_close(&self) -> bool {
        match &self.socket {
            Some(socket) => {
                if let Err(e) = socket.shutdown(Shutdown::Both) {
                    debug!(worker = %self.id, error = %e, "Socket shutdown failed");
                    return false;
                }
                true
            }
            None => false,
        }
    }

    /// Returns a snapshot of this handle.
    pub fn info(&self) -> WorkerInfo {
        WorkerInfo {
            id: self.id,
            peer: self.peer,
            spawned_at: self.spawned_at,
            socket_open: self.socket.is_some(),
        }
    }
}

/// Snapshot of a worker handle, handed out to callers of the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerInfo {
    pub id: WorkerId,
    pub peer: SocketAddr,
    pub spawned_at: DateTime<Utc>,
    pub socket_open: bool,
}

/// Insertion-ordered collection of worker handles, unique by id.
#[derive(Debug)]
pub struct ChildRegistry {
    children: Vec<WorkerHandle>,
    capacity: usize,
}

impl ChildRegistry {
    /// Creates an empty registry holding at most `capacity` workers.
    pub fn new(capacity: usize) -> Self {
        Self {
            children: Vec::new(),
            capacity,
        }
    }

    /// Adds a handle.
    ///
    /// # Errors
    ///
    /// - `RegistryError::WorkerAlreadyExists` if the id is already tracked
    /// - `RegistryError::RegistryFull` if the registry is at capacity
    pub fn insert(&mut self, handle: WorkerHandle) -> Result<(), RegistryError> {
        if self.position(handle.id()).is_some() {
            return Err(RegistryError::WorkerAlreadyExists(handle.id()));
        }
        if self.children.len() >= self.capacity {
            return Err(RegistryError::RegistryFull { max: self.capacity });
        }
        self.children.push(handle);
        Ok(())
    }

    /// Looks a handle up by id.
    pub fn get(&self, id: WorkerId) -> Option<&WorkerHandle> {
        self.children.iter().find(|child| child.id() == id)
    }

    /// Removes a handle without closing its socket.
    pub fn remove(&mut self, id: WorkerId) -> Option<WorkerHandle> {
        self.position(id).map(|index| self.children.remove(index))
    }

    /// Reaps a finished worker: closes its socket and drops the handle.
    ///
    /// Returns the final snapshot (taken before the close), or `None` if
    /// no worker with this id is tracked.
    pub fn reap(&mut self, id: WorkerId) -> Option<WorkerInfo> {
        let mut handle = self.remove(id)?;
        let info = handle.info();
        if !handle.close_socket() {
            debug!(worker = %id, "Reaped worker had no tracked socket");
        }
        Some(info)
    }

    /// Shuts down the sockets of every tracked worker. Returns how many
    /// sockets were shut down.
    pub fn force_close_all(&self) -> usize {
        self.children
            .iter()
            .filter(|child| child.force_close())
            .count()
    }

    /// Returns snapshots of every handle in insertion order.
    pub fn infos(&self) -> Vec<WorkerInfo> {
        self.children.iter().map(WorkerHandle::info).collect()
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn position(&self, id: WorkerId) -> Option<usize> {
        self.children.iter().position(|child| child.id() == id)
    }
}
