//! Registry actor commands, errors, and events.
//!
//! This module defines the message types for communicating with the `RegistryActor`:
//! - `RegistryCommand`: Commands sent to the actor
//! - `RegistryError`: Errors that can occur during registry operations
//! - `WorkerEvent`: Events published by the registry for subscribers
//! - `ExitStatus`: How a worker finished, reported with its reap

use std::fmt;
use std::net::SocketAddr;

use thiserror::Error;
use tokio::sync::oneshot;

use crate::session::SessionEnd;

use super::children::{WorkerHandle, WorkerId, WorkerInfo};

// ============================================================================
// Registry Commands
// ============================================================================

/// Commands sent to the registry actor.
///
/// Request-style commands carry a oneshot channel for the response. `Reap`
/// is fire-and-forget: it is sent by a worker's supervisor after the worker
/// task has finished, and nobody waits on it.
#[derive(Debug)]
pub enum RegistryCommand {
    /// Start tracking a freshly spawned worker.
    ///
    /// # Errors
    /// - `RegistryError::WorkerAlreadyExists` if the id is already tracked
    /// - `RegistryError::RegistryFull` if at maximum capacity
    Insert {
        /// The worker handle (boxed to keep the enum small)
        handle: Box<WorkerHandle>,
        /// Channel to send the result
        respond_to: oneshot::Sender<Result<(), RegistryError>>,
    },

    /// A worker finished: close its socket and forget it.
    Reap {
        /// ID of the finished worker
        id: WorkerId,
        /// How it finished
        status: ExitStatus,
    },

    /// Get one worker by ID.
    Get {
        id: WorkerId,
        respond_to: oneshot::Sender<Option<WorkerInfo>>,
    },

    /// Get every tracked worker, in spawn order.
    List {
        respond_to: oneshot::Sender<Vec<WorkerInfo>>,
    },

    /// Shut down the socket of every tracked worker.
    ///
    /// Workers stay tracked until their own reap arrives.
    ForceCloseAll {
        /// Channel to send the number of sockets shut down
        respond_to: oneshot::Sender<usize>,
    },
}

// ============================================================================
// Registry Errors
// ============================================================================

/// Errors that can occur during registry operations.
#[derive(Debug, Clone, Error)]
pub enum RegistryError {
    /// The registry has reached its maximum worker capacity.
    #[error("registry is full (max: {max} workers)")]
    RegistryFull {
        /// Maximum number of workers allowed
        max: usize,
    },

    /// A worker with this ID is already tracked.
    #[error("worker already exists: {0}")]
    WorkerAlreadyExists(WorkerId),

    /// The response channel was closed before receiving a response.
    ///
    /// This typically indicates the actor was shut down.
    #[error("response channel closed")]
    ChannelClosed,
}

// ============================================================================
// Exit Status
// ============================================================================

/// How a worker task finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitStatus {
    /// The session loop returned.
    Exited(SessionEnd),
    /// The worker task panicked.
    Panicked,
    /// The worker task was aborted before finishing.
    Aborted,
}

impl fmt::Display for ExitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exited(end) => write!(f, "exited: {end}"),
            Self::Panicked => write!(f, "panicked"),
            Self::Aborted => write!(f, "aborted"),
        }
    }
}

// ============================================================================
// Worker Events
// ============================================================================

/// Events published by the registry to subscribers.
#[derive(Debug, Clone)]
pub enum WorkerEvent {
    /// A worker was inserted.
    Spawned { id: WorkerId, peer: SocketAddr },

    /// A worker was reaped.
    Reaped { id: WorkerId, status: ExitStatus },
}
