//! Registry actor - owns the child registry and processes commands.
//!
//! The RegistryActor is the single owner of worker bookkeeping. It receives
//! commands via an mpsc channel and publishes events via broadcast. Inserts
//! and reaps for one worker travel the same FIFO channel, and the dispatcher
//! awaits the insert before the worker starts, so a reap can never overtake
//! the insert of its own worker.
//!
//! # Panic-Free Guarantees
//!
//! This module follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Channel send failures are ignored; the requester may have gone away

use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use super::children::{ChildRegistry, WorkerHandle, WorkerId, WorkerInfo};
use super::commands::{ExitStatus, RegistryCommand, RegistryError, WorkerEvent};

// ============================================================================
// Resource Limits
// ============================================================================

/// Maximum number of concurrent workers.
pub const MAX_WORKERS: usize = 512;

// ============================================================================
// Registry Actor
// ============================================================================

/// The registry actor - owns every worker handle.
///
/// Runs in a single task and processes commands sequentially, so all state
/// mutations happen in one place.
pub struct RegistryActor {
    /// Command receiver
    receiver: mpsc::Receiver<RegistryCommand>,

    /// Live workers, in spawn order
    children: ChildRegistry,

    /// Event publisher for spawn/reap notifications
    event_publisher: broadcast::Sender<WorkerEvent>,
}

impl RegistryActor {
    /// Creates a new registry actor holding at most `capacity` workers.
    pub fn new(
        receiver: mpsc::Receiver<RegistryCommand>,
        event_publisher: broadcast::Sender<WorkerEvent>,
        capacity: usize,
    ) -> Self {
        Self {
            receiver,
            children: ChildRegistry::new(capacity),
            event_publisher,
        }
    }

    /// Runs the actor event loop until every command sender is dropped.
    pub async fn run(mut self) {
        debug!(capacity = self.children.capacity(), "Registry actor starting");

        while let Some(cmd) = self.receiver.recv().await {
            self.handle_command(cmd);
        }

        debug!(remaining = self.children.len(), "Registry actor stopped");
    }

    /// Dispatches a command to the appropriate handler.
    fn handle_command(&mut self, cmd: RegistryCommand) {
        match cmd {
            RegistryCommand::Insert { handle, respond_to } => {
                let result = self.handle_insert(*handle);
                let _ = respond_to.send(result);
            }
            RegistryCommand::Reap { id, status } => {
                self.handle_reap(id, status);
            }
            RegistryCommand::Get { id, respond_to } => {
                let _ = respond_to.send(self.handle_get(id));
            }
            RegistryCommand::List { respond_to } => {
                let _ = respond_to.send(self.children.infos());
            }
            RegistryCommand::ForceCloseAll { respond_to } => {
                let closed = self.children.force_close_all();
                info!(closed, remaining = self.children.len(), "Force-closed worker connections");
                let _ = respond_to.send(closed);
            }
        }
    }

    // ========================================================================
    // Command Handlers
    // ========================================================================

    fn handle_insert(&mut self, handle: WorkerHandle) -> Result<(), RegistryError> {
        let id = handle.id();
        let peer = handle.peer();

        self.children.insert(handle)?;

        debug!(worker = %id, peer = %peer, active = self.children.len(), "Worker registered");
        let _ = self.event_publisher.send(WorkerEvent::Spawned { id, peer });
        Ok(())
    }

    fn handle_reap(&mut self, id: WorkerId, status: ExitStatus) {
        match self.children.reap(id) {
            Some(info) => {
                match &status {
                    ExitStatus::Exited(end) => debug!(
                        worker = %id,
                        peer = %info.peer,
                        end = %end,
                        active = self.children.len(),
                        "Worker reaped"
                    ),
                    abnormal => warn!(
                        worker = %id,
                        peer = %info.peer,
                        status = %abnormal,
                        active = self.children.len(),
                        "Worker reaped after abnormal exit"
                    ),
                }
                let _ = self.event_publisher.send(WorkerEvent::Reaped { id, status });
            }
            None => {
                debug!(worker = %id, "Reap for untracked worker ignored");
            }
        }
    }

    fn handle_get(&self, id: WorkerId) -> Option<WorkerInfo> {
        self.children.get(id).map(WorkerHandle::info)
    }

    // ========================================================================
    // Accessors (for testing)
    // ========================================================================

    /// Returns the number of workers currently tracked.
    #[cfg(test)]
    pub fn worker_count(&self) -> usize {
        self.children.len()
    }
}
