//! Client interface for interacting with the RegistryActor.
//!
//! The `RegistryHandle` provides a cheap-to-clone interface for sending
//! commands to the registry actor and subscribing to worker events.
//!
//! # Panic-Free Guarantees
//!
//! This module follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Channel errors are mapped to `RegistryError::ChannelClosed`

use std::time::Duration;

use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::{timeout_at, Instant};
use tracing::debug;

use super::children::{WorkerHandle, WorkerId, WorkerInfo};
use super::commands::{ExitStatus, RegistryCommand, RegistryError, WorkerEvent};

// ============================================================================
// Registry Handle
// ============================================================================

/// Handle for interacting with the registry actor.
///
/// # Usage
///
/// ```ignore
/// let registry = spawn_registry();
///
/// registry.insert(WorkerHandle::new(id, peer, Some(dup))).await?;
/// // ... worker runs ...
/// registry.notify_exit(id, ExitStatus::Exited(end)).await;
///
/// let mut rx = registry.subscribe();
/// while let Ok(event) = rx.recv().await {
///     // Handle event
/// }
/// ```
#[derive(Clone)]
pub struct RegistryHandle {
    /// Command sender to the actor
    sender: mpsc::Sender<RegistryCommand>,

    /// Event broadcaster for subscribing to updates
    event_sender: broadcast::Sender<WorkerEvent>,
}

impl RegistryHandle {
    /// Create a new registry handle.
    pub fn new(
        sender: mpsc::Sender<RegistryCommand>,
        event_sender: broadcast::Sender<WorkerEvent>,
    ) -> Self {
        Self {
            sender,
            event_sender,
        }
    }

    /// Start tracking a worker.
    ///
    /// # Errors
    ///
    /// - `RegistryError::WorkerAlreadyExists` if the id is already tracked
    /// - `RegistryError::RegistryFull` if the registry is at maximum capacity
    /// - `RegistryError::ChannelClosed` if the actor has shut down
    pub async fn insert(&self, handle: WorkerHandle) -> Result<(), RegistryError> {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(RegistryCommand::Insert {
                handle: Box::new(handle),
                respond_to: tx,
            })
            .await
            .map_err(|_| RegistryError::ChannelClosed)?;

        rx.await.map_err(|_| RegistryError::ChannelClosed)?
    }

    /// Report that a worker finished. Fire-and-forget.
    pub async fn notify_exit(&self, id: WorkerId, status: ExitStatus) {
        if self
            .sender
            .send(RegistryCommand::Reap { id, status })
            .await
            .is_err()
        {
            debug!(worker = %id, "Registry gone, exit notification dropped");
        }
    }

    /// Get a single worker by ID.
    ///
    /// Returns `None` if the worker isn't tracked or if communication
    /// with the actor fails.
    pub async fn get(&self, id: WorkerId) -> Option<WorkerInfo> {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(RegistryCommand::Get { id, respond_to: tx })
            .await
            .ok()?;

        rx.await.ok()?
    }

    /// Get every tracked worker.
    ///
    /// Returns an empty vector if communication with the actor fails.
    pub async fn list(&self) -> Vec<WorkerInfo> {
        let (tx, rx) = oneshot::channel();

        if self
            .sender
            .send(RegistryCommand::List { respond_to: tx })
            .await
            .is_err()
        {
            return Vec::new();
        }

        rx.await.unwrap_or_default()
    }

    /// Number of tracked workers (zero if the actor is gone).
    pub async fn count(&self) -> usize {
        self.list().await.len()
    }

    /// Shut down every tracked worker's socket. Returns how many were shut
    /// down (zero if the actor is gone).
    pub async fn force_close_all(&self) -> usize {
        let (tx, rx) = oneshot::channel();

        if self
            .sender
            .send(RegistryCommand::ForceCloseAll { respond_to: tx })
            .await
            .is_err()
        {
            return 0;
        }

        rx.await.unwrap_or(0)
    }

    /// Waits until no worker is tracked, for at most `limit`.
    ///
    /// Returns true if the registry drained in time.
    pub async fn wait_until_empty(&self, limit: Duration) -> bool {
        let deadline = Instant::now() + limit;
        // Subscribe before counting so no reap can slip between the two
        let mut events = self.subscribe();

        loop {
            if self.count().await == 0 {
                return true;
            }

            match timeout_at(deadline, events.recv()).await {
                Err(_) => return false,
                Ok(Ok(_)) | Ok(Err(RecvError::Lagged(_))) => {}
                Ok(Err(RecvError::Closed)) => return self.count().await == 0,
            }
        }
    }

    /// Subscribe to worker events.
    pub fn subscribe(&self) -> broadcast::Receiver<WorkerEvent> {
        self.event_sender.subscribe()
    }

    /// Check if the actor is still running.
    pub fn is_connected(&self) -> bool {
        !self.sender.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionEnd;
    use std::net::SocketAddr;

    fn create_test_handle() -> (RegistryHandle, mpsc::Receiver<RegistryCommand>) {
        let (cmd_tx, cmd_rx) = mpsc::channel(16);
        let (event_tx, _event_rx) = broadcast::channel(16);
        (RegistryHandle::new(cmd_tx, event_tx), cmd_rx)
    }

    fn worker(id: u64) -> WorkerHandle {
        WorkerHandle::new(WorkerId::new(id), SocketAddr::from(([127, 0, 0, 1], 4000)), None)
    }

    #[tokio::test]
    async fn test_handle_is_clone() {
        let (handle, _rx) = create_test_handle();
        let cloned = handle.clone();
        assert!(cloned.is_connected());
    }

    #[tokio::test]
    async fn test_insert_sends_command() {
        let (handle, mut rx) = create_test_handle();

        let insert = tokio::spawn(async move { handle.insert(worker(1)).await });

        match rx.recv().await {
            Some(RegistryCommand::Insert { handle, respond_to }) => {
                assert_eq!(handle.id(), WorkerId::new(1));
                respond_to.send(Ok(())).unwrap();
            }
            other => panic!("unexpected command: {other:?}"),
        }

        assert!(insert.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_insert_channel_closed_error() {
        let (handle, rx) = create_test_handle();
        drop(rx);

        let result = handle.insert(worker(1)).await;
        assert!(matches!(result, Err(RegistryError::ChannelClosed)));
    }

    #[tokio::test]
    async fn test_notify_exit_fire_and_forget() {
        let (handle, mut rx) = create_test_handle();

        handle
            .notify_exit(WorkerId::new(4), ExitStatus::Exited(SessionEnd::PeerClosed))
            .await;

        assert!(matches!(
            rx.recv().await,
            Some(RegistryCommand::Reap { id, .. }) if id == WorkerId::new(4)
        ));
    }

    #[tokio::test]
    async fn test_notify_exit_ignores_closed_channel() {
        let (handle, rx) = create_test_handle();
        drop(rx);

        handle.notify_exit(WorkerId::new(4), ExitStatus::Panicked).await;
    }

    #[tokio::test]
    async fn test_queries_degrade_on_channel_close() {
        let (handle, rx) = create_test_handle();
        drop(rx);

        assert!(handle.get(WorkerId::new(1)).await.is_none());
        assert!(handle.list().await.is_empty());
        assert_eq!(handle.count().await, 0);
        assert_eq!(handle.force_close_all().await, 0);
        assert!(!handle.is_connected());
    }
}
