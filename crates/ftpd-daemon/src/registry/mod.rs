//! Worker registry using Actor pattern.
//!
//! The registry tracks every live worker of a listening daemon: one handle
//! per accepted connection, inserted by the dispatcher before the worker
//! starts and reaped when the worker's task finishes.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐  Insert  ┌─────────────────┐     ┌──────────────────┐
//! │   Dispatcher    │─────────▶│  RegistryActor  │────▶│ Broadcast Channel│
//! └─────────────────┘          └─────────────────┘     └──────────────────┘
//! ┌─────────────────┐  Reap           │                       │
//! │   Supervisor    │─────────────────┘   WorkerEvent         │
//! └─────────────────┘  (mpsc, FIFO)        (broadcast)        ▼
//!                                                       shutdown drain
//! ```
//!
//! # Panic-Free Guarantees
//!
//! All operations in this module follow the panic-free policy:
//! - No `.unwrap()` or `.expect()` in production code
//! - All fallible operations return `Result` or `Option`
//! - Channel operations handle closure gracefully

use tokio::sync::{broadcast, mpsc};

mod actor;
mod children;
mod commands;
mod handle;

pub use actor::{RegistryActor, MAX_WORKERS};
pub use children::{ChildRegistry, WorkerHandle, WorkerId, WorkerInfo};
pub use commands::{ExitStatus, RegistryCommand, RegistryError, WorkerEvent};
pub use handle::RegistryHandle;

/// Channel buffer sizes
const COMMAND_BUFFER: usize = 100;
const EVENT_BUFFER: usize = 100;

/// Spawn the registry actor with the default capacity and return a handle.
pub fn spawn_registry() -> RegistryHandle {
    spawn_registry_with_capacity(MAX_WORKERS)
}

/// Spawn the registry actor holding at most `capacity` workers.
///
/// Must be called from within a tokio runtime.
pub fn spawn_registry_with_capacity(capacity: usize) -> RegistryHandle {
    let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_BUFFER);
    let (event_tx, _) = broadcast::channel(EVENT_BUFFER);

    let actor = RegistryActor::new(cmd_rx, event_tx.clone(), capacity);
    tokio::spawn(actor.run());

    RegistryHandle::new(cmd_tx, event_tx)
}
