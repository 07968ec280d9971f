//! ftpd Daemon - process and connection lifecycle for the FTP daemon
//!
//! This crate provides the runtime infrastructure of the daemon:
//! - `listener` - daemonization and the listening socket
//! - `server` - accept loop, one worker task per connection
//! - `inetd` - single session on standard input
//! - `registry` - worker registry actor (tracking and reaping)
//! - `session` - control connection loop
//! - `watchdog` - per-session idle timeouts
//! - `shutdown` - ordered run-once teardown
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        ftpd (-d / -D)                       │
//! ├─────────────────────────────────────────────────────────────┤
//! │                                                             │
//! │  ┌─────────────────┐     ┌─────────────────────────────┐    │
//! │  │    FtpServer    │────▶│       RegistryActor         │    │
//! │  │  (TcpListener)  │     │  (worker handles, reaping)  │    │
//! │  └────────┬────────┘     └──────────────▲──────────────┘    │
//! │           │                             │                   │
//! │           │ spawn                       │ Reap              │
//! │           ▼                             │                   │
//! │  ┌─────────────────┐     ┌──────────────┴──────────────┐    │
//! │  │     Session     │     │         supervisor          │    │
//! │  │ watchdog, seq.  │     │   (awaits the JoinHandle)   │    │
//! │  └─────────────────┘     └─────────────────────────────┘    │
//! │                                                             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Panic-Free Guarantees
//!
//! All production code in this crate follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations return `Result` or `Option`
//! - Channel operations handle closure gracefully

pub mod accounting;
pub mod dispatch;
pub mod error;
pub mod inetd;
pub mod listener;
pub mod logging;
pub mod registry;
pub mod resolve;
pub mod server;
pub mod session;
pub mod shutdown;
pub mod sockopt;
pub mod watchdog;

pub use error::{ControlError, ListenerError};
