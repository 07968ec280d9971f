//! ftpd Core - Shared types for the FTP daemon
//!
//! This crate provides the pieces of the daemon that carry no I/O of their
//! own and are shared between the daemon library (`ftpd-daemon`) and the
//! `ftpd` binary:
//! - `config` - string-keyed configuration lookup loaded from TOML
//! - `settings` - typed, defaulted view over the configuration
//! - `mode` - how the process serves connections
//! - `reply` - FTP reply formatting
//! - `greeting` - hello-string templating
//!
//! All code follows the panic-free policy: no `.unwrap()`, `.expect()`,
//! `panic!()`, `unreachable!()`, `todo!()`, or direct indexing `[i]`.

pub mod config;
pub mod error;
pub mod greeting;
pub mod mode;
pub mod reply;
pub mod session;
pub mod settings;

// Re-exports for convenience
pub use config::{Config, DEFAULT_CONFIG_PATH};
pub use error::{ConfigError, ConfigResult};
pub use greeting::{motd_lines, needs_hostname, render_hello, HelloVars};
pub use mode::DaemonMode;
pub use reply::Reply;
pub use session::SessionId;
pub use settings::{ListenAddr, Settings};

/// Version string substituted for `%v` in greetings.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
