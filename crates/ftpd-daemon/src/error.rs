//! Error types for the listener and the control channel.

use std::io;

use thiserror::Error;

/// Fatal errors while setting up the listening socket.
///
/// The `Display` text is what the operator sees on standard error before the
/// process exits with status 1.
#[derive(Debug, Error)]
pub enum ListenerError {
    #[error("Socket failed: {0}")]
    Socket(#[source] io::Error),

    #[error("Bind failed: {0}")]
    Bind(#[source] io::Error),

    #[error("Listen failed: {0}")]
    Listen(#[source] io::Error),

    #[error("Daemonize failed: {0}")]
    Daemonize(String),
}

/// Errors on a session's control connection.
#[derive(Debug, Error)]
pub enum ControlError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("Write timeout")]
    WriteTimeout,
}

impl From<io::Error> for ControlError {
    fn from(err: io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listener_error_display() {
        let err = ListenerError::Bind(io::Error::from(io::ErrorKind::AddrInUse));
        assert!(err.to_string().starts_with("Bind failed: "));

        let err = ListenerError::Listen(io::Error::from(io::ErrorKind::PermissionDenied));
        assert!(err.to_string().starts_with("Listen failed: "));
    }

    #[test]
    fn test_control_error_from_io() {
        let err: ControlError = io::Error::new(io::ErrorKind::BrokenPipe, "pipe").into();
        assert_eq!(err.to_string(), "I/O error: pipe");
    }
}
