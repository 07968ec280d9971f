//! Per-session context.

use std::net::SocketAddr;
use std::time::Duration;

use ftpd_core::{DaemonMode, SessionId, Settings};

/// Everything a session knows about itself and its peer.
///
/// Built once per connection by the worker (or by the inetd entry point)
/// and never shared between sessions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    pub mode: DaemonMode,
    pub session_id: SessionId,
    pub control_timeout: Duration,
    pub data_timeout: Duration,
    pub xfer_bufsize: usize,
    pub peer: SocketAddr,
    /// Resolved peer name, or the numeric peer address
    pub remote_host: String,
    pub local: SocketAddr,
}

impl SessionContext {
    pub fn new(
        settings: &Settings,
        mode: DaemonMode,
        session_id: SessionId,
        peer: SocketAddr,
        local: SocketAddr,
    ) -> Self {
        Self {
            mode,
            session_id,
            control_timeout: settings.control_timeout,
            data_timeout: settings.data_timeout,
            xfer_bufsize: settings.xfer_bufsize,
            peer,
            remote_host: peer.ip().to_string(),
            local,
        }
    }

    /// Replaces the numeric host with a resolved name.
    pub fn with_remote_host(mut self, host: impl Into<String>) -> Self {
        self.remote_host = host.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_host_by_default() {
        let settings = Settings::default();
        let context = SessionContext::new(
            &settings,
            DaemonMode::ForegroundDaemon,
            SessionId::new("worker-1"),
            "203.0.113.9:40000".parse().unwrap(),
            "192.0.2.1:21".parse().unwrap(),
        );

        assert_eq!(context.remote_host, "203.0.113.9");
        assert_eq!(context.control_timeout, settings.control_timeout);
        assert_eq!(context.xfer_bufsize, 4096);

        let context = context.with_remote_host("client.example.net");
        assert_eq!(context.remote_host, "client.example.net");
    }
}
