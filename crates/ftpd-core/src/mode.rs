//! How the process serves connections.

use std::fmt;

/// Daemonization mode selected on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DaemonMode {
    /// Started by a supervisor with one connection on the standard streams.
    #[default]
    Inetd,

    /// Detach from the terminal, listen, one worker per connection.
    ForkDaemon,

    /// Listen in the foreground, one worker per connection.
    ForegroundDaemon,
}

impl DaemonMode {
    /// Returns true if the process owns a listening socket.
    pub fn is_listener(self) -> bool {
        !matches!(self, Self::Inetd)
    }

    /// Returns true if the process detaches from its controlling terminal.
    pub fn detaches(self) -> bool {
        matches!(self, Self::ForkDaemon)
    }

    /// Returns true if the process redirected its own descriptors and is
    /// therefore responsible for closing the connection socket on shutdown.
    pub fn owns_descriptors(self) -> bool {
        self.is_listener()
    }

    /// Short label used in logs.
    pub fn label(self) -> &'static str {
        match self {
            Self::Inetd => "inetd",
            Self::ForkDaemon => "fork-daemon",
            Self::ForegroundDaemon => "foreground-daemon",
        }
    }
}

impl fmt::Display for DaemonMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
