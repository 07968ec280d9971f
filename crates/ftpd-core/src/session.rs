//! Session identity shared by logs and accounting records.

use std::fmt;

/// Identifier of one served connection.
///
/// Workers are named after their registry id (`worker-7`); a connection
/// served in inetd mode is named after the process (`inetd-4242`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(String);

impl SessionId {
    /// Creates a session id from a string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Session id for the single connection of an inetd-mode process.
    pub fn for_process(pid: u32) -> Self {
        Self(format!("inetd-{pid}"))
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
