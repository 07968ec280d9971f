//! Daemonization and the listening socket.
//!
//! Order matters in the daemon modes:
//! 1. [`detach`] (fork-daemon only), before the tokio runtime exists
//! 2. [`bind_listener`] inside the runtime; failures still reach stderr
//! 3. [`redirect_stdio_to_null`] once the socket is listening

use std::fs::OpenOptions;
use std::io;
use std::net::SocketAddr;
use std::os::fd::AsRawFd;

use daemonize::{Daemonize, Stdio};
use tokio::net::{TcpListener, TcpSocket};
use tracing::debug;

use crate::error::ListenerError;

/// Listen backlog for the control port.
pub const LISTEN_BACKLOG: u32 = 5;

/// Detaches from the controlling terminal: fork, `setsid`, fork again.
///
/// Only the grandchild returns; the original process exits 0. Standard
/// output and error stay attached so bind failures are still reported.
///
/// Must be called before the tokio runtime is started.
pub fn detach() -> Result<(), ListenerError> {
    Daemonize::new()
        .working_directory("/")
        .stdout(Stdio::keep())
        .stderr(Stdio::keep())
        .start()
        .map_err(|e| ListenerError::Daemonize(e.to_string()))
}

/// Creates, binds and listens on `addr`.
///
/// Address and port reuse are requested best effort.
///
/// # Errors
///
/// `ListenerError::Socket`, `Bind` or `Listen` with the OS error.
pub fn bind_listener(addr: SocketAddr) -> Result<TcpListener, ListenerError> {
    let socket = if addr.is_ipv4() {
        TcpSocket::new_v4()
    } else {
        TcpSocket::new_v6()
    }
    .map_err(ListenerError::Socket)?;

    if let Err(e) = socket.set_reuseaddr(true) {
        debug!(error = %e, "setsockopt(SO_REUSEADDR) failed");
    }
    if let Err(e) = socket.set_reuseport(true) {
        debug!(error = %e, "setsockopt(SO_REUSEPORT) failed");
    }

    socket.bind(addr).map_err(ListenerError::Bind)?;
    socket.listen(LISTEN_BACKLOG).map_err(ListenerError::Listen)
}

/// Points descriptors 0, 1 and 2 at `/dev/null`.
pub fn redirect_stdio_to_null() -> io::Result<()> {
    let null = OpenOptions::new().read(true).write(true).open("/dev/null")?;

    for fd in 0..=2 {
        // SAFETY: `null` is an open descriptor for the whole loop and dup2
        // only replaces the standard descriptor numbers.
        if unsafe { libc::dup2(null.as_raw_fd(), fd) } < 0 {
            return Err(io::Error::last_os_error());
        }
    }
    Ok(())
}
