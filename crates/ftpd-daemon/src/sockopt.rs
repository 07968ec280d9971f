//! Socket options the std/tokio types don't expose.

use std::io;
use std::mem;
use std::os::fd::AsRawFd;

use tracing::debug;

/// Sets a boolean socket option to on.
pub fn enable(socket: &impl AsRawFd, level: libc::c_int, name: libc::c_int) -> io::Result<()> {
    let on: libc::c_int = 1;
    // SAFETY: the descriptor is open for the duration of the borrow and the
    // option value points to a live c_int of the size passed.
    let rc = unsafe {
        libc::setsockopt(
            socket.as_raw_fd(),
            level,
            name,
            (&on as *const libc::c_int).cast(),
            mem::size_of::<libc::c_int>() as libc::socklen_t,
        )
    };
    if rc == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}

/// Enables keepalive and inline urgent data on a control connection.
///
/// Best effort: failures are logged at debug level and ignored.
pub fn prepare_control_socket(socket: &impl AsRawFd) {
    if let Err(e) = enable(socket, libc::SOL_SOCKET, libc::SO_KEEPALIVE) {
        debug!(error = %e, "setsockopt(SO_KEEPALIVE) failed");
    }
    if let Err(e) = enable(socket, libc::SOL_SOCKET, libc::SO_OOBINLINE) {
        debug!(error = %e, "setsockopt(SO_OOBINLINE) failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::net::{TcpListener, TcpStream};

    #[test]
    fn test_enable_on_socket() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let stream = TcpStream::connect(listener.local_addr().unwrap()).unwrap();

        enable(&stream, libc::SOL_SOCKET, libc::SO_KEEPALIVE).unwrap();
        prepare_control_socket(&stream);
    }

    #[test]
    fn test_enable_on_non_socket_fails() {
        let file = File::open("/dev/null").unwrap();
        assert!(enable(&file, libc::SOL_SOCKET, libc::SO_KEEPALIVE).is_err());

        // Never fails loudly
        prepare_control_socket(&file);
    }
}
