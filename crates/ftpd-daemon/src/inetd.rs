//! inetd mode: the connection arrives on standard input.
//!
//! The process serves exactly one session. The caller's shutdown sequencer
//! (holding the process-level stages) becomes the session's sequencer, so
//! one run tears down both.

use std::io;
use std::os::fd::AsFd;
use std::process;

use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;
use tracing::error;

use ftpd_core::{DaemonMode, SessionId};

use crate::session::{serve_connection, SessionEnd, SessionEnv};
use crate::shutdown::ShutdownSequencer;

/// Wraps a duplicate of descriptor 0 as a tokio stream.
pub fn stdin_stream() -> io::Result<TcpStream> {
    let fd = io::stdin().as_fd().try_clone_to_owned()?;
    let stream = std::net::TcpStream::from(fd);
    stream.set_nonblocking(true)?;
    TcpStream::from_std(stream)
}

/// Serves the single session on standard input.
pub async fn serve_inetd(
    env: &SessionEnv,
    cancel: CancellationToken,
    mut shutdown: ShutdownSequencer,
) -> SessionEnd {
    match stdin_stream() {
        Ok(stream) => serve_inetd_stream(env, stream, cancel, shutdown).await,
        Err(e) => {
            error!(
                session = %SessionId::for_process(process::id()),
                error = %e,
                "Standard input is not a usable socket"
            );
            shutdown.run();
            SessionEnd::Io(e.to_string())
        }
    }
}

/// Serves `stream` as the process's only session.
///
/// No `Connection` stage is added: the supervisor that passed the socket
/// owns it.
pub async fn serve_inetd_stream(
    env: &SessionEnv,
    stream: TcpStream,
    cancel: CancellationToken,
    shutdown: ShutdownSequencer,
) -> SessionEnd {
    let session_id = SessionId::for_process(process::id());
    serve_connection(env, stream, DaemonMode::Inetd, session_id, cancel, shutdown).await
}
