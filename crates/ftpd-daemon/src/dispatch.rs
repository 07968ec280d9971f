//! Command dispatcher seam.
//!
//! The session loop reads and accounts command lines; what a command means
//! is up to a [`CommandDispatcher`]. A [`DispatcherFactory`] builds one per
//! session and may register teardown steps (login state, working directory)
//! on the session's shutdown sequencer.
//!
//! [`BasicDispatcher`] answers `NOOP`, `SYST` and `QUIT` and rejects
//! everything else with `502`, which is enough to run the daemon end to end.

use async_trait::async_trait;

use ftpd_core::reply::{
    CLOSING_CONTROL, COMMAND_OK, NOT_IMPLEMENTED, SYNTAX_ERROR, SYSTEM_TYPE,
};
use ftpd_core::Reply;

use crate::error::ControlError;
use crate::session::{ControlChannel, SessionContext};
use crate::shutdown::ShutdownSequencer;
use crate::watchdog::WatchdogHandle;

/// What the session loop does after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// Read the next command
    Continue,
    /// End the session (the dispatcher already sent its goodbye)
    Close,
}

/// Session resources a dispatcher may use while handling one command.
pub struct SessionIo<'a> {
    pub control: &'a mut ControlChannel,
    pub watchdog: &'a WatchdogHandle,
    pub context: &'a SessionContext,
}

impl SessionIo<'_> {
    /// Sends a reply on the control channel.
    pub async fn send(&mut self, reply: &Reply) -> Result<(), ControlError> {
        self.control.send(reply).await
    }

    /// Sends a single-line reply.
    pub async fn reply(&mut self, code: u16, text: &str) -> Result<(), ControlError> {
        self.control.reply(code, text).await
    }
}

/// Interprets command lines for one session.
#[async_trait]
pub trait CommandDispatcher: Send {
    /// Handles one command line (CR/LF already stripped).
    async fn dispatch(
        &mut self,
        line: &str,
        io: &mut SessionIo<'_>,
    ) -> Result<Dispatch, ControlError>;
}

/// Builds a dispatcher for each new session.
pub trait DispatcherFactory: Send + Sync {
    fn create(
        &self,
        context: &SessionContext,
        shutdown: &mut ShutdownSequencer,
    ) -> Box<dyn CommandDispatcher>;
}

/// Minimal built-in command set.
#[derive(Debug, Default)]
pub struct BasicDispatcher;

#[async_trait]
impl CommandDispatcher for BasicDispatcher {
    async fn dispatch(
        &mut self,
        line: &str,
        io: &mut SessionIo<'_>,
    ) -> Result<Dispatch, ControlError> {
        let verb = line.split_whitespace().next().unwrap_or("").to_ascii_uppercase();

        match verb.as_str() {
            "NOOP" => io.reply(COMMAND_OK, "NOOP command successful.").await?,
            "SYST" => io.reply(SYSTEM_TYPE, "UNIX Type: L8").await?,
            "QUIT" => {
                io.reply(CLOSING_CONTROL, "Goodbye.").await?;
                return Ok(Dispatch::Close);
            }
            "" => io.reply(SYNTAX_ERROR, "Syntax error, command unrecognized.").await?,
            other => {
                io.reply(NOT_IMPLEMENTED, &format!("{other}: command not implemented."))
                    .await?
            }
        }
        Ok(Dispatch::Continue)
    }
}

/// Factory for [`BasicDispatcher`].
#[derive(Debug, Default, Clone, Copy)]
pub struct BasicDispatcherFactory;

impl DispatcherFactory for BasicDispatcherFactory {
    fn create(
        &self,
        _context: &SessionContext,
        _shutdown: &mut ShutdownSequencer,
    ) -> Box<dyn CommandDispatcher> {
        Box::new(BasicDispatcher)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::watchdog::Watchdog;
    use ftpd_core::{DaemonMode, SessionId, Settings};
    use std::time::Duration;
    use tokio::io::{duplex, AsyncBufReadExt, BufReader};

    fn context() -> SessionContext {
        SessionContext::new(
            &Settings::default(),
            DaemonMode::Inetd,
            SessionId::new("inetd-1"),
            "127.0.0.1:40000".parse().unwrap(),
            "127.0.0.1:21".parse().unwrap(),
        )
    }

    async fn run(line: &str) -> (Dispatch, String) {
        let (client, server) = duplex(1024);
        let mut control = ControlChannel::new(server);
        let watchdog = Watchdog::new(Duration::from_secs(300), Duration::from_secs(300));
        let handle = watchdog.handle();
        let context = context();

        let mut io = SessionIo {
            control: &mut control,
            watchdog: &handle,
            context: &context,
        };
        let outcome = BasicDispatcher.dispatch(line, &mut io).await.unwrap();

        let mut reply = String::new();
        BufReader::new(client).read_line(&mut reply).await.unwrap();
        (outcome, reply)
    }

    #[tokio::test]
    async fn test_noop() {
        let (outcome, reply) = run("noop").await;
        assert_eq!(outcome, Dispatch::Continue);
        assert!(reply.starts_with("200 "));
    }

    #[tokio::test]
    async fn test_syst() {
        let (_, reply) = run("SYST").await;
        assert_eq!(reply, "215 UNIX Type: L8\r\n");
    }

    #[tokio::test]
    async fn test_quit_closes() {
        let (outcome, reply) = run("QUIT").await;
        assert_eq!(outcome, Dispatch::Close);
        assert!(reply.starts_with("221 "));
    }

    #[tokio::test]
    async fn test_unknown_command() {
        let (outcome, reply) = run("RETR file.txt").await;
        assert_eq!(outcome, Dispatch::Continue);
        assert_eq!(reply, "502 RETR: command not implemented.\r\n");
    }

    #[tokio::test]
    async fn test_empty_line() {
        let (_, reply) = run("   ").await;
        assert!(reply.starts_with("500 "));
    }

    #[test]
    fn test_factory_registers_nothing() {
        let mut shutdown = ShutdownSequencer::new("test");
        let _dispatcher = BasicDispatcherFactory.create(&context(), &mut shutdown);
        assert!(shutdown.pending().is_empty());
    }
}
