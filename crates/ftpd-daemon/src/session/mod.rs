//! Session loop - one FTP control connection from greeting to teardown.
//!
//! ```text
//!   greeting
//!      │
//!      ▼
//!  ┌──────────────┐  arm control  ┌───────────────────────────────────┐
//!  │  loop        │──────────────▶│ select!                           │
//!  │              │◀──────────────│  cancel     → Terminated          │
//!  └──────────────┘   Continue    │  watchdog   → 421, Timeout(kind)  │
//!                                 │  read line  → account → dispatch  │
//!                                 └───────────────────────────────────┘
//! ```
//!
//! Whatever ends the loop, the session's [`ShutdownSequencer`] runs exactly
//! once before [`Session::run`] returns (or when the session is dropped).
//!
//! # Panic-Free Guarantees
//!
//! This module follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Write failures while reporting a termination are logged, not raised

mod context;
mod control;
mod greeting;

pub use context::SessionContext;
pub use control::{ControlChannel, ReadLine, MAX_COMMAND_LINE};
pub use greeting::{build_greeting, send_greeting};

use std::fmt;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;

use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use ftpd_core::reply::{SERVICE_UNAVAILABLE, SYNTAX_ERROR};
use ftpd_core::{DaemonMode, Reply, SessionId, Settings};

use crate::accounting::Accounting;
use crate::dispatch::{CommandDispatcher, Dispatch, DispatcherFactory, SessionIo};
use crate::error::ControlError;
use crate::resolve::reverse_lookup;
use crate::shutdown::{ShutdownSequencer, Stage};
use crate::sockopt::prepare_control_socket;
use crate::watchdog::{trip, TimeoutKind, Watchdog, WatchdogArmed, WatchdogHandle};

// ============================================================================
// Session End
// ============================================================================

/// Why a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEnd {
    /// End of input on the control connection
    PeerClosed,
    /// The dispatcher closed the session (QUIT)
    Quit,
    /// The watchdog fired
    Timeout(TimeoutKind),
    /// A termination request was observed
    Terminated,
    /// The control connection failed
    Io(String),
    /// The peer address could not be determined
    PeerAddressUnavailable,
}

impl fmt::Display for SessionEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PeerClosed => write!(f, "peer closed connection"),
            Self::Quit => write!(f, "client quit"),
            Self::Timeout(kind) => write!(f, "{kind}"),
            Self::Terminated => write!(f, "terminated"),
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::PeerAddressUnavailable => write!(f, "peer address unavailable"),
        }
    }
}

impl From<ControlError> for SessionEnd {
    fn from(err: ControlError) -> Self {
        Self::Io(err.to_string())
    }
}

// ============================================================================
// Session Environment
// ============================================================================

/// Process-wide pieces every session uses. Cheap to clone.
#[derive(Clone)]
pub struct SessionEnv {
    pub settings: Arc<Settings>,
    pub accounting: Accounting,
    pub dispatchers: Arc<dyn DispatcherFactory>,
}

impl SessionEnv {
    pub fn new(
        settings: Settings,
        accounting: Accounting,
        dispatchers: Arc<dyn DispatcherFactory>,
    ) -> Self {
        Self {
            settings: Arc::new(settings),
            accounting,
            dispatchers,
        }
    }
}

impl fmt::Debug for SessionEnv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionEnv")
            .field("settings", &self.settings)
            .field("accounting", &self.accounting)
            .finish_non_exhaustive()
    }
}

/// Sets up and runs a session on an accepted TCP connection.
///
/// Looks up the peer (421 and end if that fails), applies the control
/// socket options, optionally resolves the peer name, then runs the loop.
pub async fn serve_connection(
    env: &SessionEnv,
    stream: TcpStream,
    mode: DaemonMode,
    session_id: SessionId,
    cancel: CancellationToken,
    mut shutdown: ShutdownSequencer,
) -> SessionEnd {
    let peer = match stream.peer_addr() {
        Ok(peer) => peer,
        Err(e) => {
            error!(session = %session_id, error = %e, "Could not get peer IP address");
            let mut control = ControlChannel::new(stream);
            let reply = Reply::multiline(
                SERVICE_UNAVAILABLE,
                ["Could not get peer IP address.".to_string(), format!("{e}.")],
            );
            if let Err(e) = control.send(&reply).await {
                debug!(session = %session_id, error = %e, "Failed to send 421");
            }
            shutdown.run();
            return SessionEnd::PeerAddressUnavailable;
        }
    };
    let local = stream
        .local_addr()
        .unwrap_or_else(|_| SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0)));

    prepare_control_socket(&stream);

    let mut context = SessionContext::new(&env.settings, mode, session_id, peer, local);
    if env.settings.resolve_client_ip {
        if let Some(host) = reverse_lookup(peer.ip()).await {
            context = context.with_remote_host(host);
        }
    }

    Session::new(env, context, ControlChannel::new(stream), cancel, shutdown)
        .run()
        .await
}

// ============================================================================
// Session
// ============================================================================

enum Step {
    Continue,
    End(SessionEnd),
    Expired(WatchdogArmed),
}

/// One control connection.
pub struct Session {
    context: SessionContext,
    control: ControlChannel,
    watchdog: Watchdog,
    dispatcher: Box<dyn CommandDispatcher>,
    accounting: Accounting,
    cancel: CancellationToken,
    hello_string: String,
    motd: Option<PathBuf>,
    shutdown: ShutdownSequencer,
}

impl Session {
    /// Creates a session. The dispatcher is built here so it can register
    /// its teardown steps on `shutdown`.
    pub fn new(
        env: &SessionEnv,
        context: SessionContext,
        control: ControlChannel,
        cancel: CancellationToken,
        mut shutdown: ShutdownSequencer,
    ) -> Self {
        let watchdog = Watchdog::new(context.control_timeout, context.data_timeout);
        let dispatcher = env.dispatchers.create(&context, &mut shutdown);

        Self {
            context,
            control,
            watchdog,
            dispatcher,
            accounting: env.accounting.clone(),
            cancel,
            hello_string: env.settings.hello_string.clone(),
            motd: env.settings.motd_global.clone(),
            shutdown,
        }
    }

    /// Returns the session context.
    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    /// Runs the session to its end, then runs the shutdown sequence.
    pub async fn run(mut self) -> SessionEnd {
        let id = self.context.session_id.clone();
        let host = self.context.remote_host.clone();

        info!(session = %id, peer = %self.context.peer, "Incoming connection from {host}");
        self.accounting.connect(&id, &host);
        self.register_teardown();

        let end = self.serve().await;
        self.watchdog.handle().disarm();

        if let Err(e) = self.control.shutdown().await {
            debug!(session = %id, error = %e, "Control connection already closed");
        }

        match &end {
            SessionEnd::Io(e) => warn!(session = %id, error = %e, "Session ended"),
            other => debug!(session = %id, end = %other, "Session ended"),
        }

        self.shutdown.run();
        end
    }

    fn register_teardown(&mut self) {
        let id = self.context.session_id.clone();
        let host = self.context.remote_host.clone();
        self.shutdown.register(Stage::QuitLog, {
            let id = id.clone();
            let host = host.clone();
            move || info!(session = %id, host = %host, "Quitting")
        });

        let accounting = self.accounting.clone();
        self.shutdown
            .register(Stage::AccountingQuit, move || accounting.quit(&id, &host));
    }

    async fn serve(&mut self) -> SessionEnd {
        if let Err(e) = send_greeting(
            &mut self.control,
            &self.hello_string,
            self.motd.as_deref(),
            &self.context,
        )
        .await
        {
            return e.into();
        }

        let handle = self.watchdog.handle();

        loop {
            handle.arm_control();

            let step = tokio::select! {
                biased;

                _ = self.cancel.cancelled() => Step::End(SessionEnd::Terminated),

                armed = self.watchdog.expired() => Step::Expired(armed),

                result = Self::serve_one(
                    &mut self.control,
                    self.dispatcher.as_mut(),
                    &handle,
                    &self.context,
                    &self.accounting,
                ) => match result {
                    Ok(Some(Dispatch::Continue)) => Step::Continue,
                    Ok(Some(Dispatch::Close)) => Step::End(SessionEnd::Quit),
                    Ok(None) => Step::End(SessionEnd::PeerClosed),
                    Err(e) => Step::End(e.into()),
                },
            };

            match step {
                Step::Continue => {}
                Step::End(end) => return end,
                Step::Expired(armed) => return self.kick(trip(armed)).await,
            }
        }
    }

    /// Reads and handles one command line. `Ok(None)` is end of input.
    async fn serve_one(
        control: &mut ControlChannel,
        dispatcher: &mut dyn CommandDispatcher,
        watchdog: &WatchdogHandle,
        context: &SessionContext,
        accounting: &Accounting,
    ) -> Result<Option<Dispatch>, ControlError> {
        let line = match control.read_line().await? {
            ReadLine::Eof => return Ok(None),
            ReadLine::TooLong => {
                watchdog.arm_control();
                control.reply(SYNTAX_ERROR, "Command line too long.").await?;
                return Ok(Some(Dispatch::Continue));
            }
            ReadLine::Line(line) => line,
        };

        watchdog.arm_control();
        accounting.command(&context.session_id, &line);

        let mut io = SessionIo {
            control,
            watchdog,
            context,
        };
        dispatcher.dispatch(&line, &mut io).await.map(Some)
    }

    async fn kick(&mut self, kind: TimeoutKind) -> SessionEnd {
        warn!(
            session = %self.context.session_id,
            host = %self.context.remote_host,
            "{}",
            kind.message()
        );
        if let Err(e) = self.control.reply(SERVICE_UNAVAILABLE, kind.message()).await {
            debug!(session = %self.context.session_id, error = %e, "Failed to send 421");
        }
        SessionEnd::Timeout(kind)
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("context", &self.context)
            .field("shutdown", &self.shutdown)
            .finish_non_exhaustive()
    }
}
