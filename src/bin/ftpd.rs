//! ftpd - FTP daemon
//!
//! # Usage
//!
//! ```bash
//! # Started by inetd/xinetd/systemd socket activation (default)
//! ftpd -i
//!
//! # Detach and listen
//! ftpd -d -c /etc/ftpd/ftpd.toml
//!
//! # Listen in the foreground
//! ftpd -D
//!
//! # Enable debug logging
//! RUST_LOG=ftpd_daemon=debug ftpd -D
//! ```
//!
//! # Signal Handling
//!
//! - SIGTERM/SIGINT: stop accepting, let sessions end, then exit 0

use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use ftpd_core::{Config, DaemonMode, Settings, DEFAULT_CONFIG_PATH, VERSION};
use ftpd_daemon::accounting::Accounting;
use ftpd_daemon::dispatch::BasicDispatcherFactory;
use ftpd_daemon::inetd::serve_inetd;
use ftpd_daemon::listener::{bind_listener, detach, redirect_stdio_to_null};
use ftpd_daemon::logging::{self, LogSink};
use ftpd_daemon::registry::spawn_registry;
use ftpd_daemon::server::FtpServer;
use ftpd_daemon::session::SessionEnv;
use ftpd_daemon::shutdown::{ShutdownSequencer, Stage};

/// FTP daemon
#[derive(Parser, Debug)]
#[command(name = "ftpd", version, about)]
#[command(group(clap::ArgGroup::new("mode").multiple(false)))]
struct Args {
    /// Serve one connection on standard input (default)
    #[arg(short = 'i', long, group = "mode")]
    inetd: bool,

    /// Detach from the terminal and listen
    #[arg(short = 'd', long, group = "mode")]
    daemon: bool,

    /// Listen without detaching
    #[arg(short = 'D', long, group = "mode")]
    foreground: bool,

    /// Configuration file
    #[arg(short = 'c', long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Run without a configuration file
    #[arg(short = 'n', long, conflicts_with = "config")]
    no_config: bool,
}

impl Args {
    fn mode(&self) -> DaemonMode {
        if self.daemon {
            DaemonMode::ForkDaemon
        } else if self.foreground {
            DaemonMode::ForegroundDaemon
        } else {
            DaemonMode::Inetd
        }
    }
}

fn main() {
    let args = Args::parse();
    let mode = args.mode();

    let (config, settings) = match load_settings(&args) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("ftpd: {e:#}");
            process::exit(1);
        }
    };

    if mode.detaches() {
        // Daemonize before starting tokio runtime
        if let Err(e) = detach() {
            eprintln!("ftpd: {e}");
            process::exit(1);
        }
    }

    match run(mode, config, settings) {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("ftpd: {e:#}");
            process::exit(1);
        }
    }
}

/// Reads the configuration selected on the command line.
///
/// A missing file at the default location is not an error; the defaults
/// apply. An explicit `-c` path must exist.
fn load_settings(args: &Args) -> Result<(Config, Settings)> {
    let config = if args.no_config {
        Config::empty()
    } else if let Some(path) = &args.config {
        Config::load(path)?
    } else {
        let default = Path::new(DEFAULT_CONFIG_PATH);
        if default.exists() {
            Config::load(default)?
        } else {
            Config::empty()
        }
    };

    let settings = Settings::from_config(&config)?;
    Ok((config, settings))
}

/// Runs the daemon (async entry point). Returns the exit status.
#[tokio::main]
async fn run(mode: DaemonMode, config: Config, settings: Settings) -> Result<i32> {
    let log_sink = match &settings.log_file {
        Some(path) => LogSink::file(path)
            .with_context(|| format!("Failed to open log file {}", path.display()))?,
        None => LogSink::stderr(),
    };
    logging::init(&log_sink).context("Failed to initialize logging")?;

    info!(
        version = VERSION,
        pid = process::id(),
        mode = %mode,
        "ftpd starting"
    );

    let accounting = match &settings.accounting_file {
        Some(path) => Accounting::open(path)
            .with_context(|| format!("Failed to open accounting file {}", path.display()))?,
        None => Accounting::disabled(),
    };

    let mut process_shutdown = ShutdownSequencer::new("process");
    process_shutdown.register(Stage::Config, move || {
        debug!(source = ?config.source(), options = config.len(), "Configuration released");
    });
    process_shutdown.register(Stage::Accounting, {
        let accounting = accounting.clone();
        move || accounting.close()
    });
    process_shutdown.register(Stage::Logging, {
        let log_sink = log_sink.clone();
        move || log_sink.close()
    });

    // Create cancellation token for graceful shutdown
    let cancel_token = CancellationToken::new();

    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        if let Err(e) = wait_for_shutdown_signal().await {
            error!(error = %e, "Error waiting for shutdown signal");
            return;
        }
        info!("Shutdown signal received");
        shutdown_token.cancel();
    });

    let env = SessionEnv::new(
        settings.clone(),
        accounting,
        Arc::new(BasicDispatcherFactory),
    );

    if !mode.is_listener() {
        let end = serve_inetd(&env, cancel_token, process_shutdown).await;
        debug!(end = %end, "inetd session finished");
        return Ok(0);
    }

    let addr = settings.listen.socket_addr();
    let listener = match bind_listener(addr) {
        Ok(listener) => listener,
        Err(e) => {
            error!(addr = %addr, error = %e, "Could not listen");
            eprintln!("{e}");
            return Ok(1);
        }
    };
    info!(addr = %addr, "Listening");

    if let Err(e) = redirect_stdio_to_null() {
        debug!(error = %e, "Could not redirect standard descriptors");
    }

    let registry = spawn_registry();
    FtpServer::new(listener, env, registry, mode, cancel_token)
        .run()
        .await;

    info!("ftpd stopped");
    process_shutdown.run();
    Ok(0)
}

/// Waits for a shutdown signal (SIGTERM or SIGINT).
async fn wait_for_shutdown_signal() -> Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    tokio::select! {
        _ = sigterm.recv() => {
            info!("Received SIGTERM");
        }
        _ = sigint.recv() => {
            info!("Received SIGINT");
        }
    }

    Ok(())
}
