//! Log sink and subscriber setup.
//!
//! Logs go to `LOGFILE` when it is configured, otherwise to standard error.
//! The file sink can be closed at shutdown; anything logged afterwards is
//! dropped instead of failing.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};

use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset or invalid.
pub const DEFAULT_DIRECTIVES: &str = "ftpd=info,ftpd_daemon=info,ftpd_core=info";

/// Where formatted log lines are written.
#[derive(Debug, Clone, Default)]
pub struct LogSink {
    file: Option<Arc<Mutex<Option<File>>>>,
}

impl LogSink {
    /// Sink writing to standard error.
    pub fn stderr() -> Self {
        Self::default()
    }

    /// Sink appending to `path` (created if needed).
    pub fn file(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Some(Arc::new(Mutex::new(Some(file)))),
        })
    }

    /// Returns true if this sink writes to a file.
    pub fn is_file(&self) -> bool {
        self.file.is_some()
    }

    /// Flushes and closes a file sink.
    pub fn close(&self) {
        if let Some(file) = &self.file {
            if let Ok(mut guard) = file.lock() {
                if let Some(mut file) = guard.take() {
                    let _ = file.flush();
                }
            }
        }
    }
}

/// Writer handed out per log event.
pub enum LogWriter {
    Stderr(io::Stderr),
    File(Arc<Mutex<Option<File>>>),
}

impl Write for LogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Stderr(stderr) => stderr.write(buf),
            Self::File(file) => match file.lock() {
                Ok(mut guard) => match guard.as_mut() {
                    Some(file) => file.write(buf),
                    None => Ok(buf.len()),
                },
                Err(_) => Ok(buf.len()),
            },
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Stderr(stderr) => stderr.flush(),
            Self::File(file) => match file.lock() {
                Ok(mut guard) => match guard.as_mut() {
                    Some(file) => file.flush(),
                    None => Ok(()),
                },
                Err(_) => Ok(()),
            },
        }
    }
}

impl<'a> MakeWriter<'a> for LogSink {
    type Writer = LogWriter;

    fn make_writer(&'a self) -> Self::Writer {
        match &self.file {
            Some(file) => LogWriter::File(Arc::clone(file)),
            None => LogWriter::Stderr(io::stderr()),
        }
    }
}

/// Builds the event filter from `RUST_LOG`, falling back to
/// [`DEFAULT_DIRECTIVES`].
pub fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVES))
}

/// Installs the global subscriber writing to `sink`.
///
/// # Errors
///
/// Fails if a global subscriber is already installed.
pub fn init(sink: &LogSink) -> Result<(), TryInitError> {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(sink.clone())
        .with_ansi(!sink.is_file())
        .finish()
        .try_init()
}
