//! Accounting records: who connected, what they sent, when they left.
//!
//! Every record is emitted on the `ftpd::accounting` tracing target. When
//! `ACCOUNTING_FILE` is configured the same record is appended to that file
//! as one JSON object per line:
//!
//! ```text
//! {"time":"2026-10-18T09:12:44.120Z","pid":4242,"session":"worker-3","event":"command","detail":"PASS ********"}
//! ```
//!
//! # Panic-Free Guarantees
//!
//! This module follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - A poisoned sink lock drops the record instead of panicking

use std::borrow::Cow;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::process;
use std::sync::{Arc, Mutex};

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use tracing::{debug, info};

use ftpd_core::SessionId;

/// Kinds of accounting records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountingEvent {
    Connect,
    Command,
    Quit,
}

impl AccountingEvent {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Connect => "connect",
            Self::Command => "command",
            Self::Quit => "quit",
        }
    }
}

#[derive(Debug, Serialize)]
struct Record<'a> {
    time: String,
    pid: u32,
    session: &'a str,
    event: AccountingEvent,
    detail: &'a str,
}

/// Shared accounting sink. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Accounting {
    file: Arc<Mutex<Option<File>>>,
    pid: u32,
}

impl Accounting {
    /// Accounting that only emits tracing records.
    pub fn disabled() -> Self {
        Self {
            file: Arc::new(Mutex::new(None)),
            pid: process::id(),
        }
    }

    /// Opens (creating if needed) `path` in append mode.
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Arc::new(Mutex::new(Some(file))),
            pid: process::id(),
        })
    }

    /// Returns true while records also go to a file.
    pub fn is_file_backed(&self) -> bool {
        self.file.lock().map(|file| file.is_some()).unwrap_or(false)
    }

    /// Records a new connection from `host`.
    pub fn connect(&self, session: &SessionId, host: &str) {
        self.record(session, AccountingEvent::Connect, host);
    }

    /// Records a command line. Passwords are masked.
    pub fn command(&self, session: &SessionId, line: &str) {
        self.record(session, AccountingEvent::Command, &mask_password(line));
    }

    /// Records the end of a session.
    pub fn quit(&self, session: &SessionId, detail: &str) {
        self.record(session, AccountingEvent::Quit, detail);
    }

    /// Emits one record.
    pub fn record(&self, session: &SessionId, event: AccountingEvent, detail: &str) {
        info!(
            target: "ftpd::accounting",
            session = %session,
            event = event.as_str(),
            detail = %detail,
            "accounting"
        );

        let Ok(mut guard) = self.file.lock() else {
            return;
        };
        let Some(file) = guard.as_mut() else {
            return;
        };

        let record = Record {
            time: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            pid: self.pid,
            session: session.as_str(),
            event,
            detail,
        };
        let written = serde_json::to_string(&record)
            .map_err(io::Error::from)
            .and_then(|line| writeln!(file, "{line}"));
        if let Err(e) = written {
            debug!(error = %e, "Failed to write accounting record");
        }
    }

    /// Flushes and closes the file sink. Later records go to tracing only.
    pub fn close(&self) {
        if let Ok(mut guard) = self.file.lock() {
            if let Some(mut file) = guard.take() {
                let _ = file.flush();
            }
        }
    }
}

/// Replaces the argument of a `PASS` command.
pub fn mask_password(line: &str) -> Cow<'_, str> {
    let verb = line.split_whitespace().next().unwrap_or("");
    if verb.eq_ignore_ascii_case("PASS") {
        Cow::Owned(format!("{verb} ********"))
    } else {
        Cow::Borrowed(line)
    }
}
