//! Ordered, run-once teardown of session and process resources.
//!
//! Every resource registers its closing step when (and only when) it has
//! been initialised. [`ShutdownSequencer::run`] executes the registered
//! steps in [`Stage`] order exactly once; further calls, and the `Drop`
//! impl, do nothing. Every exit path of a session or of the process ends
//! up here: normal end of input, a watchdog kick, a termination request,
//! an early return or an unwinding panic.
//!
//! # Panic-Free Guarantees
//!
//! This module follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Steps are `FnOnce` and taken out of their slot before running

use std::collections::BTreeMap;
use std::fmt;

use tracing::{debug, trace};

/// Teardown stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    /// Credential and group database handles (login collaborator)
    Credentials,
    /// Configuration subsystem
    Config,
    /// "Quitting" status line
    QuitLog,
    /// Terminal accounting record for the session
    AccountingQuit,
    /// Accounting sink
    Accounting,
    /// Log sink
    Logging,
    /// Login/auth state (login collaborator)
    Login,
    /// Working-directory tracking (cwd collaborator)
    WorkingDirectory,
    /// The connection socket, in modes that own descriptor redirection
    Connection,
}

impl Stage {
    /// Short label used in logs.
    pub fn label(self) -> &'static str {
        match self {
            Self::Credentials => "credentials",
            Self::Config => "config",
            Self::QuitLog => "quit-log",
            Self::AccountingQuit => "accounting-quit",
            Self::Accounting => "accounting",
            Self::Logging => "logging",
            Self::Login => "login",
            Self::WorkingDirectory => "cwd",
            Self::Connection => "connection",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

type Step = Box<dyn FnOnce() + Send>;

/// Run-once teardown list.
pub struct ShutdownSequencer {
    owner: String,
    steps: BTreeMap<Stage, Vec<Step>>,
    completed: bool,
}

impl ShutdownSequencer {
    /// Creates an empty sequencer. `owner` names it in logs.
    pub fn new(owner: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            steps: BTreeMap::new(),
            completed: false,
        }
    }

    /// Registers a closing step for `stage`.
    ///
    /// Steps of the same stage run in registration order. Registering after
    /// the sequencer has run executes nothing; the resource is simply
    /// dropped with the closure.
    pub fn register(&mut self, stage: Stage, step: impl FnOnce() + Send + 'static) {
        if self.completed {
            debug!(owner = %self.owner, stage = %stage, "Shutdown already ran, dropping step");
            return;
        }
        self.steps.entry(stage).or_default().push(Box::new(step));
    }

    /// Returns true if at least one step is registered for `stage`.
    pub fn is_registered(&self, stage: Stage) -> bool {
        self.steps.get(&stage).is_some_and(|steps| !steps.is_empty())
    }

    /// Returns the stages that still have pending steps, in order.
    pub fn pending(&self) -> Vec<Stage> {
        self.steps.keys().copied().collect()
    }

    /// Returns true once [`run`](Self::run) has executed.
    pub fn has_run(&self) -> bool {
        self.completed
    }

    /// Runs every registered step in stage order.
    ///
    /// Returns false if the sequencer had already run.
    pub fn run(&mut self) -> bool {
        if self.completed {
            trace!(owner = %self.owner, "Shutdown sequence already complete");
            return false;
        }
        self.completed = true;

        let steps = std::mem::take(&mut self.steps);
        debug!(owner = %self.owner, stages = steps.len(), "Running shutdown sequence");

        for (stage, steps) in steps {
            trace!(owner = %self.owner, stage = %stage, "Shutdown stage");
            for step in steps {
                step();
            }
        }
        true
    }
}

impl Drop for ShutdownSequencer {
    fn drop(&mut self) {
        self.run();
    }
}

impl fmt::Debug for ShutdownSequencer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShutdownSequencer")
            .field("owner", &self.owner)
            .field("pending", &self.pending())
            .field("completed", &self.completed)
            .finish()
    }
}
