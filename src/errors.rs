// src/errors.rs

//! Crate-wide error aliases and helpers.
//!
//! [`MaaflowError`] covers configuration, IO and registration failures that
//! are reported to the caller. [`StepError`] is the per-step taxonomy the
//! flow orchestrator converts into report counters; it never escapes a flow.

use thiserror::Error;

use crate::classify::ErrorKind;

#[derive(Error, Debug)]
pub enum MaaflowError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Flow not found: {0}")]
    FlowNotFound(String),

    #[error("Invalid time of day '{0}' (expected HH:MM)")]
    InvalidTime(String),

    #[error("Task slot busy: '{0}' is already running")]
    SlotBusy(String),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    TomlSerError(#[from] toml::ser::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Why a single flow step did not succeed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StepError {
    /// The binary could not be launched at all.
    #[error("failed to launch '{program}': {reason}")]
    ProcessSpawn { program: String, reason: String },

    /// The binary ran and exited unsuccessfully.
    #[error("{kind} (exit code {exit_code})")]
    ClassifiedRuntime { kind: ErrorKind, exit_code: i32 },

    /// The process was stopped through the control interface.
    #[error("process was stopped before it finished")]
    Killed,

    /// The generated task file could not be written.
    #[error("could not write task file: {0}")]
    TaskFile(String),

    /// The game never answered the liveness check.
    #[error("game did not respond after {attempts} startup attempts")]
    StartupUnresponsive { attempts: u32 },

    /// The step definition cannot be turned into a command.
    #[error("invalid step: {0}")]
    InvalidStep(String),
}

impl StepError {
    /// Remediation hint suitable for progress messages.
    pub fn hint(&self) -> &'static str {
        match self {
            StepError::ProcessSpawn { .. } => {
                "check that the maa binary is installed and `maa_bin` points at it"
            }
            StepError::ClassifiedRuntime { kind, .. } => kind.hint(),
            StepError::Killed => "the step was stopped on request",
            StepError::TaskFile(_) => "check that the maa config directory is writable",
            StepError::StartupUnresponsive { .. } => ErrorKind::AdbFailure.hint(),
            StepError::InvalidStep(_) => "fix the step parameters in the flow configuration",
        }
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, MaaflowError>;
