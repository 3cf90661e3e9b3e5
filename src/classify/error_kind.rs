// src/classify/error_kind.rs

use std::fmt;
use std::sync::LazyLock;

use serde::Serialize;

use crate::classify::rules::RuleTable;

/// Failure category inferred from the output of a failed run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    CopilotFailure,
    AdbFailure,
    Timeout,
    ResourceMissing,
    Generic,
}

impl ErrorKind {
    pub fn label(&self) -> &'static str {
        match self {
            ErrorKind::CopilotFailure => "copilot task failed",
            ErrorKind::AdbFailure => "could not reach the device over adb",
            ErrorKind::Timeout => "operation timed out",
            ErrorKind::ResourceMissing => "game resources are missing",
            ErrorKind::Generic => "task failed",
        }
    }

    /// What the user can do about it.
    pub fn hint(&self) -> &'static str {
        match self {
            ErrorKind::CopilotFailure => {
                "check the copilot file or code and that the required operators are owned"
            }
            ErrorKind::AdbFailure => {
                "make sure the emulator is running and the adb address is correct"
            }
            ErrorKind::Timeout => "the game may be stuck or slow; retry or restart the emulator",
            ErrorKind::ResourceMissing => "update maa resources (`maa update` / `maa hot-update`)",
            ErrorKind::Generic => "inspect the task log for details",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

static ERROR_RULES: LazyLock<RuleTable<ErrorKind>> = LazyLock::new(|| {
    RuleTable::new(&[
        (r"(?i)copilot|作业", ErrorKind::CopilotFailure),
        (
            r"(?i)\badb\b|connect(ion)?\s+failed|failed\s+to\s+connect|connectfailed|device\s+(offline|not\s+found)|unauthorized",
            ErrorKind::AdbFailure,
        ),
        (r"(?i)timed?\s*out|timeout|超时", ErrorKind::Timeout),
        (
            r"(?i)resource\S*\s+(not\s+found|missing)|failed\s+to\s+load\s+resource|no\s+such\s+file|资源",
            ErrorKind::ResourceMissing,
        ),
    ])
});

/// Classify the captured output of a failed run.
pub fn classify_error(text: &str) -> ErrorKind {
    ERROR_RULES.first_match(text).unwrap_or(ErrorKind::Generic)
}
