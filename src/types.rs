use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Family of `maa` command a step runs.
///
/// - `Startup` / `Closedown`: launch or close the game client.
/// - `Fight`: farm one or more stages (possibly compound).
/// - `Roguelike` / `Copilot`: built-in long-running modes.
/// - `Declarative`: any other task, executed through a generated task file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskKind {
    Startup,
    Closedown,
    Fight,
    Roguelike,
    Copilot,
    Declarative,
}

impl TaskKind {
    /// Map a step's `command` identifier onto its kind.
    ///
    /// Unknown identifiers are declarative tasks rather than errors.
    pub fn from_command(command_id: &str) -> Self {
        command_id.parse().unwrap_or(TaskKind::Declarative)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::Startup => "startup",
            TaskKind::Closedown => "closedown",
            TaskKind::Fight => "fight",
            TaskKind::Roguelike => "roguelike",
            TaskKind::Copilot => "copilot",
            TaskKind::Declarative => "declarative",
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "startup" => Ok(TaskKind::Startup),
            "closedown" => Ok(TaskKind::Closedown),
            "fight" => Ok(TaskKind::Fight),
            "roguelike" => Ok(TaskKind::Roguelike),
            "copilot" => Ok(TaskKind::Copilot),
            "run" | "declarative" => Ok(TaskKind::Declarative),
            other => Err(format!("unknown built-in command: {other}")),
        }
    }
}

/// Severity attached to a captured output line or state transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RecordLevel {
    Info,
    Warn,
    Error,
}

impl RecordLevel {
    /// Heuristic level for a line of program output.
    pub fn for_line(line: &str) -> Self {
        if line.contains("ERROR") {
            RecordLevel::Error
        } else if line.contains("WARN") {
            RecordLevel::Warn
        } else {
            RecordLevel::Info
        }
    }
}

impl fmt::Display for RecordLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RecordLevel::Info => "INFO",
            RecordLevel::Warn => "WARN",
            RecordLevel::Error => "ERROR",
        };
        f.write_str(s)
    }
}
