// src/command/builder.rs

//! Pure mapping from a [`TaskDescriptor`] to `maa` arguments.

use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;

use crate::command::stages::{format_stage_spec, stages_from_params, StageEntry};
use crate::command::task_file::TaskFile;
use crate::config::TaskDescriptor;
use crate::types::TaskKind;

const DEFAULT_CLIENT: &str = "Official";
const DEFAULT_ROGUELIKE_THEME: &str = "Phantom";

/// Arguments for one invocation of the binary (program name excluded).
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltCommand {
    /// `maa` subcommand (`startup`, `fight`, `run`, ...).
    pub command: String,
    pub args: Vec<String>,
    /// Task file that must be written before running, for declarative steps.
    /// Its generated name is appended to the arguments.
    pub inline_config: Option<TaskFile>,
}

impl BuiltCommand {
    fn new(command: &str, args: Vec<String>) -> Self {
        Self {
            command: command.to_string(),
            args,
            inline_config: None,
        }
    }

    /// Full argument vector, with `task_stem` appended when a task file was
    /// generated for this command.
    pub fn argv(&self, task_stem: Option<&str>) -> Vec<String> {
        let mut argv = Vec::with_capacity(self.args.len() + 2);
        argv.push(self.command.clone());
        argv.extend(self.args.iter().cloned());
        if let Some(stem) = task_stem {
            argv.push(stem.to_string());
        }
        argv
    }
}

impl fmt::Display for BuiltCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut argv = self.argv(None);
        if self.inline_config.is_some() {
            argv.push("<generated task file>".to_string());
        }
        f.write_str(&argv.join(" "))
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BuildError {
    #[error("`{command}` step is missing required parameter `{param}`")]
    MissingParam {
        command: &'static str,
        param: &'static str,
    },
}

/// Build the command for a whole step.
///
/// For fight steps with several stages the stage list is serialized as
/// `stage[:times],...`; the orchestrator runs those stages one at a time via
/// [`build_stage`].
pub fn build(task: &TaskDescriptor) -> Result<BuiltCommand, BuildError> {
    let params = &task.params;

    match task.kind() {
        TaskKind::Startup => Ok(build_client_command("startup", params)),
        TaskKind::Closedown => Ok(build_client_command("closedown", params)),
        TaskKind::Fight => {
            let entries = stages_from_params(params.get("stage"), params.get("times"));
            if entries.is_empty() {
                return Err(BuildError::MissingParam {
                    command: "fight",
                    param: "stage",
                });
            }
            let mut args = vec![format_stage_spec(&entries)];
            args.extend(fight_flags(params));
            Ok(BuiltCommand::new("fight", args))
        }
        TaskKind::Roguelike => {
            let theme = task.param_str("theme").unwrap_or(DEFAULT_ROGUELIKE_THEME);
            let mut args = vec![theme.to_string()];
            for (key, flag) in [
                ("mode", "--mode"),
                ("squad", "--squad"),
                ("core_char", "--core-char"),
                ("start_count", "--start-count"),
            ] {
                if let Some(value) = params.get(key).and_then(scalar_to_arg) {
                    args.push(flag.to_string());
                    args.push(value);
                }
            }
            Ok(BuiltCommand::new("roguelike", args))
        }
        TaskKind::Copilot => {
            let uri = task.param_str("uri").ok_or(BuildError::MissingParam {
                command: "copilot",
                param: "uri",
            })?;
            Ok(BuiltCommand::new("copilot", vec![uri.to_string()]))
        }
        TaskKind::Declarative => Ok(build_declarative(task)),
    }
}

/// Build the command for one stage of a fight step.
pub fn build_stage(task: &TaskDescriptor, stage: &StageEntry) -> BuiltCommand {
    let mut args = vec![stage.stage_code.clone()];
    if let Some(times) = &stage.run_count {
        args.push("--times".to_string());
        args.push(times.clone());
    }
    args.extend(fight_flags(&task.params));
    BuiltCommand::new("fight", args)
}

fn build_client_command(command: &str, params: &BTreeMap<String, toml::Value>) -> BuiltCommand {
    let client = params
        .get("client")
        .and_then(|v| v.as_str())
        .unwrap_or(DEFAULT_CLIENT);
    let mut args = vec![client.to_string()];

    if command == "startup" {
        if let Some(address) = params.get("address").and_then(|v| v.as_str()) {
            args.push("-a".to_string());
            args.push(address.to_string());
        }
    }

    BuiltCommand::new(command, args)
}

/// `run <task>` for existing task files, or a generated task file otherwise.
fn build_declarative(task: &TaskDescriptor) -> BuiltCommand {
    if task.command_id == "run" {
        if let Some(existing) = task.param_str("task") {
            return BuiltCommand::new("run", vec![existing.to_string()]);
        }
    }

    let task_type = match (&task.task_type, task.command_id.as_str()) {
        (Some(t), _) => t.clone(),
        (None, "run") => task.name.clone(),
        (None, other) => other.to_string(),
    };

    BuiltCommand {
        command: "run".to_string(),
        args: Vec::new(),
        inline_config: Some(TaskFile::single(&task.name, task_type, &task.params)),
    }
}

/// Medicine, stone and series flags, only when set to a non-default value.
fn fight_flags(params: &BTreeMap<String, toml::Value>) -> Vec<String> {
    let mut flags = Vec::new();

    for (key, flag, default) in [
        ("medicine", "-m", 0),
        ("stone", "--stone", 0),
        ("series", "--series", 1),
    ] {
        if let Some(n) = int_param(params, key) {
            if n != default {
                flags.push(flag.to_string());
                flags.push(n.to_string());
            }
        }
    }

    flags
}

fn int_param(params: &BTreeMap<String, toml::Value>, key: &str) -> Option<i64> {
    match params.get(key)? {
        toml::Value::Integer(n) => Some(*n),
        toml::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn scalar_to_arg(value: &toml::Value) -> Option<String> {
    match value {
        toml::Value::String(s) => Some(s.clone()),
        toml::Value::Integer(n) => Some(n.to_string()),
        toml::Value::Float(f) => Some(f.to_string()),
        toml::Value::Boolean(b) => Some(b.to_string()),
        _ => None,
    }
}
