// src/command/task_file.rs

//! Generated `maa` task files for declarative steps.
//!
//! The binary reads task definitions from `<config_dir>/tasks/<name>.toml`:
//!
//! ```toml
//! [[tasks]]
//! name = "Recruit"
//! type = "Recruit"
//!
//! [tasks.params]
//! refresh = true
//! times = 4
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::fs::FileSystem;

/// Parameters whose values stay strings even when they look numeric.
pub const KEEP_AS_STRING: &[&str] = &[
    "mode",
    "stage",
    "client_type",
    "theme",
    "squad",
    "core_char",
    "uri",
];

static INTEGER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[+-]?\d+$").unwrap());
static FLOAT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[+-]?\d+\.\d+$").unwrap());

/// Whole task-file document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskFile {
    pub tasks: Vec<TaskFileEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskFileEntry {
    pub name: String,
    #[serde(rename = "type")]
    pub task_type: String,
    pub params: BTreeMap<String, toml::Value>,
}

impl TaskFile {
    /// Single-task document with coerced parameters.
    pub fn single(
        name: impl Into<String>,
        task_type: impl Into<String>,
        params: &BTreeMap<String, toml::Value>,
    ) -> Self {
        let params = params
            .iter()
            .map(|(k, v)| (k.clone(), coerce_param(k, v)))
            .collect();

        Self {
            tasks: vec![TaskFileEntry {
                name: name.into(),
                task_type: task_type.into(),
                params,
            }],
        }
    }

    pub fn render(&self) -> std::result::Result<String, toml::ser::Error> {
        toml::to_string(self)
    }
}

/// A malformed value met while building a task file. Never fatal: the value
/// is passed through as a plain string.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("cannot parse '{value}' for parameter '{key}' as an array: {reason}")]
pub struct ConfigBuildError {
    pub key: String,
    pub value: String,
    pub reason: String,
}

#[derive(Deserialize)]
struct ArrayLiteral {
    v: toml::Value,
}

/// Coerce a user-supplied parameter into the type `maa` expects.
///
/// - numeric-looking strings become integers or floats, except for keys in
///   [`KEEP_AS_STRING`];
/// - `"true"` / `"false"` become booleans;
/// - bracketed strings are parsed as literal arrays.
pub fn coerce_param(key: &str, value: &toml::Value) -> toml::Value {
    match value {
        toml::Value::String(s) => coerce_string(key, s),
        toml::Value::Array(items) => {
            toml::Value::Array(items.iter().map(|v| coerce_param(key, v)).collect())
        }
        toml::Value::Table(table) => toml::Value::Table(
            table
                .iter()
                .map(|(k, v)| (k.clone(), coerce_param(k, v)))
                .collect(),
        ),
        other => other.clone(),
    }
}

fn coerce_string(key: &str, raw: &str) -> toml::Value {
    if KEEP_AS_STRING.contains(&key) {
        return toml::Value::String(raw.to_string());
    }

    let s = raw.trim();

    if s.starts_with('[') && s.ends_with(']') {
        return match parse_array_literal(key, s) {
            Ok(array) => array,
            Err(err) => {
                warn!(error = %err, "passing malformed array through as a string");
                toml::Value::String(raw.to_string())
            }
        };
    }

    match s {
        "true" => return toml::Value::Boolean(true),
        "false" => return toml::Value::Boolean(false),
        _ => {}
    }

    if INTEGER_RE.is_match(s) {
        if let Ok(n) = s.parse::<i64>() {
            return toml::Value::Integer(n);
        }
    }
    if FLOAT_RE.is_match(s) {
        if let Ok(f) = s.parse::<f64>() {
            return toml::Value::Float(f);
        }
    }

    toml::Value::String(raw.to_string())
}

/// Parse `"[1, 2, \"x\"]"` as a TOML array literal.
pub fn parse_array_literal(
    key: &str,
    literal: &str,
) -> std::result::Result<toml::Value, ConfigBuildError> {
    let fail = |reason: String| ConfigBuildError {
        key: key.to_string(),
        value: literal.to_string(),
        reason,
    };

    let parsed: ArrayLiteral = toml::from_str(&format!("v = {literal}"))
        .map_err(|e| fail(e.to_string().trim().to_string()))?;

    match parsed.v {
        toml::Value::Array(items) => Ok(toml::Value::Array(
            items.iter().map(|v| coerce_param(key, v)).collect(),
        )),
        other => Err(fail(format!("expected an array, got {}", other.type_str()))),
    }
}

/// A task file written to disk for one step run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaterializedTask {
    pub path: PathBuf,
    /// Name passed to `maa run`.
    pub stem: String,
}

/// Write `file` under `<config_dir>/tasks/` with a unique name.
pub fn write_task_file(
    fs: &dyn FileSystem,
    config_dir: &Path,
    file: &TaskFile,
) -> Result<MaterializedTask> {
    let stem = format!("maaflow-{}", Uuid::new_v4().simple());
    let path = config_dir.join("tasks").join(format!("{stem}.toml"));

    let contents = file.render().context("serializing task file")?;
    fs.write(&path, contents.as_bytes())
        .with_context(|| format!("writing task file {:?}", path))?;

    debug!(path = ?path, "wrote task file");
    Ok(MaterializedTask { path, stem })
}

/// Remove a generated task file. Failures are logged, never returned.
pub fn remove_task_file(fs: &dyn FileSystem, task: &MaterializedTask) {
    if let Err(e) = fs.remove_file(&task.path) {
        warn!(path = ?task.path, error = %e, "could not remove generated task file");
    }
}
