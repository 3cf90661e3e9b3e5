// src/command/stages.rs

//! Compound fight stage specifications: `stage[:times],stage[:times],...`.

use std::fmt;

use tracing::warn;

/// One stage of a (possibly compound) fight step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageEntry {
    pub stage_code: String,
    /// Run count as written by the user; `None` means "until exhausted".
    pub run_count: Option<String>,
}

impl StageEntry {
    pub fn new(stage_code: impl Into<String>, run_count: Option<String>) -> Self {
        Self {
            stage_code: stage_code.into(),
            run_count,
        }
    }
}

impl fmt::Display for StageEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.run_count {
            Some(times) => write!(f, "{}:{}", self.stage_code, times),
            None => f.write_str(&self.stage_code),
        }
    }
}

/// Parse `"1-7:3, CE-6"` into stage entries. Empty segments are ignored.
pub fn parse_stage_spec(spec: &str) -> Vec<StageEntry> {
    spec.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|segment| match segment.split_once(':') {
            Some((stage, times)) => {
                let times = times.trim();
                StageEntry::new(
                    stage.trim(),
                    (!times.is_empty()).then(|| times.to_string()),
                )
            }
            None => StageEntry::new(segment, None),
        })
        .collect()
}

pub fn format_stage_spec(entries: &[StageEntry]) -> String {
    entries
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

/// Read the stage list of a fight step.
///
/// Accepts a single stage string (which may itself be a compound spec), an
/// array of stage strings, or an array of `{ stage, times }` tables. A
/// top-level `times` parameter applies to a single stage that has no count of
/// its own.
pub fn stages_from_params(
    stage: Option<&toml::Value>,
    times: Option<&toml::Value>,
) -> Vec<StageEntry> {
    let mut entries = match stage {
        Some(toml::Value::String(spec)) => parse_stage_spec(spec),
        Some(toml::Value::Array(items)) => items.iter().filter_map(entry_from_value).collect(),
        Some(other) => {
            warn!(value = %other, "unsupported `stage` parameter; expected string or array");
            Vec::new()
        }
        None => Vec::new(),
    };

    if let ([only], Some(times)) = (entries.as_mut_slice(), times) {
        if only.run_count.is_none() {
            only.run_count = value_to_count(times);
        }
    }

    entries
}

fn entry_from_value(value: &toml::Value) -> Option<StageEntry> {
    match value {
        toml::Value::String(s) => parse_stage_spec(s).into_iter().next(),
        toml::Value::Table(table) => {
            let stage = table.get("stage").and_then(|v| v.as_str())?.trim();
            if stage.is_empty() {
                return None;
            }
            let times = table.get("times").and_then(value_to_count);
            Some(StageEntry::new(stage, times))
        }
        other => {
            warn!(value = %other, "ignoring unsupported stage entry");
            None
        }
    }
}

fn value_to_count(value: &toml::Value) -> Option<String> {
    match value {
        toml::Value::Integer(n) => Some(n.to_string()),
        toml::Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    }
}
