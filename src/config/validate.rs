// src/config/validate.rs

use std::collections::{BTreeMap, HashSet};
use std::time::Duration;

use crate::config::model::{
    ConfigFile, FlowConfig, FlowDefinition, FlowTimings, RawConfigFile, TimingsSection,
};
use crate::errors::{MaaflowError, Result};
use crate::trigger::TimeOfDay;

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = MaaflowError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        ensure_has_flows(&raw)?;
        validate_global_config(&raw)?;
        let timings = parse_timings(&raw.config.timings)?;

        let mut flows = BTreeMap::new();
        for (id, flow) in raw.flow {
            let def = validate_flow(&id, flow)?;
            flows.insert(id, def);
        }

        Ok(ConfigFile::new_unchecked(raw.config, timings, flows))
    }
}

fn ensure_has_flows(cfg: &RawConfigFile) -> Result<()> {
    if cfg.flow.is_empty() {
        return Err(MaaflowError::ConfigError(
            "config must contain at least one [flow.<id>] section".to_string(),
        ));
    }
    Ok(())
}

fn validate_global_config(cfg: &RawConfigFile) -> Result<()> {
    if cfg.config.maa_bin.trim().is_empty() {
        return Err(MaaflowError::ConfigError(
            "[config].maa_bin must not be empty".to_string(),
        ));
    }

    if cfg.config.log_buffer_capacity == 0 {
        return Err(MaaflowError::ConfigError(
            "[config].log_buffer_capacity must be >= 1 (got 0)".to_string(),
        ));
    }

    Ok(())
}

fn parse_timings(section: &TimingsSection) -> Result<FlowTimings> {
    let field = |name: &str, value: &str| {
        parse_duration(value).map_err(|e| {
            MaaflowError::ConfigError(format!("[config.timings].{name}: {e}"))
        })
    };

    Ok(FlowTimings {
        startup_wait: field("startup_wait", &section.startup_wait)?,
        startup_retry_backoff: field("startup_retry_backoff", &section.startup_retry_backoff)?,
        startup_retries: section.startup_retries,
        stage_pause: field("stage_pause", &section.stage_pause)?,
        kill_grace: field("kill_grace", &section.kill_grace)?,
        log_retention: field("log_retention", &section.log_retention)?,
    })
}

fn validate_flow(id: &str, flow: FlowConfig) -> Result<FlowDefinition> {
    let mut times = Vec::with_capacity(flow.times.len());
    for raw in &flow.times {
        let time: TimeOfDay = raw.parse().map_err(|_| {
            MaaflowError::ConfigError(format!(
                "flow '{id}' has invalid time '{raw}' (expected HH:MM)"
            ))
        })?;
        times.push(time);
    }

    let mut seen = HashSet::new();
    for task in &flow.task {
        if task.command_id.trim().is_empty() {
            return Err(MaaflowError::ConfigError(format!(
                "flow '{id}' step '{}' has an empty command",
                task.id
            )));
        }
        if !seen.insert(task.id.as_str()) {
            return Err(MaaflowError::ConfigError(format!(
                "flow '{id}' has duplicate step id '{}'",
                task.id
            )));
        }
    }

    Ok(FlowDefinition {
        id: id.to_string(),
        name: flow.name.unwrap_or_else(|| id.to_string()),
        times,
        tasks: flow.task,
    })
}

/// Parse a duration string like `"15s"`, `"500ms"`, `"2m"` or `"1h"`.
pub fn parse_duration(s: &str) -> std::result::Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty duration string".to_string());
    }

    // Find the boundary between digits and suffix.
    let idx = s
        .chars()
        .position(|c| !c.is_ascii_digit())
        .ok_or_else(|| "duration missing unit suffix".to_string())?;

    let (num_part, unit_part) = s.split_at(idx);
    let value: u64 = num_part
        .parse()
        .map_err(|e| format!("invalid duration number '{}': {}", num_part, e))?;
    let unit = unit_part.trim().to_lowercase();

    match unit.as_str() {
        "ms" => Ok(Duration::from_millis(value)),
        "s" => Ok(Duration::from_secs(value)),
        "m" => Ok(Duration::from_secs(value * 60)),
        "h" => Ok(Duration::from_secs(value * 60 * 60)),
        _ => Err(format!(
            "unsupported duration unit '{}'; expected ms, s, m, or h",
            unit
        )),
    }
}
