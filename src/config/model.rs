use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::trigger::TimeOfDay;
use crate::types::TaskKind;

/// Configuration exactly as read from a TOML file, before validation.
///
/// ```toml
/// [config]
/// maa_bin = "maa"
/// adb_address = "127.0.0.1:5555"
///
/// [config.timings]
/// startup_wait = "15s"
///
/// [flow.daily]
/// name = "Daily routine"
/// times = ["08:00", "20:00"]
///
/// [[flow.daily.task]]
/// id = "1"
/// command = "startup"
/// name = "Start game"
/// params = { client = "Official" }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct RawConfigFile {
    /// Global settings from `[config]`.
    #[serde(default)]
    pub config: ConfigSection,

    /// All flows from `[flow.<id>]`, keyed by flow id.
    #[serde(default)]
    pub flow: BTreeMap<String, FlowConfig>,
}

/// Validated configuration.
///
/// Only constructed through `TryFrom<RawConfigFile>` (see `validate.rs`), so
/// holders can rely on parsed times and durations.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub config: ConfigSection,
    pub timings: FlowTimings,
    pub flows: BTreeMap<String, FlowDefinition>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(
        config: ConfigSection,
        timings: FlowTimings,
        flows: BTreeMap<String, FlowDefinition>,
    ) -> Self {
        Self {
            config,
            timings,
            flows,
        }
    }

    pub fn flow(&self, id: &str) -> Option<&FlowDefinition> {
        self.flows.get(id)
    }
}

/// `[config]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigSection {
    /// Path or name of the `maa` executable.
    #[serde(default = "default_maa_bin")]
    pub maa_bin: String,

    /// Directory `maa` reads its configuration from. Generated task files
    /// are written to `<config_dir>/tasks/`.
    #[serde(default)]
    pub config_dir: Option<PathBuf>,

    /// `adb` executable used for screenshots.
    #[serde(default = "default_adb_bin")]
    pub adb_bin: String,

    /// Device serial passed to `adb -s` and to `maa startup -a`.
    #[serde(default)]
    pub adb_address: Option<String>,

    /// Maximum number of log records kept for the running task.
    #[serde(default = "default_log_buffer_capacity")]
    pub log_buffer_capacity: usize,

    /// URL of the activity stage feed. No resolution is attempted when unset.
    #[serde(default)]
    pub activity_feed: Option<String>,

    /// Stage prefix standing in for the current event's code (e.g. `HD-8`).
    #[serde(default = "default_activity_placeholder")]
    pub activity_placeholder: String,

    /// Client region used to pick entries from the activity feed.
    #[serde(default = "default_client_type")]
    pub client_type: String,

    #[serde(default)]
    pub timings: TimingsSection,
}

fn default_maa_bin() -> String {
    "maa".to_string()
}

fn default_adb_bin() -> String {
    "adb".to_string()
}

fn default_log_buffer_capacity() -> usize {
    1000
}

fn default_activity_placeholder() -> String {
    "HD".to_string()
}

fn default_client_type() -> String {
    "Official".to_string()
}

impl Default for ConfigSection {
    fn default() -> Self {
        Self {
            maa_bin: default_maa_bin(),
            config_dir: None,
            adb_bin: default_adb_bin(),
            adb_address: None,
            log_buffer_capacity: default_log_buffer_capacity(),
            activity_feed: None,
            activity_placeholder: default_activity_placeholder(),
            client_type: default_client_type(),
            timings: TimingsSection::default(),
        }
    }
}

impl ConfigSection {
    /// Directory `maa` reads its configuration from.
    ///
    /// Order: `config_dir`, `$MAA_CONFIG_DIR`, `$XDG_CONFIG_HOME/maa`,
    /// `$HOME/.config/maa`, then the current directory.
    pub fn resolved_config_dir(&self) -> PathBuf {
        if let Some(dir) = &self.config_dir {
            return dir.clone();
        }
        if let Some(dir) = std::env::var_os("MAA_CONFIG_DIR") {
            return PathBuf::from(dir);
        }
        if let Some(dir) = std::env::var_os("XDG_CONFIG_HOME") {
            return PathBuf::from(dir).join("maa");
        }
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home).join(".config").join("maa");
        }
        PathBuf::from(".")
    }
}

/// `[config.timings]` section, as duration strings (`"15s"`, `"500ms"`).
#[derive(Debug, Clone, Deserialize)]
pub struct TimingsSection {
    #[serde(default = "default_startup_wait")]
    pub startup_wait: String,
    #[serde(default = "default_startup_retry_backoff")]
    pub startup_retry_backoff: String,
    #[serde(default = "default_startup_retries")]
    pub startup_retries: u32,
    #[serde(default = "default_stage_pause")]
    pub stage_pause: String,
    #[serde(default = "default_kill_grace")]
    pub kill_grace: String,
    #[serde(default = "default_log_retention")]
    pub log_retention: String,
}

fn default_startup_wait() -> String {
    "15s".to_string()
}

fn default_startup_retry_backoff() -> String {
    "3s".to_string()
}

fn default_startup_retries() -> u32 {
    2
}

fn default_stage_pause() -> String {
    "2s".to_string()
}

fn default_kill_grace() -> String {
    "3s".to_string()
}

fn default_log_retention() -> String {
    "60s".to_string()
}

impl Default for TimingsSection {
    fn default() -> Self {
        Self {
            startup_wait: default_startup_wait(),
            startup_retry_backoff: default_startup_retry_backoff(),
            startup_retries: default_startup_retries(),
            stage_pause: default_stage_pause(),
            kill_grace: default_kill_grace(),
            log_retention: default_log_retention(),
        }
    }
}

/// Parsed timing controls. These delays are the only timing control the
/// engine applies; the wrapped binary itself has no execution timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlowTimings {
    /// Wait between `maa startup` exiting and the liveness check.
    pub startup_wait: Duration,
    pub startup_retry_backoff: Duration,
    /// Extra startup attempts after the first one.
    pub startup_retries: u32,
    /// Pause between stages of a compound fight step.
    pub stage_pause: Duration,
    /// Grace period between SIGTERM and a forced kill.
    pub kill_grace: Duration,
    /// How long the log buffer survives after a task finishes.
    pub log_retention: Duration,
}

impl Default for FlowTimings {
    fn default() -> Self {
        Self {
            startup_wait: Duration::from_secs(15),
            startup_retry_backoff: Duration::from_secs(3),
            startup_retries: 2,
            stage_pause: Duration::from_secs(2),
            kill_grace: Duration::from_secs(3),
            log_retention: Duration::from_secs(60),
        }
    }
}

/// `[flow.<id>]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct FlowConfig {
    /// Display name; defaults to the flow id.
    #[serde(default)]
    pub name: Option<String>,

    /// Daily trigger times, `"HH:MM"` in local time.
    #[serde(default)]
    pub times: Vec<String>,

    /// Ordered steps (`[[flow.<id>.task]]`).
    #[serde(default)]
    pub task: Vec<TaskDescriptor>,
}

/// One step of a flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskDescriptor {
    pub id: String,

    /// `startup`, `closedown`, `fight`, `roguelike`, `copilot`, or the name
    /// of a declarative task.
    #[serde(rename = "command")]
    pub command_id: String,

    pub name: String,

    #[serde(default = "default_enabled")]
    pub enabled: bool,

    #[serde(default)]
    pub params: BTreeMap<String, toml::Value>,

    /// `maa` task type for declarative tasks (e.g. `"Recruit"`).
    #[serde(default, rename = "type")]
    pub task_type: Option<String>,
}

fn default_enabled() -> bool {
    true
}

impl TaskDescriptor {
    pub fn kind(&self) -> TaskKind {
        TaskKind::from_command(&self.command_id)
    }

    pub fn param_str(&self, key: &str) -> Option<&str> {
        self.params.get(key).and_then(|v| v.as_str())
    }
}

/// A validated flow.
#[derive(Debug, Clone, PartialEq)]
pub struct FlowDefinition {
    pub id: String,
    pub name: String,
    pub times: Vec<TimeOfDay>,
    pub tasks: Vec<TaskDescriptor>,
}

impl FlowDefinition {
    /// Steps that will actually run, in order.
    pub fn enabled_tasks(&self) -> impl Iterator<Item = &TaskDescriptor> {
        self.tasks.iter().filter(|t| t.enabled)
    }
}
