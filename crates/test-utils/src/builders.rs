#![allow(dead_code)]

use std::collections::BTreeMap;

use maaflow::config::{
    ConfigFile, ConfigSection, FlowConfig, FlowDefinition, RawConfigFile, TaskDescriptor,
};
use maaflow::trigger::TimeOfDay;

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile {
                config: ConfigSection::default(),
                flow: BTreeMap::new(),
            },
        }
    }

    pub fn with_flow(mut self, id: &str, times: &[&str], tasks: Vec<TaskDescriptor>) -> Self {
        self.config.flow.insert(
            id.to_string(),
            FlowConfig {
                name: None,
                times: times.iter().map(|t| t.to_string()).collect(),
                task: tasks,
            },
        );
        self
    }

    pub fn with_maa_bin(mut self, bin: &str) -> Self {
        self.config.config.maa_bin = bin.to_string();
        self
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for one flow step.
pub struct TaskBuilder {
    task: TaskDescriptor,
}

impl TaskBuilder {
    pub fn new(id: &str, command: &str, name: &str) -> Self {
        Self {
            task: TaskDescriptor {
                id: id.to_string(),
                command_id: command.to_string(),
                name: name.to_string(),
                enabled: true,
                params: BTreeMap::new(),
                task_type: None,
            },
        }
    }

    pub fn startup(id: &str) -> Self {
        Self::new(id, "startup", "Start game")
    }

    pub fn closedown(id: &str) -> Self {
        Self::new(id, "closedown", "Close game")
    }

    /// Fight step over a compound stage spec such as `"1-7:3,CE-6"`.
    pub fn fight(id: &str, stages: &str) -> Self {
        Self::new(id, "fight", "Fight").param("stage", stages)
    }

    pub fn param(mut self, key: &str, value: impl Into<toml::Value>) -> Self {
        self.task.params.insert(key.to_string(), value.into());
        self
    }

    pub fn task_type(mut self, task_type: &str) -> Self {
        self.task.task_type = Some(task_type.to_string());
        self
    }

    pub fn disabled(mut self) -> Self {
        self.task.enabled = false;
        self
    }

    pub fn build(self) -> TaskDescriptor {
        self.task
    }
}

/// Builder for an already validated flow.
pub struct FlowBuilder {
    flow: FlowDefinition,
}

impl FlowBuilder {
    pub fn new(id: &str) -> Self {
        Self {
            flow: FlowDefinition {
                id: id.to_string(),
                name: id.to_string(),
                times: Vec::new(),
                tasks: Vec::new(),
            },
        }
    }

    pub fn name(mut self, name: &str) -> Self {
        self.flow.name = name.to_string();
        self
    }

    pub fn at(mut self, time: &str) -> Self {
        let time: TimeOfDay = time.parse().expect("valid HH:MM");
        self.flow.times.push(time);
        self
    }

    pub fn step(mut self, task: TaskBuilder) -> Self {
        self.flow.tasks.push(task.build());
        self
    }

    pub fn build(self) -> FlowDefinition {
        self.flow
    }
}
