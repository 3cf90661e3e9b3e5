// src/command/mod.rs

//! Translation of flow steps into `maa` invocations.
//!
//! - [`builder`] maps a step to a subcommand and arguments (pure).
//! - [`stages`] parses and formats compound fight stage lists.
//! - [`task_file`] serializes declarative steps into `maa` task files and
//!   writes them under the configuration directory.

pub mod builder;
pub mod stages;
pub mod task_file;

pub use builder::{build, build_stage, BuildError, BuiltCommand};
pub use stages::{format_stage_spec, parse_stage_spec, stages_from_params, StageEntry};
pub use task_file::{
    coerce_param, remove_task_file, write_task_file, ConfigBuildError, MaterializedTask, TaskFile,
};
