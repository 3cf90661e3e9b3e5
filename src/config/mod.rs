// src/config/mod.rs

//! Configuration loading and validation for maaflow.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk (`loader.rs`).
//! - Validate times, durations and step ids (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_config_path, load_and_validate, load_from_fs, load_from_path};
pub use model::{
    ConfigFile, ConfigSection, FlowConfig, FlowDefinition, FlowTimings, RawConfigFile,
    TaskDescriptor, TimingsSection,
};
pub use validate::parse_duration;
