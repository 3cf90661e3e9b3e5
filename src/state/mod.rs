// src/state/mod.rs

//! In-memory runtime state.
//!
//! - [`tracker`]: the single task slot plus its capped log buffer.
//! - [`status`]: progress of the flow being executed.

pub mod status;
pub mod tracker;

pub use status::{ScheduleExecutionStatus, StatusBoard};
pub use tracker::{LogRecord, TaskStateSnapshot, TaskStateTracker};
