// src/trigger/mod.rs

//! Time-based and manual flow triggers.
//!
//! - [`time`]: `HH:MM` parsing and next-occurrence computation.
//! - [`registry`]: per-schedule daily timers and `trigger_now`.

pub mod registry;
pub mod time;

pub use registry::{Registration, TriggerRegistry};
pub use time::{next_fire, TimeOfDay};
