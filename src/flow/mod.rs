// src/flow/mod.rs

//! Flow execution.
//!
//! - [`orchestrator`]: the single-flight sequential executor and its
//!   per-step policies.
//! - [`gate`]: weekly opening calendar of resource stages.
//! - [`activity`]: event-stage placeholder resolution with a cached feed.
//! - [`report`]: per-flow counters and the completion report.
//! - [`progress`]: broadcast of step transitions.

pub mod activity;
pub mod gate;
pub mod orchestrator;
pub mod progress;
pub mod report;

pub use activity::{
    parse_activity_feed, ActivityCache, ActivityInfo, ActivitySource, HttpActivitySource,
    ACTIVITY_TTL,
};
pub use gate::{is_stage_open_on, is_stage_open_today, StageGate, STAGE_GATES};
pub use orchestrator::{
    expected_units, FlowOrchestrator, FlowPermit, FlowRejected, OrchestratorSettings,
    SKIP_EXHAUSTED, SKIP_STOPPED,
};
pub use progress::{ProgressBus, ProgressEvent};
pub use report::{CompletionReport, FlowReport, SkippedTask};
