// src/control.rs

//! Command surface for chat bots and the CLI: status, stop, run-flow.

use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use crate::config::ConfigFile;
use crate::flow::FlowOrchestrator;
use crate::state::{ScheduleExecutionStatus, TaskStateSnapshot};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusReport {
    pub task: TaskStateSnapshot,
    pub schedule: ScheduleExecutionStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", content = "reason", rename_all = "snake_case")]
pub enum RunFlowResponse {
    /// The flow was started in the background.
    Accepted,
    Rejected(String),
}

#[derive(Debug, Clone)]
pub struct Controller {
    orchestrator: FlowOrchestrator,
    config: Arc<ConfigFile>,
}

impl Controller {
    pub fn new(orchestrator: FlowOrchestrator, config: Arc<ConfigFile>) -> Self {
        Self {
            orchestrator,
            config,
        }
    }

    pub fn status(&self) -> StatusReport {
        StatusReport {
            task: self.orchestrator.tracker().snapshot(),
            schedule: self.orchestrator.status(),
        }
    }

    /// Stop whatever is running. `false` when idle.
    pub fn stop(&self) -> bool {
        self.orchestrator.stop()
    }

    /// Start `flow_id` in the background if the slot is free.
    pub fn run_flow(&self, flow_id: &str) -> RunFlowResponse {
        let Some(flow) = self.config.flow(flow_id).cloned() else {
            return RunFlowResponse::Rejected(format!("unknown flow '{flow_id}'"));
        };

        let schedule_id = format!("manual-{flow_id}");
        let permit = match self.orchestrator.try_begin(&schedule_id) {
            Ok(permit) => permit,
            Err(e) => return RunFlowResponse::Rejected(e.to_string()),
        };

        info!(flow = %flow_id, "flow accepted");
        let orchestrator = self.orchestrator.clone();
        tokio::spawn(async move {
            orchestrator.execute(permit, &flow).await;
        });
        RunFlowResponse::Accepted
    }
}
