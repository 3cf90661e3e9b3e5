// src/flow/report.rs

//! Aggregated outcome of one flow execution.

use std::time::Duration;

use serde::Serialize;

use crate::classify::Summary;

/// A step (or fight stage) that was not run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedTask {
    pub task: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FlowReport {
    pub success_count: usize,
    pub failed_count: usize,
    pub skipped_count: usize,
    /// Names of failed steps.
    pub errors: Vec<String>,
    pub skipped: Vec<SkippedTask>,
    pub summaries: Vec<Summary>,
    /// PNG captured before closedown, if any.
    #[serde(skip)]
    pub screenshot: Option<Vec<u8>>,
    pub duration_ms: u64,
}

impl FlowReport {
    pub fn total(&self) -> usize {
        self.success_count + self.failed_count + self.skipped_count
    }

    pub(crate) fn record_success(&mut self) {
        self.success_count += 1;
    }

    pub(crate) fn record_failure(&mut self, task: &str) {
        self.failed_count += 1;
        self.errors.push(task.to_string());
    }

    pub(crate) fn record_skip(&mut self, task: impl Into<String>, reason: impl Into<String>) {
        self.skipped_count += 1;
        self.skipped.push(SkippedTask {
            task: task.into(),
            reason: reason.into(),
        });
    }

    pub(crate) fn finish(&mut self, elapsed: Duration) {
        self.duration_ms = elapsed.as_millis() as u64;
    }
}

/// What the notification collaborator receives after a flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompletionReport {
    pub task_name: String,
    pub total_tasks: usize,
    pub success_tasks: usize,
    pub failed_tasks: usize,
    pub skipped_tasks: usize,
    pub duration_ms: u64,
    pub errors: Vec<String>,
    pub skipped: Vec<SkippedTask>,
    pub summaries: Vec<Summary>,
    #[serde(skip)]
    pub screenshot: Option<Vec<u8>>,
}

impl CompletionReport {
    pub fn from_flow(task_name: impl Into<String>, report: &FlowReport) -> Self {
        Self {
            task_name: task_name.into(),
            total_tasks: report.total(),
            success_tasks: report.success_count,
            failed_tasks: report.failed_count,
            skipped_tasks: report.skipped_count,
            duration_ms: report.duration_ms,
            errors: report.errors.clone(),
            skipped: report.skipped.clone(),
            summaries: report.summaries.clone(),
            screenshot: report.screenshot.clone(),
        }
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed_tasks == 0
    }
}
