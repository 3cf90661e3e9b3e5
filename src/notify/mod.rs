// src/notify/mod.rs

//! Delivery of completion reports.
//!
//! The orchestrator hands every finished flow to a [`Notifier`]. Chat or
//! mail channels live outside this crate; [`LogNotifier`] writes the report
//! to the tracing output and [`FanoutNotifier`] combines several channels.

use std::sync::Arc;

use anyhow::Result;
use tracing::{info, warn};

use crate::exec::BoxFuture;
use crate::flow::CompletionReport;

pub trait Notifier: Send + Sync {
    /// Short channel name used in logs.
    fn name(&self) -> &str;

    fn notify<'a>(&'a self, report: &'a CompletionReport) -> BoxFuture<'a, Result<()>>;
}

/// Writes the report as structured log events.
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn name(&self) -> &str {
        "log"
    }

    fn notify<'a>(&'a self, report: &'a CompletionReport) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            info!(
                flow = %report.task_name,
                total = report.total_tasks,
                success = report.success_tasks,
                failed = report.failed_tasks,
                skipped = report.skipped_tasks,
                duration_ms = report.duration_ms,
                screenshot = report.screenshot.is_some(),
                "flow finished"
            );
            for task in &report.errors {
                warn!(flow = %report.task_name, task = %task, "step failed");
            }
            for skipped in &report.skipped {
                info!(
                    flow = %report.task_name,
                    task = %skipped.task,
                    reason = %skipped.reason,
                    "step skipped"
                );
            }
            for summary in &report.summaries {
                info!(
                    task = %summary.task_name,
                    stage = summary.stage_code.as_deref().unwrap_or("-"),
                    runs = summary.run_count.unwrap_or(0),
                    drops = summary.drops.len(),
                    "step summary"
                );
            }
            Ok(())
        })
    }
}

/// Sends to every channel in turn. A failing channel is logged and does not
/// stop the others.
#[derive(Clone, Default)]
pub struct FanoutNotifier {
    channels: Vec<Arc<dyn Notifier>>,
}

impl FanoutNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, channel: Arc<dyn Notifier>) -> Self {
        self.channels.push(channel);
        self
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}

impl Notifier for FanoutNotifier {
    fn name(&self) -> &str {
        "fanout"
    }

    fn notify<'a>(&'a self, report: &'a CompletionReport) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            for channel in &self.channels {
                if let Err(e) = channel.notify(report).await {
                    warn!(channel = channel.name(), error = %e, "notification failed");
                }
            }
            Ok(())
        })
    }
}
