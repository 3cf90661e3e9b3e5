use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use maaflow::exec::BoxFuture;
use maaflow::flow::CompletionReport;
use maaflow::notify::Notifier;

/// Keeps every report it receives.
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    reports: Arc<Mutex<Vec<CompletionReport>>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reports(&self) -> Vec<CompletionReport> {
        self.reports.lock().unwrap().clone()
    }

    pub fn last(&self) -> Option<CompletionReport> {
        self.reports.lock().unwrap().last().cloned()
    }
}

impl Notifier for RecordingNotifier {
    fn name(&self) -> &str {
        "recording"
    }

    fn notify<'a>(&'a self, report: &'a CompletionReport) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            self.reports.lock().unwrap().push(report.clone());
            Ok(())
        })
    }
}

/// Always fails.
#[derive(Debug, Clone, Default)]
pub struct FailingNotifier;

impl Notifier for FailingNotifier {
    fn name(&self) -> &str {
        "failing"
    }

    fn notify<'a>(&'a self, _report: &'a CompletionReport) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move { Err(anyhow!("channel unavailable")) })
    }
}
