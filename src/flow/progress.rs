// src/flow/progress.rs

use serde::Serialize;
use tokio::sync::broadcast;

/// Buffered events per subscriber before it starts lagging.
pub const PROGRESS_CHANNEL_CAPACITY: usize = 64;

/// One transition of a running flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressEvent {
    pub schedule_id: String,
    /// `-1` before the first step, `total_steps` once done.
    pub current_step: i64,
    pub total_steps: usize,
    pub current_task_name: Option<String>,
    pub message: String,
}

/// Fire-and-forget fan-out of [`ProgressEvent`]s. Slow subscribers lose
/// events; nothing is replayed.
#[derive(Debug, Clone)]
pub struct ProgressBus {
    tx: broadcast::Sender<ProgressEvent>,
}

impl Default for ProgressBus {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(PROGRESS_CHANNEL_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.tx.subscribe()
    }

    pub fn publish(&self, event: ProgressEvent) {
        // No subscribers is fine.
        let _ = self.tx.send(event);
    }
}
