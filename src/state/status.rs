// src/state/status.rs

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Local};
use serde::Serialize;

/// Progress of the flow currently being executed.
///
/// `current_step_index` is `-1` before the first step and `total_steps`
/// once the flow completed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScheduleExecutionStatus {
    pub is_running: bool,
    pub schedule_id: Option<String>,
    pub current_step_index: i64,
    pub total_steps: usize,
    pub current_task_name: Option<String>,
    pub message: String,
    pub started_at: Option<DateTime<Local>>,
}

impl Default for ScheduleExecutionStatus {
    fn default() -> Self {
        Self {
            is_running: false,
            schedule_id: None,
            current_step_index: -1,
            total_steps: 0,
            current_task_name: None,
            message: String::new(),
            started_at: None,
        }
    }
}

/// Shared, lock-guarded [`ScheduleExecutionStatus`].
#[derive(Debug, Clone, Default)]
pub struct StatusBoard {
    inner: Arc<Mutex<ScheduleExecutionStatus>>,
}

impl StatusBoard {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, ScheduleExecutionStatus> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn begin(&self, schedule_id: &str, total_steps: usize) {
        *self.lock() = ScheduleExecutionStatus {
            is_running: true,
            schedule_id: Some(schedule_id.to_string()),
            current_step_index: -1,
            total_steps,
            current_task_name: None,
            message: "starting".to_string(),
            started_at: Some(Local::now()),
        };
    }

    /// Move to step `index`; clamped into `[-1, total_steps]`.
    pub fn step(&self, index: i64, task_name: &str, message: &str) {
        let mut status = self.lock();
        status.current_step_index = index.clamp(-1, status.total_steps as i64);
        status.current_task_name = Some(task_name.to_string());
        status.message = message.to_string();
    }

    pub fn set_message(&self, message: &str) {
        self.lock().message = message.to_string();
    }

    pub fn complete(&self, message: &str) {
        let mut status = self.lock();
        status.current_step_index = status.total_steps as i64;
        status.current_task_name = None;
        status.message = message.to_string();
    }

    pub fn reset(&self) {
        *self.lock() = ScheduleExecutionStatus::default();
    }

    pub fn snapshot(&self) -> ScheduleExecutionStatus {
        self.lock().clone()
    }
}
