// src/state/tracker.rs

//! The single "current task" slot.
//!
//! Exactly one process may be registered as running at a time. The
//! orchestrator is the only writer; everyone else reads snapshots.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Local};
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::errors::{MaaflowError, Result};
use crate::exec::ProcessHandle;
use crate::types::{RecordLevel, TaskKind};

/// One entry of the task log buffer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogRecord {
    pub time: DateTime<Local>,
    pub level: RecordLevel,
    pub message: String,
}

/// Read-only view of the slot, without the process handle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TaskStateSnapshot {
    pub running: bool,
    pub name: Option<String>,
    pub kind: Option<TaskKind>,
    pub started_at: Option<DateTime<Local>>,
    pub logs: Vec<LogRecord>,
}

#[derive(Debug, Default)]
struct Inner {
    running: bool,
    name: Option<String>,
    kind: Option<TaskKind>,
    started_at: Option<DateTime<Local>>,
    handle: Option<ProcessHandle>,
    logs: VecDeque<LogRecord>,
    /// Bumped on every `set_running` so a pending eviction can tell it is
    /// stale.
    generation: u64,
    eviction: Option<JoinHandle<()>>,
}

#[derive(Debug, Clone)]
pub struct TaskStateTracker {
    inner: Arc<Mutex<Inner>>,
    capacity: usize,
    retention: Duration,
}

impl TaskStateTracker {
    /// `capacity` caps the log buffer; `retention` is how long logs survive
    /// after the task finished.
    pub fn new(capacity: usize, retention: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner::default())),
            capacity: capacity.max(1),
            retention,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Claim the slot for a process that is about to be spawned. Fails if
    /// another task holds it. The handle is attached once the process runs.
    pub fn claim(&self, name: &str, kind: TaskKind) -> Result<()> {
        let mut inner = self.lock();
        if inner.running {
            let current = inner.name.clone().unwrap_or_default();
            return Err(MaaflowError::SlotBusy(current));
        }

        if let Some(eviction) = inner.eviction.take() {
            eviction.abort();
        }
        inner.generation += 1;
        inner.running = true;
        inner.name = Some(name.to_string());
        inner.kind = Some(kind);
        inner.started_at = Some(Local::now());
        inner.handle = None;

        self.push_log(&mut inner, RecordLevel::Info, format!("started {kind} task '{name}'"));
        Ok(())
    }

    /// Attach the handle of the process that holds the claimed slot.
    /// Ignored when the slot was released in the meantime.
    pub fn attach(&self, handle: ProcessHandle) {
        let mut inner = self.lock();
        if inner.running {
            inner.handle = Some(handle);
        }
    }

    /// [`claim`](Self::claim) and [`attach`](Self::attach) in one go.
    pub fn set_running(&self, name: &str, kind: TaskKind, handle: ProcessHandle) -> Result<()> {
        self.claim(name, kind)?;
        self.attach(handle);
        Ok(())
    }

    /// Release the slot. Logs stay readable for the retention period.
    pub fn clear(&self) {
        let mut inner = self.lock();
        if !inner.running {
            return;
        }

        let finished = inner.name.take().unwrap_or_default();
        inner.running = false;
        inner.kind = None;
        inner.started_at = None;
        inner.handle = None;
        self.push_log(&mut inner, RecordLevel::Info, format!("finished task '{finished}'"));

        let generation = inner.generation;
        let retention = self.retention;
        let shared = Arc::clone(&self.inner);

        // Outside a runtime there is nothing to schedule on; logs then stay
        // until the next task overwrites them.
        if let Ok(rt) = tokio::runtime::Handle::try_current() {
            inner.eviction = Some(rt.spawn(async move {
                tokio::time::sleep(retention).await;
                let mut inner = shared.lock().unwrap_or_else(PoisonError::into_inner);
                if inner.generation == generation && !inner.running {
                    debug!(records = inner.logs.len(), "evicting task log buffer");
                    inner.logs.clear();
                    inner.eviction = None;
                }
            }));
        }
    }

    pub fn is_running(&self) -> bool {
        self.lock().running
    }

    pub fn snapshot(&self) -> TaskStateSnapshot {
        let inner = self.lock();
        TaskStateSnapshot {
            running: inner.running,
            name: inner.name.clone(),
            kind: inner.kind,
            started_at: inner.started_at,
            logs: inner.logs.iter().cloned().collect(),
        }
    }

    /// Append a record to the log buffer, dropping the oldest when full.
    pub fn append_log(&self, level: RecordLevel, message: impl Into<String>) {
        let mut inner = self.lock();
        self.push_log(&mut inner, level, message.into());
    }

    fn push_log(&self, inner: &mut Inner, level: RecordLevel, message: String) {
        while inner.logs.len() >= self.capacity {
            inner.logs.pop_front();
        }
        inner.logs.push_back(LogRecord {
            time: Local::now(),
            level,
            message,
        });
    }

    /// Stop the registered process, if any. Returns `true` if a kill request
    /// was delivered.
    pub fn kill_current(&self, graceful: bool) -> bool {
        let handle = self.lock().handle.clone();
        match handle {
            Some(handle) => handle.kill(graceful),
            None => false,
        }
    }
}
