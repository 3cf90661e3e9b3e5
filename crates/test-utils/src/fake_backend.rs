use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::anyhow;
use tokio::sync::{mpsc, oneshot};

use maaflow::exec::process::OUTPUT_QUEUE_CAPACITY;
use maaflow::state::TaskStateTracker;
use maaflow::exec::{
    BoxFuture, ExitReport, Invocation, OutputLine, OutputStream, ProcessBackend, ProcessHandle,
    SpawnedProcess,
};

/// What one fake process does.
#[derive(Debug, Clone)]
pub enum ScriptedRun {
    /// Print `lines`, wait `delay`, exit with `code`.
    Exit {
        lines: Vec<String>,
        code: i32,
        delay: Duration,
    },
    /// Print `lines`, then run until killed.
    Hang { lines: Vec<String> },
    /// Fail to launch.
    SpawnError(String),
}

impl ScriptedRun {
    pub fn ok(lines: &[&str]) -> Self {
        Self::exit(lines, 0)
    }

    pub fn exit(lines: &[&str], code: i32) -> Self {
        ScriptedRun::Exit {
            lines: lines.iter().map(|l| l.to_string()).collect(),
            code,
            delay: Duration::ZERO,
        }
    }

    pub fn slow(lines: &[&str], delay: Duration) -> Self {
        ScriptedRun::Exit {
            lines: lines.iter().map(|l| l.to_string()).collect(),
            code: 0,
            delay,
        }
    }

    pub fn hang(lines: &[&str]) -> Self {
        ScriptedRun::Hang {
            lines: lines.iter().map(|l| l.to_string()).collect(),
        }
    }
}

/// A fake backend that:
/// - records every invocation,
/// - answers from rules (`respond_to`) first, then a FIFO script, then with a
///   silent successful exit,
/// - replays scripted screenshot results (success by default),
/// - tracks how many fake processes are alive at once,
/// - notes whether the task slot was already claimed at each spawn.
#[derive(Debug, Default)]
pub struct ScriptedBackend {
    rules: Mutex<Vec<(String, ScriptedRun)>>,
    script: Mutex<VecDeque<ScriptedRun>>,
    screenshots: Mutex<VecDeque<Result<Vec<u8>, String>>>,
    invocations: Mutex<Vec<Invocation>>,
    screenshot_calls: AtomicUsize,
    active: Arc<AtomicUsize>,
    max_active: Arc<AtomicUsize>,
    next_pid: AtomicU32,
    slot: Mutex<Option<TaskStateTracker>>,
    running_at_spawn: Mutex<Vec<bool>>,
}

pub const FAKE_PNG: &[u8] = b"\x89PNG fake";

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every invocation whose arguments contain `needle` behaves like `run`.
    pub fn respond_to(self, needle: &str, run: ScriptedRun) -> Self {
        self.rules.lock().unwrap().push((needle.to_string(), run));
        self
    }

    /// Queue `run` for the next invocation no rule matched.
    pub fn then(self, run: ScriptedRun) -> Self {
        self.script.lock().unwrap().push_back(run);
        self
    }

    pub fn screenshot_fails(self, reason: &str) -> Self {
        self.screenshots
            .lock()
            .unwrap()
            .push_back(Err(reason.to_string()));
        self
    }

    pub fn screenshot_ok(self) -> Self {
        self.screenshots.lock().unwrap().push_back(Ok(FAKE_PNG.to_vec()));
        self
    }

    /// Record `tracker.is_running()` on every spawn.
    pub fn watch_slot(&self, tracker: TaskStateTracker) {
        *self.slot.lock().unwrap() = Some(tracker);
    }

    /// Slot state seen by each spawn, in order.
    pub fn running_at_spawn(&self) -> Vec<bool> {
        self.running_at_spawn.lock().unwrap().clone()
    }

    pub fn invocations(&self) -> Vec<Invocation> {
        self.invocations.lock().unwrap().clone()
    }

    /// Arguments of every invocation, joined by spaces.
    pub fn command_lines(&self) -> Vec<String> {
        self.invocations()
            .iter()
            .map(|inv| inv.args.join(" "))
            .collect()
    }

    pub fn screenshot_calls(&self) -> usize {
        self.screenshot_calls.load(Ordering::SeqCst)
    }

    /// Highest number of fake processes that were alive at the same time.
    pub fn max_concurrent(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    fn next_run(&self, invocation: &Invocation) -> ScriptedRun {
        let joined = invocation.args.join(" ");
        let rules = self.rules.lock().unwrap();
        if let Some((_, run)) = rules.iter().find(|(needle, _)| joined.contains(needle.as_str())) {
            return run.clone();
        }
        drop(rules);

        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| ScriptedRun::ok(&[]))
    }
}

impl ProcessBackend for ScriptedBackend {
    fn spawn(&self, invocation: Invocation) -> BoxFuture<'_, anyhow::Result<SpawnedProcess>> {
        Box::pin(async move {
            self.invocations.lock().unwrap().push(invocation.clone());
            if let Some(tracker) = self.slot.lock().unwrap().as_ref() {
                self.running_at_spawn
                    .lock()
                    .unwrap()
                    .push(tracker.is_running());
            }

            let (lines, outcome) = match self.next_run(&invocation) {
                ScriptedRun::SpawnError(reason) => return Err(anyhow!(reason)),
                ScriptedRun::Exit { lines, code, delay } => (lines, Some((code, delay))),
                ScriptedRun::Hang { lines } => (lines, None),
            };

            let pid = 1000 + self.next_pid.fetch_add(1, Ordering::SeqCst);
            let (handle, mut kills) = ProcessHandle::channel(Some(pid));
            let (line_tx, line_rx) = mpsc::channel(OUTPUT_QUEUE_CAPACITY);
            let (exit_tx, exit_rx) = oneshot::channel();

            let now_active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_active.fetch_max(now_active, Ordering::SeqCst);
            let active = Arc::clone(&self.active);

            tokio::spawn(async move {
                for line in lines {
                    let _ = line_tx.send(OutputLine::new(OutputStream::Stdout, line)).await;
                }

                let report = match outcome {
                    Some((code, delay)) => {
                        tokio::select! {
                            _ = tokio::time::sleep(delay) => ExitReport { code, killed: false },
                            Some(_) = kills.recv() => ExitReport { code: -1, killed: true },
                        }
                    }
                    None => match kills.recv().await {
                        Some(_) => ExitReport {
                            code: -1,
                            killed: true,
                        },
                        None => ExitReport {
                            code: -1,
                            killed: false,
                        },
                    },
                };

                drop(line_tx);
                active.fetch_sub(1, Ordering::SeqCst);
                let _ = exit_tx.send(report);
            });

            Ok(SpawnedProcess {
                handle,
                output: line_rx,
                exit: exit_rx,
            })
        })
    }

    fn screenshot(&self) -> BoxFuture<'_, anyhow::Result<Vec<u8>>> {
        Box::pin(async move {
            self.screenshot_calls.fetch_add(1, Ordering::SeqCst);
            match self.screenshots.lock().unwrap().pop_front() {
                Some(Ok(png)) => Ok(png),
                Some(Err(reason)) => Err(anyhow!(reason)),
                None => Ok(FAKE_PNG.to_vec()),
            }
        })
    }
}
