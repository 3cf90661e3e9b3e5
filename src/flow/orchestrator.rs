// src/flow/orchestrator.rs

//! Sequential execution of one flow.
//!
//! The orchestrator owns the single flow slot. A flow walks its enabled
//! steps in order, applies the per-kind policy (startup liveness check, closedown
//! screenshot, gated multi-stage fights, declarative tasks), turns every
//! step outcome into report counters, and finally notifies and resets the
//! status. A failing step never aborts the flow.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::sync::{Mutex, Notify, OwnedMutexGuard, broadcast};
use tracing::{debug, info, trace, warn};

use crate::classify::{classify_error, extract_summary, is_resource_exhausted};
use crate::command::{
    build, build_stage, remove_task_file, stages_from_params, write_task_file, BuiltCommand,
    StageEntry,
};
use crate::config::{ConfigFile, FlowDefinition, FlowTimings, TaskDescriptor};
use crate::errors::StepError;
use crate::exec::{ExitReport, Invocation, OutputLine, ProcessBackend, SpawnedProcess};
use crate::flow::activity::ActivityCache;
use crate::flow::gate;
use crate::flow::progress::{ProgressBus, ProgressEvent};
use crate::flow::report::{CompletionReport, FlowReport};
use crate::fs::{FileSystem, RealFileSystem};
use crate::notify::{LogNotifier, Notifier};
use crate::state::{ScheduleExecutionStatus, StatusBoard, TaskStateTracker};
use crate::types::TaskKind;

pub const SKIP_EXHAUSTED: &str = "resource exhausted";
pub const SKIP_STOPPED: &str = "stopped";

/// How long output is still collected after the process exited. Pipes kept
/// open by leftover children are abandoned after that.
const OUTPUT_DRAIN_GRACE: Duration = Duration::from_millis(500);

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FlowRejected {
    #[error("another flow is already running")]
    Busy,
}

/// Proof of holding the flow slot. Dropping it frees the slot.
#[derive(Debug)]
pub struct FlowPermit {
    schedule_id: String,
    _guard: OwnedMutexGuard<()>,
}

impl FlowPermit {
    pub fn schedule_id(&self) -> &str {
        &self.schedule_id
    }
}

/// Static inputs of the orchestrator.
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub maa_bin: String,
    pub config_dir: PathBuf,
    pub timings: FlowTimings,
}

impl OrchestratorSettings {
    pub fn from_config(config: &ConfigFile) -> Self {
        Self {
            maa_bin: config.config.maa_bin.clone(),
            config_dir: config.config.resolved_config_dir(),
            timings: config.timings,
        }
    }
}

/// Output and verdict of one process run.
struct CommandOutcome {
    output: String,
    error: Option<StepError>,
}

#[derive(Clone)]
pub struct FlowOrchestrator {
    backend: Arc<dyn ProcessBackend>,
    fs: Arc<dyn FileSystem>,
    notifier: Arc<dyn Notifier>,
    activity: Option<ActivityCache>,
    tracker: TaskStateTracker,
    status: StatusBoard,
    progress: ProgressBus,
    settings: OrchestratorSettings,
    slot: Arc<Mutex<()>>,
    cancel: Arc<AtomicBool>,
    stop_signal: Arc<Notify>,
    weekday: Option<u32>,
}

impl std::fmt::Debug for FlowOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlowOrchestrator")
            .field("settings", &self.settings)
            .field("notifier", &self.notifier.name())
            .finish_non_exhaustive()
    }
}

impl FlowOrchestrator {
    pub fn new(
        backend: Arc<dyn ProcessBackend>,
        tracker: TaskStateTracker,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            backend,
            fs: Arc::new(RealFileSystem),
            notifier: Arc::new(LogNotifier),
            activity: None,
            tracker,
            status: StatusBoard::new(),
            progress: ProgressBus::new(),
            settings,
            slot: Arc::new(Mutex::new(())),
            cancel: Arc::new(AtomicBool::new(false)),
            stop_signal: Arc::new(Notify::new()),
            weekday: None,
        }
    }

    pub fn with_fs(mut self, fs: Arc<dyn FileSystem>) -> Self {
        self.fs = fs;
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_activity(mut self, activity: ActivityCache) -> Self {
        self.activity = Some(activity);
        self
    }

    /// Evaluate the stage calendar for a fixed weekday (`0 = Sunday`)
    /// instead of today.
    pub fn with_weekday(mut self, weekday: u32) -> Self {
        self.weekday = Some(weekday % 7);
        self
    }

    pub fn tracker(&self) -> &TaskStateTracker {
        &self.tracker
    }

    pub fn status(&self) -> ScheduleExecutionStatus {
        self.status.snapshot()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.progress.subscribe()
    }

    /// Claim the flow slot without waiting.
    pub fn try_begin(&self, schedule_id: &str) -> Result<FlowPermit, FlowRejected> {
        let guard = Arc::clone(&self.slot)
            .try_lock_owned()
            .map_err(|_| FlowRejected::Busy)?;
        if self.tracker.is_running() {
            return Err(FlowRejected::Busy);
        }
        Ok(FlowPermit {
            schedule_id: schedule_id.to_string(),
            _guard: guard,
        })
    }

    pub fn is_busy(&self) -> bool {
        self.slot.try_lock().is_err()
    }

    /// Claim the slot and run `flow` to completion.
    pub async fn run(
        &self,
        schedule_id: &str,
        flow: &FlowDefinition,
    ) -> Result<FlowReport, FlowRejected> {
        let permit = self.try_begin(schedule_id)?;
        Ok(self.execute(permit, flow).await)
    }

    /// Stop the running flow: the current process is killed and the
    /// remaining steps are skipped. Returns `false` when nothing was running.
    pub fn stop(&self) -> bool {
        let flow_running = self.status.snapshot().is_running;
        if flow_running {
            self.cancel.store(true, Ordering::SeqCst);
            self.stop_signal.notify_waiters();
        }
        let killed = self.tracker.kill_current(true);
        if flow_running || killed {
            info!(flow_running, killed, "stop requested");
        }
        flow_running || killed
    }

    fn cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    /// Sleep for `duration` unless the flow is stopped first. Returns
    /// `false` when stopped.
    async fn pause(&self, duration: Duration) -> bool {
        let stopped = self.stop_signal.notified();
        tokio::pin!(stopped);
        stopped.as_mut().enable();
        if self.cancelled() {
            return false;
        }

        tokio::select! {
            _ = tokio::time::sleep(duration) => !self.cancelled(),
            _ = stopped => false,
        }
    }

    /// Run `flow` while holding `permit`.
    pub async fn execute(&self, permit: FlowPermit, flow: &FlowDefinition) -> FlowReport {
        let started = Instant::now();
        let schedule_id = permit.schedule_id.clone();
        self.cancel.store(false, Ordering::SeqCst);

        let steps: Vec<&TaskDescriptor> = flow.enabled_tasks().collect();
        let total = steps.len();
        info!(schedule_id = %schedule_id, flow = %flow.id, steps = total, "flow started");

        self.status.begin(&schedule_id, total);
        self.publish(&schedule_id, -1, total, None, &format!("starting {}", flow.name));

        let mut report = FlowReport::default();
        for (index, task) in steps.iter().enumerate() {
            if self.cancelled() {
                for label in unit_labels(task) {
                    report.record_skip(label, SKIP_STOPPED);
                }
                continue;
            }

            let step = Step {
                schedule_id: &schedule_id,
                index: index as i64,
                total,
                task,
            };
            self.status.step(step.index, &task.name, "running");
            self.publish(&schedule_id, step.index, total, Some(&task.name), "running");
            debug!(
                schedule_id = %schedule_id,
                step = index,
                task = %task.name,
                kind = %task.kind(),
                "step started"
            );

            match task.kind() {
                TaskKind::Startup => self.run_startup(&step, &mut report).await,
                TaskKind::Closedown => self.run_closedown(&step, &mut report).await,
                TaskKind::Fight => self.run_fight(&step, &mut report).await,
                TaskKind::Roguelike | TaskKind::Copilot | TaskKind::Declarative => {
                    self.run_plain(&step, &mut report).await
                }
            }
        }

        report.finish(started.elapsed());
        let message = format!(
            "finished: {} succeeded, {} failed, {} skipped",
            report.success_count, report.failed_count, report.skipped_count
        );
        self.status.complete(&message);
        self.publish(&schedule_id, total as i64, total, None, &message);
        info!(
            schedule_id = %schedule_id,
            flow = %flow.id,
            success = report.success_count,
            failed = report.failed_count,
            skipped = report.skipped_count,
            duration_ms = report.duration_ms,
            "flow finished"
        );

        let completion = CompletionReport::from_flow(&flow.name, &report);
        if let Err(e) = self.notifier.notify(&completion).await {
            warn!(
                channel = self.notifier.name(),
                error = %e,
                "could not deliver completion report"
            );
        }

        self.status.reset();
        drop(permit);
        report
    }

    async fn run_startup(&self, step: &Step<'_>, report: &mut FlowReport) {
        let Some(cmd) = self.build_step(step, report) else {
            return;
        };

        let timings = &self.settings.timings;
        let attempts = timings.startup_retries + 1;

        for attempt in 1..=attempts {
            let outcome = self.run_command(step.task, &cmd).await;
            match outcome.error {
                Some(StepError::Killed) => {
                    return self.fail(step, &step.task.name, StepError::Killed, report);
                }
                Some(err) => {
                    warn!(task = %step.task.name, attempt, error = %err, "startup command failed");
                }
                None => {
                    self.message(step, "waiting for the game to come up");
                    if !self.pause(timings.startup_wait).await {
                        return self.fail(step, &step.task.name, StepError::Killed, report);
                    }
                    match self.backend.screenshot().await {
                        Ok(_) if self.cancelled() => {
                            return self.fail(step, &step.task.name, StepError::Killed, report);
                        }
                        Ok(_) => {
                            info!(task = %step.task.name, attempt, "game is responding");
                            report.record_success();
                            return;
                        }
                        Err(e) => {
                            warn!(task = %step.task.name, attempt, error = %e, "liveness check failed");
                        }
                    }
                }
            }

            if self.cancelled() {
                return self.fail(step, &step.task.name, StepError::Killed, report);
            }
            if attempt < attempts {
                let note = format!("startup attempt {attempt}/{attempts} failed; retrying");
                self.message(step, &note);
                if !self.pause(timings.startup_retry_backoff).await {
                    return self.fail(step, &step.task.name, StepError::Killed, report);
                }
            }
        }

        self.fail(step, &step.task.name, StepError::StartupUnresponsive { attempts }, report);
    }

    async fn run_closedown(&self, step: &Step<'_>, report: &mut FlowReport) {
        match self.backend.screenshot().await {
            Ok(png) => report.screenshot = Some(png),
            Err(e) => debug!(error = %e, "pre-closedown screenshot failed"),
        }

        let Some(cmd) = self.build_step(step, report) else {
            return;
        };
        let outcome = self.run_command(step.task, &cmd).await;
        match outcome.error {
            None => report.record_success(),
            Some(err) => self.fail(step, &step.task.name, err, report),
        }
    }

    async fn run_fight(&self, step: &Step<'_>, report: &mut FlowReport) {
        let task = step.task;
        let entries = stages_from_params(task.params.get("stage"), task.params.get("times"));
        if entries.is_empty() {
            let err = match build(task) {
                Err(e) => e.to_string(),
                Ok(_) => "no stage to fight".to_string(),
            };
            return self.fail(step, &task.name, StepError::InvalidStep(err), report);
        }

        let weekday = self.weekday.unwrap_or_else(gate::today);
        let multi = entries.len() > 1;
        let mut exhausted = false;
        let mut ran_before = false;

        for entry in &entries {
            let label = stage_label(task, entry, multi);
            if self.cancelled() {
                report.record_skip(label, SKIP_STOPPED);
                continue;
            }
            if exhausted {
                report.record_skip(label, SKIP_EXHAUSTED);
                continue;
            }

            let stage_code = match &self.activity {
                Some(cache) => cache.resolve(&entry.stage_code).await,
                None => entry.stage_code.clone(),
            };
            if !gate::is_stage_open_on(&stage_code, weekday) {
                let reason = gate::closed_reason(&stage_code);
                info!(task = %task.name, stage = %stage_code, weekday, "stage closed; skipping");
                self.message(step, &reason);
                report.record_skip(label, reason);
                continue;
            }

            if ran_before && !self.pause(self.settings.timings.stage_pause).await {
                report.record_skip(label, SKIP_STOPPED);
                continue;
            }
            ran_before = true;

            self.message(step, &format!("fighting {stage_code}"));
            let resolved = StageEntry::new(stage_code.clone(), entry.run_count.clone());
            let outcome = self.run_command(task, &build_stage(task, &resolved)).await;

            match outcome.error {
                None => {
                    report.record_success();
                    if let Some(summary) = extract_summary(&label, &outcome.output) {
                        report.summaries.push(summary);
                    }
                }
                Some(err) => self.fail(step, &label, err, report),
            }

            if is_resource_exhausted(&outcome.output, &stage_code) {
                info!(task = %task.name, stage = %stage_code, "sanity exhausted");
                self.message(step, &format!("sanity exhausted after {stage_code}"));
                exhausted = true;
            }
        }
    }

    async fn run_plain(&self, step: &Step<'_>, report: &mut FlowReport) {
        let Some(cmd) = self.build_step(step, report) else {
            return;
        };
        let outcome = self.run_command(step.task, &cmd).await;
        match outcome.error {
            None => {
                report.record_success();
                if let Some(summary) = extract_summary(&step.task.name, &outcome.output) {
                    report.summaries.push(summary);
                }
            }
            Some(err) => self.fail(step, &step.task.name, err, report),
        }
    }

    fn build_step(&self, step: &Step<'_>, report: &mut FlowReport) -> Option<BuiltCommand> {
        match build(step.task) {
            Ok(cmd) => Some(cmd),
            Err(e) => {
                let err = StepError::InvalidStep(e.to_string());
                self.fail(step, &step.task.name, err, report);
                None
            }
        }
    }

    /// Materialize the task file if needed, run the binary and judge the
    /// exit.
    async fn run_command(&self, task: &TaskDescriptor, cmd: &BuiltCommand) -> CommandOutcome {
        let materialized = match &cmd.inline_config {
            Some(file) => {
                match write_task_file(self.fs.as_ref(), &self.settings.config_dir, file) {
                    Ok(m) => Some(m),
                    Err(e) => {
                        return CommandOutcome {
                            output: String::new(),
                            error: Some(StepError::TaskFile(format!("{e:#}"))),
                        };
                    }
                }
            }
            None => None,
        };

        let stem = materialized.as_ref().map(|m| m.stem.as_str());
        let invocation = Invocation::new(&self.settings.maa_bin, cmd.argv(stem));
        let outcome = self.run_process(task, invocation).await;

        if let Some(m) = &materialized {
            remove_task_file(self.fs.as_ref(), m);
        }
        outcome
    }

    async fn run_process(&self, task: &TaskDescriptor, invocation: Invocation) -> CommandOutcome {
        if self.cancelled() {
            return CommandOutcome {
                output: String::new(),
                error: Some(StepError::Killed),
            };
        }

        let program = invocation.program.clone();
        if let Err(e) = self.tracker.claim(&task.name, task.kind()) {
            warn!(task = %task.name, error = %e, "task slot taken; not spawning");
            return CommandOutcome {
                output: String::new(),
                error: Some(StepError::ProcessSpawn {
                    program,
                    reason: e.to_string(),
                }),
            };
        }

        let SpawnedProcess {
            handle,
            mut output,
            mut exit,
        } = match self.backend.spawn(invocation).await {
            Ok(spawned) => spawned,
            Err(e) => {
                self.tracker.clear();
                return CommandOutcome {
                    output: String::new(),
                    error: Some(StepError::ProcessSpawn {
                        program,
                        reason: format!("{e:#}"),
                    }),
                };
            }
        };

        self.tracker.attach(handle.clone());
        // A stop that raced with the spawn.
        if self.cancelled() {
            handle.kill(true);
        }

        // The exit report ends the step even if leftover children keep the
        // output pipes open.
        let mut captured = String::new();
        let exited = loop {
            tokio::select! {
                line = output.recv() => match line {
                    Some(line) => self.capture(task, &mut captured, line),
                    None => break None,
                },
                report = &mut exit => break Some(report),
            }
        };

        let exit = match exited {
            Some(report) => {
                let drain = async {
                    while let Some(line) = output.recv().await {
                        self.capture(task, &mut captured, line);
                    }
                };
                if tokio::time::timeout(OUTPUT_DRAIN_GRACE, drain).await.is_err() {
                    debug!(task = %task.name, "output still open after exit; detaching");
                }
                report
            }
            None => exit.await,
        }
        .unwrap_or(ExitReport {
            code: -1,
            killed: false,
        });
        self.tracker.clear();

        let error = if exit.killed {
            Some(StepError::Killed)
        } else if exit.code != 0 {
            Some(StepError::ClassifiedRuntime {
                kind: classify_error(&captured),
                exit_code: exit.code,
            })
        } else {
            None
        };

        CommandOutcome {
            output: captured,
            error,
        }
    }

    fn capture(&self, task: &TaskDescriptor, captured: &mut String, line: OutputLine) {
        trace!(task = %task.name, stream = ?line.stream, "{}", line.text);
        captured.push_str(&line.text);
        captured.push('\n');
        self.tracker.append_log(line.level, line.text);
    }

    fn fail(&self, step: &Step<'_>, label: &str, err: StepError, report: &mut FlowReport) {
        warn!(
            schedule_id = %step.schedule_id,
            task = %label,
            error = %err,
            "step failed"
        );
        report.record_failure(label);
        self.message(step, &format!("{label} failed: {err}. {}", err.hint()));
    }

    fn message(&self, step: &Step<'_>, message: &str) {
        self.status.set_message(message);
        self.publish(
            step.schedule_id,
            step.index,
            step.total,
            Some(&step.task.name),
            message,
        );
    }

    fn publish(
        &self,
        schedule_id: &str,
        current_step: i64,
        total_steps: usize,
        task_name: Option<&str>,
        message: &str,
    ) {
        self.progress.publish(ProgressEvent {
            schedule_id: schedule_id.to_string(),
            current_step,
            total_steps,
            current_task_name: task_name.map(str::to_string),
            message: message.to_string(),
        });
    }
}

struct Step<'a> {
    schedule_id: &'a str,
    index: i64,
    total: usize,
    task: &'a TaskDescriptor,
}

fn stage_label(task: &TaskDescriptor, entry: &StageEntry, multi: bool) -> String {
    if multi {
        format!("{} [{}]", task.name, entry.stage_code)
    } else {
        task.name.clone()
    }
}

/// Report entries a step accounts for: one per stage for fights, one
/// otherwise.
fn unit_labels(task: &TaskDescriptor) -> Vec<String> {
    if task.kind() == TaskKind::Fight {
        let entries = stages_from_params(task.params.get("stage"), task.params.get("times"));
        if !entries.is_empty() {
            let multi = entries.len() > 1;
            return entries
                .iter()
                .map(|entry| stage_label(task, entry, multi))
                .collect();
        }
    }
    vec![task.name.clone()]
}

/// Number of report entries `flow` produces: its enabled steps, with fight
/// steps counted per stage.
pub fn expected_units(flow: &FlowDefinition) -> usize {
    flow.enabled_tasks().map(|task| unit_labels(task).len()).sum()
}
