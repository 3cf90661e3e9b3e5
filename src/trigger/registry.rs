// src/trigger/registry.rs

//! Daily wall-clock registrations.
//!
//! Each `schedule_id` owns a set of entries, one tokio task per time of day.
//! A firing runs the flow on its own task with the sub-id
//! `<schedule_id>-<index>`; a busy orchestrator means the firing is dropped
//! and the entry waits for the next day.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Local};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::FlowDefinition;
use crate::errors::Result;
use crate::flow::{FlowOrchestrator, FlowRejected, FlowReport};
use crate::trigger::time::{next_fire, TimeOfDay};

/// Result of a successful [`TriggerRegistry::schedule`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub schedule_id: String,
    pub flow_id: String,
    pub times: Vec<TimeOfDay>,
    /// Next firing of each entry, in the order of `times`.
    pub next_fires: Vec<DateTime<Local>>,
}

#[derive(Debug)]
struct ScheduledEntry {
    time: TimeOfDay,
    handle: JoinHandle<()>,
}

#[derive(Debug)]
struct ScheduledJob {
    flow_id: String,
    entries: Vec<ScheduledEntry>,
}

impl ScheduledJob {
    fn cancel(self) {
        for entry in self.entries {
            entry.handle.abort();
        }
    }
}

#[derive(Debug, Clone)]
pub struct TriggerRegistry {
    orchestrator: FlowOrchestrator,
    jobs: Arc<Mutex<BTreeMap<String, ScheduledJob>>>,
}

impl TriggerRegistry {
    pub fn new(orchestrator: FlowOrchestrator) -> Self {
        Self {
            orchestrator,
            jobs: Arc::new(Mutex::new(BTreeMap::new())),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, ScheduledJob>> {
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the registration of `schedule_id` with daily firings of
    /// `flow` at `times`.
    ///
    /// Every time is validated before anything changes; on error the
    /// previous registration stays in place. Must be called inside a tokio
    /// runtime.
    pub fn schedule<I, S>(
        &self,
        schedule_id: &str,
        times: I,
        flow: FlowDefinition,
    ) -> Result<Registration>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let times = times
            .into_iter()
            .map(|t| t.as_ref().parse::<TimeOfDay>())
            .collect::<Result<Vec<_>>>()?;

        let flow = Arc::new(flow);
        let now = Local::now();
        let mut jobs = self.lock();

        if let Some(previous) = jobs.remove(schedule_id) {
            debug!(
                schedule_id,
                entries = previous.entries.len(),
                "cancelling previous registration"
            );
            previous.cancel();
        }

        let entries = times
            .iter()
            .enumerate()
            .map(|(index, &time)| {
                let sub_id = format!("{schedule_id}-{index}");
                ScheduledEntry {
                    time,
                    handle: self.spawn_entry(sub_id, time, Arc::clone(&flow)),
                }
            })
            .collect();

        jobs.insert(
            schedule_id.to_string(),
            ScheduledJob {
                flow_id: flow.id.clone(),
                entries,
            },
        );

        let next_fires = times.iter().map(|&t| next_fire(&now, t)).collect();
        info!(
            schedule_id,
            flow = %flow.id,
            times = %join_times(&times),
            "schedule registered"
        );

        Ok(Registration {
            schedule_id: schedule_id.to_string(),
            flow_id: flow.id.clone(),
            times,
            next_fires,
        })
    }

    /// Register `flow` under its own id at its configured times.
    pub fn schedule_flow(&self, flow: &FlowDefinition) -> Result<Registration> {
        let times: Vec<String> = flow.times.iter().map(TimeOfDay::to_string).collect();
        self.schedule(&flow.id, times, flow.clone())
    }

    fn spawn_entry(
        &self,
        sub_id: String,
        time: TimeOfDay,
        flow: Arc<FlowDefinition>,
    ) -> JoinHandle<()> {
        let orchestrator = self.orchestrator.clone();

        tokio::spawn(async move {
            let mut after = Local::now();
            loop {
                let at = next_fire(&after, time);
                let wait = (at - Local::now()).to_std().unwrap_or_default();
                debug!(schedule_id = %sub_id, at = %at, "waiting for next firing");
                tokio::time::sleep(wait).await;
                after = at.max(Local::now());

                match orchestrator.try_begin(&sub_id) {
                    Ok(permit) => {
                        info!(schedule_id = %sub_id, flow = %flow.id, "schedule fired");
                        let orchestrator = orchestrator.clone();
                        let flow = Arc::clone(&flow);
                        // Detached so unscheduling never aborts a running flow.
                        tokio::spawn(async move {
                            orchestrator.execute(permit, &flow).await;
                        });
                    }
                    Err(FlowRejected::Busy) => {
                        warn!(
                            schedule_id = %sub_id,
                            flow = %flow.id,
                            "schedule fired while busy; skipped"
                        );
                    }
                }
            }
        })
    }

    /// Cancel every entry of `schedule_id`. Returns `false` if it was not
    /// registered.
    pub fn unschedule(&self, schedule_id: &str) -> bool {
        match self.lock().remove(schedule_id) {
            Some(job) => {
                job.cancel();
                info!(schedule_id, "schedule removed");
                true
            }
            None => false,
        }
    }

    /// Run `flow` right now under `schedule_id`, bypassing the clock.
    pub async fn trigger_now(
        &self,
        schedule_id: &str,
        flow: &FlowDefinition,
    ) -> std::result::Result<FlowReport, FlowRejected> {
        self.orchestrator.run(schedule_id, flow).await
    }

    /// Times currently registered for `schedule_id`.
    pub fn active_times(&self, schedule_id: &str) -> Option<Vec<TimeOfDay>> {
        self.lock()
            .get(schedule_id)
            .map(|job| job.entries.iter().map(|e| e.time).collect())
    }

    pub fn flow_of(&self, schedule_id: &str) -> Option<String> {
        self.lock().get(schedule_id).map(|job| job.flow_id.clone())
    }

    pub fn schedule_ids(&self) -> Vec<String> {
        self.lock().keys().cloned().collect()
    }

    /// Cancel all registrations.
    pub fn shutdown(&self) {
        let jobs = std::mem::take(&mut *self.lock());
        for (_, job) in jobs {
            job.cancel();
        }
    }
}

fn join_times(times: &[TimeOfDay]) -> String {
    times
        .iter()
        .map(TimeOfDay::to_string)
        .collect::<Vec<_>>()
        .join(",")
}
