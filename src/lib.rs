// src/lib.rs

pub mod classify;
pub mod cli;
pub mod command;
pub mod config;
pub mod control;
pub mod errors;
pub mod exec;
pub mod flow;
pub mod fs;
pub mod logging;
pub mod notify;
pub mod state;
pub mod trigger;
pub mod types;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use crate::cli::CliArgs;
use crate::command::{build, build_stage, stages_from_params};
use crate::config::{load_and_validate, ConfigFile};
use crate::control::{Controller, RunFlowResponse};
use crate::errors::MaaflowError;
use crate::exec::RealProcessBackend;
use crate::flow::{ActivityCache, FlowOrchestrator, HttpActivitySource, OrchestratorSettings};
use crate::state::TaskStateTracker;
use crate::trigger::TriggerRegistry;
use crate::types::TaskKind;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading
/// - process backend, task state and orchestrator
/// - daily triggers for every flow with `times`
/// - an optional immediate run (`--run`)
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = PathBuf::from(&args.config);
    let cfg = Arc::new(load_and_validate(&config_path)?);

    if args.dry_run {
        print_dry_run(&cfg);
        return Ok(());
    }

    let orchestrator = build_orchestrator(&cfg);
    let controller = Controller::new(orchestrator.clone(), Arc::clone(&cfg));
    spawn_progress_logger(&orchestrator);

    if let Some(flow_id) = &args.run {
        let flow = cfg
            .flow(flow_id)
            .ok_or_else(|| MaaflowError::FlowNotFound(flow_id.clone()))?;

        if args.once {
            let stopper = controller.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("Ctrl+C received; stopping flow");
                    stopper.stop();
                }
            });

            let report = orchestrator
                .run(&format!("manual-{flow_id}"), flow)
                .await
                .context("starting flow")?;
            info!(
                flow = %flow_id,
                success = report.success_count,
                failed = report.failed_count,
                skipped = report.skipped_count,
                "single run complete"
            );
            return Ok(());
        }

        match controller.run_flow(flow_id) {
            RunFlowResponse::Accepted => info!(flow = %flow_id, "flow started"),
            RunFlowResponse::Rejected(reason) => warn!(flow = %flow_id, %reason, "flow rejected"),
        }
    }

    let registry = TriggerRegistry::new(orchestrator.clone());
    for flow in cfg.flows.values().filter(|f| !f.times.is_empty()) {
        let registration = registry.schedule_flow(flow)?;
        for (time, at) in registration.times.iter().zip(&registration.next_fires) {
            info!(flow = %flow.id, %time, next = %at, "daily trigger armed");
        }
    }
    if registry.schedule_ids().is_empty() && args.run.is_none() {
        warn!("no flow has trigger times; waiting for Ctrl+C");
    }

    tokio::signal::ctrl_c()
        .await
        .context("listening for Ctrl+C")?;
    info!("shutting down");

    registry.shutdown();
    if controller.stop() {
        let deadline = cfg.timings.kill_grace + Duration::from_secs(2);
        let idle = async {
            while orchestrator.is_busy() {
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
        };
        if tokio::time::timeout(deadline, idle).await.is_err() {
            warn!("flow did not stop in time; exiting anyway");
        }
    }

    Ok(())
}

fn build_orchestrator(cfg: &ConfigFile) -> FlowOrchestrator {
    let backend = Arc::new(RealProcessBackend::new(
        cfg.timings.kill_grace,
        cfg.config.adb_bin.clone(),
        cfg.config.adb_address.clone(),
    ));
    let tracker = TaskStateTracker::new(cfg.config.log_buffer_capacity, cfg.timings.log_retention);
    let orchestrator =
        FlowOrchestrator::new(backend, tracker, OrchestratorSettings::from_config(cfg));

    match &cfg.config.activity_feed {
        Some(feed) => {
            let source = Arc::new(HttpActivitySource::new(feed, &cfg.config.client_type));
            orchestrator.with_activity(ActivityCache::new(source, &cfg.config.activity_placeholder))
        }
        None => orchestrator,
    }
}

/// Mirror progress events into the log.
fn spawn_progress_logger(orchestrator: &FlowOrchestrator) {
    let mut rx = orchestrator.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => info!(
                    schedule_id = %event.schedule_id,
                    step = event.current_step,
                    total = event.total_steps,
                    task = event.current_task_name.as_deref().unwrap_or("-"),
                    "{}",
                    event.message
                ),
                Err(RecvError::Lagged(missed)) => debug!(missed, "progress logger lagged"),
                Err(RecvError::Closed) => break,
            }
        }
    });
}

/// Print flows and the command lines their steps would run.
fn print_dry_run(cfg: &ConfigFile) {
    println!("maaflow dry-run");
    println!("  config.maa_bin = {}", cfg.config.maa_bin);
    println!("  config_dir = {}", cfg.config.resolved_config_dir().display());
    println!();

    println!("flows ({}):", cfg.flows.len());
    for (id, flow) in &cfg.flows {
        println!("  - {id} ({})", flow.name);
        if !flow.times.is_empty() {
            let times: Vec<String> = flow.times.iter().map(|t| t.to_string()).collect();
            println!("      times: {}", times.join(", "));
        }

        for task in &flow.tasks {
            let marker = if task.enabled { "" } else { " [disabled]" };
            println!("      {}. {} ({}){marker}", task.id, task.name, task.kind());

            let stages = stages_from_params(task.params.get("stage"), task.params.get("times"));
            if task.kind() == TaskKind::Fight && stages.len() > 1 {
                for stage in &stages {
                    println!("           {} {}", cfg.config.maa_bin, build_stage(task, stage));
                }
                continue;
            }

            match build(task) {
                Ok(cmd) => println!("           {} {cmd}", cfg.config.maa_bin),
                Err(e) => println!("           error: {e}"),
            }
        }
    }

    debug!("dry-run complete (no execution)");
}
