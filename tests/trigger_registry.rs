// tests/trigger_registry.rs

mod common;
use crate::common::builders::{FlowBuilder, TaskBuilder};
use crate::common::{init_tracing, with_timeout, ScriptedBackend, ScriptedRun, TestResult, TestRig};

use std::time::Duration;

use chrono::Local;
use maaflow::errors::MaaflowError;
use maaflow::flow::FlowRejected;
use maaflow::trigger::{TimeOfDay, TriggerRegistry};

fn t(raw: &str) -> TimeOfDay {
    raw.parse().expect("valid time")
}

fn daily_flow() -> maaflow::config::FlowDefinition {
    FlowBuilder::new("daily")
        .at("08:00")
        .step(TaskBuilder::new("1", "Mall", "Shop"))
        .build()
}

#[tokio::test]
async fn rescheduling_replaces_every_entry() -> TestResult {
    init_tracing();
    let rig = TestRig::new(ScriptedBackend::new());
    let registry = TriggerRegistry::new(rig.orchestrator.clone());

    let first = registry.schedule("daily", ["08:00", "20:00"], daily_flow())?;
    assert_eq!(first.times, vec![t("08:00"), t("20:00")]);
    assert_eq!(first.next_fires.len(), 2);
    assert!(first.next_fires.iter().all(|at| *at > Local::now()));

    registry.schedule("daily", ["09:00"], daily_flow())?;
    assert_eq!(registry.active_times("daily"), Some(vec![t("09:00")]));
    assert_eq!(registry.schedule_ids(), vec!["daily".to_string()]);
    assert_eq!(registry.flow_of("daily").as_deref(), Some("daily"));
    Ok(())
}

#[tokio::test]
async fn invalid_times_keep_the_previous_registration() -> TestResult {
    let rig = TestRig::new(ScriptedBackend::new());
    let registry = TriggerRegistry::new(rig.orchestrator.clone());
    registry.schedule("daily", ["08:00", "20:00"], daily_flow())?;

    for bad in [["09:00", "25:00"], ["9am", "10:00"], ["08:60", "10:00"]] {
        match registry.schedule("daily", bad, daily_flow()) {
            Err(MaaflowError::InvalidTime(raw)) => assert!(bad.contains(&raw.as_str())),
            other => panic!("expected InvalidTime, got {other:?}"),
        }
    }
    assert_eq!(
        registry.active_times("daily"),
        Some(vec![t("08:00"), t("20:00")])
    );
    Ok(())
}

#[tokio::test]
async fn unschedule_and_shutdown() -> TestResult {
    let rig = TestRig::new(ScriptedBackend::new());
    let registry = TriggerRegistry::new(rig.orchestrator.clone());

    registry.schedule_flow(&daily_flow())?;
    registry.schedule("evening", ["21:30"], daily_flow())?;
    assert_eq!(
        registry.schedule_ids(),
        vec!["daily".to_string(), "evening".to_string()]
    );

    assert!(registry.unschedule("daily"));
    assert!(!registry.unschedule("daily"));
    assert!(registry.active_times("daily").is_none());

    registry.shutdown();
    assert!(registry.schedule_ids().is_empty());
    Ok(())
}

#[tokio::test]
async fn trigger_now_runs_the_flow() -> TestResult {
    let rig = TestRig::new(ScriptedBackend::new());
    let registry = TriggerRegistry::new(rig.orchestrator.clone());

    let report = with_timeout(registry.trigger_now("daily-0", &daily_flow())).await?;
    assert_eq!(report.success_count, 1);
    assert_eq!(rig.notifier.reports().len(), 1);
    Ok(())
}

#[tokio::test]
async fn trigger_now_is_rejected_while_busy() -> TestResult {
    let rig = TestRig::new(ScriptedBackend::new().then(ScriptedRun::hang(&[])));
    let registry = TriggerRegistry::new(rig.orchestrator.clone());

    let background = registry.clone();
    let running =
        tokio::spawn(async move { background.trigger_now("daily-0", &daily_flow()).await });

    with_timeout(async {
        while !rig.orchestrator.is_busy() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;

    let second = registry.trigger_now("daily-1", &daily_flow()).await;
    assert_eq!(second.unwrap_err(), FlowRejected::Busy);

    // Wait for the process before stopping so the kill reaches it.
    with_timeout(async {
        while !rig.orchestrator.tracker().is_running() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    rig.orchestrator.stop();
    let report = with_timeout(running).await??;
    assert_eq!(report.failed_count, 1);
    Ok(())
}
