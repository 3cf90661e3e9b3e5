// tests/control_interface.rs

mod common;
use crate::common::builders::{ConfigFileBuilder, TaskBuilder};
use crate::common::{
    init_tracing, with_timeout, FailingNotifier, RecordingNotifier, ScriptedBackend, ScriptedRun,
    TestResult, TestRig,
};

use std::sync::Arc;
use std::time::Duration;

use maaflow::control::{Controller, RunFlowResponse};
use maaflow::flow::CompletionReport;
use maaflow::notify::{FanoutNotifier, Notifier};

fn controller(rig: &TestRig) -> Controller {
    let config = ConfigFileBuilder::new()
        .with_flow(
            "daily",
            &["08:00"],
            vec![
                TaskBuilder::new("1", "Mall", "Shop").build(),
                TaskBuilder::new("2", "Award", "Rewards").build(),
            ],
        )
        .build();
    Controller::new(rig.orchestrator.clone(), Arc::new(config))
}

async fn wait_until_idle(rig: &TestRig) {
    with_timeout(async {
        while rig.orchestrator.is_busy() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
}

#[tokio::test]
async fn run_flow_is_accepted_and_runs_in_background() -> TestResult {
    init_tracing();
    let rig = TestRig::new(ScriptedBackend::new());
    let control = controller(&rig);

    assert_eq!(control.run_flow("daily"), RunFlowResponse::Accepted);
    wait_until_idle(&rig).await;

    let report = rig.notifier.last().expect("completion report");
    assert_eq!(report.task_name, "daily");
    assert_eq!(report.success_tasks, 2);
    assert_eq!(rig.backend.invocations().len(), 2);
    Ok(())
}

#[tokio::test]
async fn unknown_flow_is_rejected() -> TestResult {
    let rig = TestRig::new(ScriptedBackend::new());
    let control = controller(&rig);

    assert_eq!(
        control.run_flow("weekly"),
        RunFlowResponse::Rejected("unknown flow 'weekly'".to_string())
    );
    assert!(rig.backend.invocations().is_empty());
    Ok(())
}

#[tokio::test]
async fn busy_run_flow_is_rejected_and_stop_ends_it() -> TestResult {
    let rig = TestRig::new(ScriptedBackend::new().then(ScriptedRun::hang(&["INFO working"])));
    let control = controller(&rig);
    assert!(!control.stop());

    assert_eq!(control.run_flow("daily"), RunFlowResponse::Accepted);
    with_timeout(async {
        while !rig.orchestrator.tracker().is_running() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;

    assert_eq!(
        control.run_flow("daily"),
        RunFlowResponse::Rejected("another flow is already running".to_string())
    );

    let status = control.status();
    assert!(status.task.running);
    assert_eq!(status.task.name.as_deref(), Some("Shop"));
    assert!(status.schedule.is_running);
    assert_eq!(status.schedule.schedule_id.as_deref(), Some("manual-daily"));
    assert_eq!(status.schedule.current_step_index, 0);
    assert_eq!(status.schedule.total_steps, 2);

    assert!(control.stop());
    wait_until_idle(&rig).await;

    let report = rig.notifier.last().expect("completion report");
    assert_eq!(report.failed_tasks, 1);
    assert_eq!(report.skipped_tasks, 1);
    assert!(!control.status().schedule.is_running);
    Ok(())
}

#[test]
fn run_flow_response_serializes_with_a_tag() -> TestResult {
    let accepted = serde_json::to_value(RunFlowResponse::Accepted)?;
    assert_eq!(accepted, serde_json::json!({ "result": "accepted" }));

    let rejected = serde_json::to_value(RunFlowResponse::Rejected("busy".into()))?;
    assert_eq!(
        rejected,
        serde_json::json!({ "result": "rejected", "reason": "busy" })
    );
    Ok(())
}

#[tokio::test]
async fn fanout_keeps_going_past_a_failing_channel() -> TestResult {
    let recorder = Arc::new(RecordingNotifier::new());
    let fanout = FanoutNotifier::new()
        .with(Arc::new(FailingNotifier))
        .with(recorder.clone());
    assert_eq!(fanout.len(), 2);

    let report = CompletionReport::from_flow("daily", &Default::default());
    fanout.notify(&report).await?;

    assert_eq!(recorder.reports(), vec![report]);
    Ok(())
}
