// tests/process_runner.rs
#![cfg(unix)]

mod common;
use crate::common::builders::{FlowBuilder, TaskBuilder};
use crate::common::{fast_timings, init_tracing, with_timeout, TestResult};

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use maaflow::exec::{
    spawn_process, Invocation, OutputStream, ProcessBackend, RealProcessBackend, SpawnedProcess,
};
use maaflow::flow::{FlowOrchestrator, OrchestratorSettings};
use maaflow::state::TaskStateTracker;
use maaflow::types::RecordLevel;

fn sh(script: &str) -> Invocation {
    Invocation::new("sh", vec!["-c".to_string(), script.to_string()])
}

async fn drain(spawned: &mut SpawnedProcess) -> Vec<maaflow::exec::OutputLine> {
    let mut lines = Vec::new();
    while let Some(line) = spawned.output.recv().await {
        lines.push(line);
    }
    lines
}

#[tokio::test]
async fn captures_both_streams_and_exit_code() -> TestResult {
    init_tracing();
    let mut spawned = spawn_process(
        &sh("echo 'INFO hello'; echo 'WARN careful' >&2; echo 'ERROR broken'; exit 3"),
        Duration::from_secs(1),
    )?;
    assert!(spawned.handle.pid().is_some());

    let lines = with_timeout(drain(&mut spawned)).await;
    let exit = with_timeout(spawned.exit).await?;
    assert_eq!(exit.code, 3);
    assert!(!exit.killed);
    assert!(!exit.success());

    let find = |text: &str| lines.iter().find(|l| l.text == text).cloned();
    let hello = find("INFO hello").expect("stdout line");
    assert_eq!(hello.stream, OutputStream::Stdout);
    assert_eq!(hello.level, RecordLevel::Info);

    let careful = find("WARN careful").expect("stderr line");
    assert_eq!(careful.stream, OutputStream::Stderr);
    assert_eq!(careful.level, RecordLevel::Warn);

    assert_eq!(find("ERROR broken").map(|l| l.level), Some(RecordLevel::Error));
    Ok(())
}

#[tokio::test]
async fn stdout_order_is_preserved() -> TestResult {
    let mut spawned = spawn_process(
        &sh("for i in 1 2 3 4 5; do echo line$i; done"),
        Duration::from_secs(1),
    )?;
    let lines = with_timeout(drain(&mut spawned)).await;
    let texts: Vec<_> = lines.iter().map(|l| l.text.as_str()).collect();
    assert_eq!(texts, vec!["line1", "line2", "line3", "line4", "line5"]);
    assert!(with_timeout(spawned.exit).await?.success());
    Ok(())
}

#[tokio::test]
async fn invalid_utf8_does_not_end_capture() -> TestResult {
    let mut spawned = spawn_process(
        &sh("printf 'bad \\377 byte\\nafter\\n'"),
        Duration::from_secs(1),
    )?;
    let lines = with_timeout(drain(&mut spawned)).await;
    assert_eq!(lines.len(), 2);
    assert!(lines[0].text.starts_with("bad "));
    assert_eq!(lines[1].text, "after");
    Ok(())
}

#[tokio::test]
async fn graceful_kill_stops_a_long_process() -> TestResult {
    let mut spawned = spawn_process(
        &Invocation::new("sleep", vec!["30".to_string()]),
        Duration::from_millis(500),
    )?;
    let started = Instant::now();
    assert!(spawned.handle.kill(true));

    with_timeout(drain(&mut spawned)).await;
    let exit = with_timeout(spawned.exit).await?;
    assert!(exit.killed);
    assert!(started.elapsed() < Duration::from_secs(5));
    Ok(())
}

#[tokio::test]
async fn term_ignoring_process_is_force_killed() -> TestResult {
    let mut spawned = spawn_process(
        &sh("trap '' TERM; echo ready; while true; do sleep 1; done"),
        Duration::from_millis(200),
    )?;

    let first = with_timeout(spawned.output.recv()).await;
    assert_eq!(first.map(|l| l.text), Some("ready".to_string()));
    assert!(spawned.handle.kill(true));

    let exit = with_timeout(spawned.exit).await?;
    assert!(exit.killed);
    Ok(())
}

#[tokio::test]
async fn missing_binary_is_a_spawn_error() {
    let result = spawn_process(
        &Invocation::new("/nonexistent/maa-binary", Vec::new()),
        Duration::from_secs(1),
    );
    let err = result.expect_err("spawn should fail");
    assert!(format!("{err:#}").contains("/nonexistent/maa-binary"));
}

#[tokio::test]
async fn real_backend_spawns_through_the_trait() -> TestResult {
    let backend = RealProcessBackend::new(Duration::from_secs(1), "adb", None);
    let mut spawned = backend.spawn(sh("echo via-backend")).await?;
    let lines = with_timeout(drain(&mut spawned)).await;
    assert_eq!(lines[0].text, "via-backend");
    assert!(with_timeout(spawned.exit).await?.success());
    Ok(())
}

#[tokio::test]
async fn screenshot_fails_without_adb() {
    let backend = RealProcessBackend::new(Duration::from_secs(1), "/nonexistent/adb", None);
    assert!(backend.screenshot().await.is_err());
}

#[tokio::test]
async fn kill_reaches_background_children() -> TestResult {
    let mut spawned = spawn_process(
        &sh("sleep 30 & echo ready; wait"),
        Duration::from_millis(500),
    )?;
    let first = with_timeout(spawned.output.recv()).await;
    assert_eq!(first.map(|l| l.text), Some("ready".to_string()));

    assert!(spawned.handle.kill(true));
    // The background sleep shares the pipes; it has to die too for EOF.
    with_timeout(drain(&mut spawned)).await;
    assert!(with_timeout(spawned.exit).await?.killed);
    Ok(())
}

fn write_script(dir: &Path, body: &str) -> std::io::Result<PathBuf> {
    let path = dir.join("fake-maa");
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n"))?;
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))?;
    Ok(path)
}

fn real_orchestrator(maa_bin: &Path, config_dir: &Path) -> FlowOrchestrator {
    let timings = fast_timings();
    let settings = OrchestratorSettings {
        maa_bin: maa_bin.display().to_string(),
        config_dir: config_dir.to_path_buf(),
        timings,
    };
    let backend = Arc::new(RealProcessBackend::new(
        timings.kill_grace,
        "/nonexistent/adb",
        None,
    ));
    FlowOrchestrator::new(
        backend,
        TaskStateTracker::new(100, Duration::from_secs(60)),
        settings,
    )
}

fn copilot_flow() -> maaflow::config::FlowDefinition {
    FlowBuilder::new("copilot")
        .step(TaskBuilder::new("1", "copilot", "Copilot").param("uri", "maa://1"))
        .build()
}

#[tokio::test]
async fn step_ends_when_binary_exits_despite_open_pipes() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let script = write_script(dir.path(), "sleep 10 &\necho \"copilot done\"\nexit 0")?;
    let orchestrator = real_orchestrator(&script, dir.path());

    let started = Instant::now();
    let report = with_timeout(orchestrator.run("copilot-0", &copilot_flow())).await?;
    assert!(started.elapsed() < Duration::from_secs(3));
    assert_eq!(report.success_count, 1);

    assert!(!orchestrator.tracker().is_running());
    assert!(!orchestrator.is_busy());
    let logs = orchestrator.tracker().snapshot().logs;
    assert!(logs.iter().any(|r| r.message == "copilot done"));
    Ok(())
}

#[tokio::test]
async fn stop_frees_the_slot_when_children_hold_the_pipes() -> TestResult {
    let dir = tempfile::tempdir()?;
    let script = write_script(dir.path(), "sleep 30 &\nsleep 30")?;
    let orchestrator = real_orchestrator(&script, dir.path());

    let background = orchestrator.clone();
    let running =
        tokio::spawn(async move { background.run("copilot-0", &copilot_flow()).await });

    with_timeout(async {
        while !orchestrator.tracker().is_running() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(orchestrator.stop());

    let report = with_timeout(running).await??;
    assert_eq!(report.failed_count, 1);
    assert!(!orchestrator.tracker().is_running());
    assert!(!orchestrator.is_busy());
    Ok(())
}
