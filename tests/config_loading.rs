// tests/config_loading.rs

mod common;
use crate::common::TestResult;

use std::io::Write;
use std::time::Duration;

use tempfile::NamedTempFile;

use maaflow::config::{load_and_validate, load_from_fs, parse_duration, ConfigFile};
use maaflow::errors::MaaflowError;
use maaflow::fs::mock::MockFileSystem;
use maaflow::trigger::TimeOfDay;
use maaflow::types::TaskKind;

fn write_config(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{contents}").unwrap();
    file
}

#[test]
fn full_config_is_parsed_and_validated() -> TestResult {
    let file = write_config(
        r#"
[config]
maa_bin = "/opt/maa/bin/maa"
config_dir = "/tmp/maa-config"
adb_address = "127.0.0.1:5555"
log_buffer_capacity = 200

[config.timings]
startup_wait = "20s"
stage_pause = "500ms"

[flow.daily]
name = "Daily routine"
times = ["08:00", "20:30"]

[[flow.daily.task]]
id = "1"
command = "startup"
name = "Start game"
params = { client = "Official" }

[[flow.daily.task]]
id = "2"
command = "fight"
name = "Farm"
params = { stage = "1-7:3,CE-6", medicine = 2 }

[[flow.daily.task]]
id = "3"
command = "Recruit"
name = "Recruit"
enabled = false
"#,
    );

    let cfg = load_and_validate(file.path())?;
    assert_eq!(cfg.config.maa_bin, "/opt/maa/bin/maa");
    assert_eq!(cfg.config.log_buffer_capacity, 200);
    assert_eq!(cfg.timings.startup_wait, Duration::from_secs(20));
    assert_eq!(cfg.timings.stage_pause, Duration::from_millis(500));
    // Unset timings keep their defaults.
    assert_eq!(cfg.timings.kill_grace, Duration::from_secs(3));
    assert_eq!(cfg.timings.startup_retries, 2);

    let flow = cfg.flow("daily").expect("flow present");
    assert_eq!(flow.name, "Daily routine");
    assert_eq!(
        flow.times,
        vec![TimeOfDay::new(8, 0).unwrap(), TimeOfDay::new(20, 30).unwrap()]
    );
    assert_eq!(flow.tasks.len(), 3);
    assert_eq!(flow.tasks[1].kind(), TaskKind::Fight);
    assert_eq!(flow.tasks[2].kind(), TaskKind::Declarative);
    assert_eq!(flow.enabled_tasks().count(), 2);
    Ok(())
}

#[test]
fn flow_name_defaults_to_id() -> TestResult {
    let file = write_config(
        r#"
[flow.evening]

[[flow.evening.task]]
id = "1"
command = "closedown"
name = "Close"
"#,
    );

    let cfg = load_and_validate(file.path())?;
    let flow = cfg.flow("evening").unwrap();
    assert_eq!(flow.name, "evening");
    assert!(flow.times.is_empty());
    assert_eq!(cfg.config.maa_bin, "maa");
    assert_eq!(cfg.config.activity_placeholder, "HD");
    Ok(())
}

#[test]
fn invalid_time_is_rejected() {
    let file = write_config(
        r#"
[flow.daily]
times = ["25:00"]

[[flow.daily.task]]
id = "1"
command = "startup"
name = "Start"
"#,
    );

    match load_and_validate(file.path()) {
        Err(MaaflowError::ConfigError(msg)) => {
            assert!(msg.contains("25:00"), "unexpected message: {msg}");
        }
        other => panic!("expected ConfigError, got {other:?}"),
    }
}

#[test]
fn duplicate_step_ids_are_rejected() {
    let file = write_config(
        r#"
[flow.daily]

[[flow.daily.task]]
id = "1"
command = "startup"
name = "Start"

[[flow.daily.task]]
id = "1"
command = "closedown"
name = "Close"
"#,
    );

    match load_and_validate(file.path()) {
        Err(MaaflowError::ConfigError(msg)) => assert!(msg.contains("duplicate step id")),
        other => panic!("expected ConfigError, got {other:?}"),
    }
}

#[test]
fn config_without_flows_is_rejected() {
    let file = write_config("[config]\nmaa_bin = \"maa\"\n");
    assert!(matches!(
        load_and_validate(file.path()),
        Err(MaaflowError::ConfigError(_))
    ));
}

#[test]
fn bad_duration_names_the_field() {
    let file = write_config(
        r#"
[config.timings]
stage_pause = "soon"

[flow.daily]

[[flow.daily.task]]
id = "1"
command = "startup"
name = "Start"
"#,
    );

    match load_and_validate(file.path()) {
        Err(MaaflowError::ConfigError(msg)) => assert!(msg.contains("stage_pause")),
        other => panic!("expected ConfigError, got {other:?}"),
    }
}

#[test]
fn malformed_toml_is_a_toml_error() {
    let file = write_config("[flow.daily\n");
    assert!(matches!(
        load_and_validate(file.path()),
        Err(MaaflowError::TomlError(_))
    ));
}

#[test]
fn duration_strings() {
    assert_eq!(parse_duration("15s").unwrap(), Duration::from_secs(15));
    assert_eq!(parse_duration("500ms").unwrap(), Duration::from_millis(500));
    assert_eq!(parse_duration("2m").unwrap(), Duration::from_secs(120));
    assert!(parse_duration("").is_err());
    assert!(parse_duration("fast").is_err());
}

#[test]
fn config_is_read_through_the_filesystem() -> TestResult {
    let fs = MockFileSystem::new();
    fs.add_file(
        "/etc/maaflow/Maaflow.toml",
        r#"
[flow.evening]
times = ["21:00"]

[[flow.evening.task]]
id = "1"
command = "closedown"
name = "Close game"
"#,
    );

    let raw = load_from_fs(&fs, "/etc/maaflow/Maaflow.toml")?;
    let cfg = ConfigFile::try_from(raw)?;
    assert_eq!(cfg.flow("evening").map(|f| f.tasks.len()), Some(1));

    let missing = load_from_fs(&fs, "/etc/maaflow/other.toml");
    assert!(missing.is_err());
    Ok(())
}
