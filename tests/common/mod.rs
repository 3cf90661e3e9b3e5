#![allow(dead_code)]

pub use maaflow_test_utils::builders;
pub use maaflow_test_utils::fake_backend::{ScriptedBackend, ScriptedRun, FAKE_PNG};
pub use maaflow_test_utils::notifier::{FailingNotifier, RecordingNotifier};
pub use maaflow_test_utils::{fast_timings, init_tracing, with_timeout, TestRig};

pub type TestResult = Result<(), Box<dyn std::error::Error>>;
