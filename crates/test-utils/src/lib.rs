pub mod builders;
pub mod fake_backend;
pub mod notifier;

use std::path::PathBuf;
use std::sync::{Arc, Once};
use std::time::Duration;

use maaflow::config::FlowTimings;
use maaflow::flow::{FlowOrchestrator, OrchestratorSettings};
use maaflow::fs::mock::MockFileSystem;
use maaflow::state::TaskStateTracker;
use tracing_subscriber::{fmt, EnvFilter};

use crate::fake_backend::ScriptedBackend;
use crate::notifier::RecordingNotifier;

static INIT: Once = Once::new();

/// Initialise tracing for tests.
///
/// - Uses `with_test_writer()`, so logs are captured per-test.
/// - The Rust test harness only prints captured output for **failing** tests
///   (unless you run with `-- --nocapture`).
///
/// Enable levels with e.g.:
/// `RUST_LOG=debug cargo test`
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        fmt()
            .with_env_filter(filter)
            .with_test_writer() // print only for failing tests unless --nocapture
            .with_target(true)
            .init();
    });
}

/// Run a future with a 5-second timeout.
#[allow(dead_code)]
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: std::future::Future<Output = T>,
{
    tokio::time::timeout(std::time::Duration::from_secs(5), f)
        .await
        .expect("Test timed out after 5 seconds")
}

/// Timings with every delay removed, so flows run instantly.
pub fn fast_timings() -> FlowTimings {
    FlowTimings {
        startup_wait: Duration::ZERO,
        startup_retry_backoff: Duration::ZERO,
        startup_retries: 2,
        stage_pause: Duration::ZERO,
        kill_grace: Duration::from_millis(200),
        log_retention: Duration::from_millis(50),
    }
}

/// An orchestrator wired to fakes, plus handles to inspect them.
pub struct TestRig {
    pub orchestrator: FlowOrchestrator,
    pub backend: Arc<ScriptedBackend>,
    pub notifier: Arc<RecordingNotifier>,
    pub fs: MockFileSystem,
}

impl TestRig {
    pub fn new(backend: ScriptedBackend) -> Self {
        Self::with_timings(backend, fast_timings())
    }

    pub fn with_timings(backend: ScriptedBackend, timings: FlowTimings) -> Self {
        let backend = Arc::new(backend);
        let notifier = Arc::new(RecordingNotifier::new());
        let fs = MockFileSystem::new();

        let settings = OrchestratorSettings {
            maa_bin: "maa".to_string(),
            config_dir: PathBuf::from("/maa-config"),
            timings,
        };
        let tracker = TaskStateTracker::new(1000, timings.log_retention);
        backend.watch_slot(tracker.clone());
        let orchestrator = FlowOrchestrator::new(backend.clone(), tracker, settings)
            .with_fs(Arc::new(fs.clone()))
            .with_notifier(notifier.clone());

        Self {
            orchestrator,
            backend,
            notifier,
            fs,
        }
    }

    /// Pin the stage calendar to `weekday` (`0 = Sunday`).
    pub fn on_weekday(mut self, weekday: u32) -> Self {
        self.orchestrator = self.orchestrator.with_weekday(weekday);
        self
    }
}
