// src/exec/backend.rs

//! Pluggable process backend abstraction.
//!
//! The orchestrator talks to a `ProcessBackend` instead of spawning
//! processes itself. This makes it easy to swap in a scripted backend in
//! tests while keeping the production implementation in [`process`].
//!
//! - `RealProcessBackend` spawns the configured binary and takes screenshots
//!   through `adb`.
//! - Tests can provide their own `ProcessBackend` that, for example, records
//!   invocations and replays canned output.
//!
//! [`process`]: super::process

use std::time::Duration;

use anyhow::{bail, Context, Result};
use tokio::process::Command;
use tracing::debug;

use crate::exec::process::{spawn_process, Invocation, SpawnedProcess};
use crate::exec::BoxFuture;

/// Trait abstracting how the automation binary is run.
pub trait ProcessBackend: Send + Sync {
    /// Start `invocation`. Failing to launch is an error; a non-zero exit is
    /// reported through [`SpawnedProcess::exit`].
    fn spawn(&self, invocation: Invocation) -> BoxFuture<'_, Result<SpawnedProcess>>;

    /// Capture the device screen as PNG bytes. Doubles as a liveness check.
    fn screenshot(&self) -> BoxFuture<'_, Result<Vec<u8>>>;
}

/// Real backend used in production.
#[derive(Debug, Clone)]
pub struct RealProcessBackend {
    kill_grace: Duration,
    adb_bin: String,
    adb_address: Option<String>,
}

impl RealProcessBackend {
    pub fn new(kill_grace: Duration, adb_bin: impl Into<String>, adb_address: Option<String>) -> Self {
        Self {
            kill_grace,
            adb_bin: adb_bin.into(),
            adb_address,
        }
    }
}

impl ProcessBackend for RealProcessBackend {
    fn spawn(&self, invocation: Invocation) -> BoxFuture<'_, Result<SpawnedProcess>> {
        let grace = self.kill_grace;
        Box::pin(async move { spawn_process(&invocation, grace) })
    }

    fn screenshot(&self) -> BoxFuture<'_, Result<Vec<u8>>> {
        Box::pin(async move {
            let mut cmd = Command::new(&self.adb_bin);
            if let Some(address) = &self.adb_address {
                cmd.arg("-s").arg(address);
            }
            cmd.args(["exec-out", "screencap", "-p"]).kill_on_drop(true);

            let output = cmd
                .output()
                .await
                .with_context(|| format!("running '{}' for a screenshot", self.adb_bin))?;

            if !output.status.success() {
                bail!(
                    "screencap exited with {}: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                );
            }
            if output.stdout.is_empty() {
                bail!("screencap returned no data");
            }

            debug!(bytes = output.stdout.len(), "captured screenshot");
            Ok(output.stdout)
        })
    }
}
