// src/exec/mod.rs

//! Process execution layer.
//!
//! This module is responsible for actually running the `maa` binary, using
//! `tokio::process::Command`, and handing its output back as a stream of
//! lines. It knows nothing about what the steps mean.
//!
//! - [`process`] spawns a child, captures stdout/stderr into a bounded
//!   queue, and implements graceful-then-forced kills.
//! - [`backend`] provides the `ProcessBackend` trait and the concrete
//!   `RealProcessBackend` used in production, which tests replace with a
//!   scripted implementation.

use std::future::Future;
use std::pin::Pin;

pub mod backend;
pub mod process;

pub use backend::{ProcessBackend, RealProcessBackend};
pub use process::{
    spawn_process, ExitReport, Invocation, KillMode, KillRequests, OutputLine, OutputStream,
    ProcessHandle, SpawnedProcess,
};

/// Boxed future returned by backend trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
