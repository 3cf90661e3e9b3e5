// src/exec/process.rs

//! Spawning and supervising a single `maa` process.

use std::fmt;
use std::process::Stdio;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::types::RecordLevel;

/// Capacity of the per-process output line queue. Readers wait when the
/// consumer falls behind; the child is never blocked by the caller.
pub const OUTPUT_QUEUE_CAPACITY: usize = 256;

/// Program plus arguments to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
}

impl Invocation {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

/// One captured line of output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLine {
    pub stream: OutputStream,
    pub level: RecordLevel,
    pub text: String,
}

impl OutputLine {
    pub fn new(stream: OutputStream, text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            stream,
            level: RecordLevel::for_line(&text),
            text,
        }
    }
}

/// How a process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitReport {
    /// Exit code, `-1` when the process was terminated by a signal or its
    /// status could not be read.
    pub code: i32,
    /// The process was stopped through its [`ProcessHandle`].
    pub killed: bool,
}

impl ExitReport {
    pub fn success(&self) -> bool {
        self.code == 0 && !self.killed
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KillMode {
    /// SIGTERM, then a forced kill once the grace period elapses.
    Graceful,
    Force,
}

/// Cloneable handle that can stop a running process.
#[derive(Debug, Clone)]
pub struct ProcessHandle {
    pid: Option<u32>,
    kill_tx: mpsc::UnboundedSender<KillMode>,
}

/// Receiving side of a [`ProcessHandle`], owned by whoever supervises the
/// process (the real supervisor below, or a fake backend in tests).
#[derive(Debug)]
pub struct KillRequests {
    rx: mpsc::UnboundedReceiver<KillMode>,
}

impl ProcessHandle {
    pub fn channel(pid: Option<u32>) -> (Self, KillRequests) {
        let (kill_tx, rx) = mpsc::unbounded_channel();
        (Self { pid, kill_tx }, KillRequests { rx })
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Ask the process to stop. Returns `false` if it already finished.
    pub fn kill(&self, graceful: bool) -> bool {
        let mode = if graceful {
            KillMode::Graceful
        } else {
            KillMode::Force
        };
        self.kill_tx.send(mode).is_ok()
    }
}

impl KillRequests {
    pub async fn recv(&mut self) -> Option<KillMode> {
        self.rx.recv().await
    }
}

/// A started process: its kill handle, its output queue and its exit report.
///
/// The output channel closes once both stdout and stderr reached EOF, so
/// consumers drain `output` first and then await `exit`.
#[derive(Debug)]
pub struct SpawnedProcess {
    pub handle: ProcessHandle,
    pub output: mpsc::Receiver<OutputLine>,
    pub exit: oneshot::Receiver<ExitReport>,
}

/// Spawn `invocation` with piped output and start supervising it.
pub fn spawn_process(invocation: &Invocation, kill_grace: Duration) -> Result<SpawnedProcess> {
    info!(cmd = %invocation, "starting process");

    let mut cmd = Command::new(&invocation.program);
    cmd.args(&invocation.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    // Own process group, so a kill also reaches helpers the binary started.
    #[cfg(unix)]
    cmd.process_group(0);

    let mut child = cmd
        .spawn()
        .with_context(|| format!("spawning '{}'", invocation.program))?;

    let (line_tx, line_rx) = mpsc::channel(OUTPUT_QUEUE_CAPACITY);
    if let Some(stdout) = child.stdout.take() {
        spawn_line_reader(stdout, OutputStream::Stdout, line_tx.clone());
    }
    if let Some(stderr) = child.stderr.take() {
        spawn_line_reader(stderr, OutputStream::Stderr, line_tx.clone());
    }
    drop(line_tx);

    let (handle, kills) = ProcessHandle::channel(child.id());
    let (exit_tx, exit_rx) = oneshot::channel();
    let program = invocation.program.clone();

    tokio::spawn(async move {
        let report = supervise(child, kills, kill_grace).await;
        info!(
            program = %program,
            exit_code = report.code,
            killed = report.killed,
            "process exited"
        );
        let _ = exit_tx.send(report);
    });

    Ok(SpawnedProcess {
        handle,
        output: line_rx,
        exit: exit_rx,
    })
}

/// Read `reader` line by line into the output queue. Invalid UTF-8 is
/// replaced rather than ending the capture, so the pipe never fills up.
fn spawn_line_reader<R>(reader: R, stream: OutputStream, tx: mpsc::Sender<OutputLine>)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(reader);
        let mut buf = Vec::new();

        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => {
                    let text = String::from_utf8_lossy(&buf);
                    let text = text.trim_end_matches(['\r', '\n']);
                    if tx.send(OutputLine::new(stream, text)).await.is_err() {
                        // Consumer went away; keep draining so the child
                        // does not block on a full pipe.
                        continue;
                    }
                }
                Err(e) => {
                    debug!(?stream, error = %e, "output reader stopped");
                    break;
                }
            }
        }
    });
}

async fn supervise(mut child: Child, mut kills: KillRequests, grace: Duration) -> ExitReport {
    tokio::select! {
        status = child.wait() => exit_report(status, false),
        request = kills.recv() => match request {
            Some(mode) => terminate(&mut child, mode, grace).await,
            // Every handle was dropped; nobody can stop it any more.
            None => exit_report(child.wait().await, false),
        },
    }
}

async fn terminate(child: &mut Child, mode: KillMode, grace: Duration) -> ExitReport {
    if mode == KillMode::Graceful && signal_group(child, Signal::Terminate) {
        info!(grace_ms = grace.as_millis() as u64, "sent SIGTERM; waiting for exit");
        match tokio::time::timeout(grace, child.wait()).await {
            Ok(status) => return exit_report(status, true),
            Err(_) => info!("process still running after grace period; forcing kill"),
        }
    }

    signal_group(child, Signal::Kill);
    if let Err(e) = child.kill().await {
        warn!(error = %e, "failed to kill child process");
    }
    let status = child.try_wait().ok().flatten();
    ExitReport {
        code: status.and_then(|s| s.code()).unwrap_or(-1),
        killed: true,
    }
}

fn exit_report(status: std::io::Result<std::process::ExitStatus>, killed: bool) -> ExitReport {
    match status {
        Ok(status) => ExitReport {
            code: status.code().unwrap_or(-1),
            killed,
        },
        Err(e) => {
            warn!(error = %e, "could not read process exit status");
            ExitReport { code: -1, killed }
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Signal {
    Terminate,
    Kill,
}

/// Send `signal` to the child's process group. Returns `false` if the child
/// was already reaped or the signal could not be sent.
#[cfg(unix)]
fn signal_group(child: &Child, signal: Signal) -> bool {
    let Some(pid) = child.id() else {
        return false;
    };
    let signal = match signal {
        Signal::Terminate => libc::SIGTERM,
        Signal::Kill => libc::SIGKILL,
    };
    // SAFETY: the child leads its own group (`process_group(0)`) and has not
    // been reaped yet (`id()` returns `None` after that), so the group id is
    // ours.
    let rc = unsafe { libc::kill(-(pid as libc::pid_t), signal) };
    rc == 0
}

#[cfg(not(unix))]
fn signal_group(_child: &Child, _signal: Signal) -> bool {
    false
}
