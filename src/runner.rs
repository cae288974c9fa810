//! External process execution for the stress pipeline
//!
//! One call to [`ProcessRunner::run`] is one process lifecycle: spawn, feed
//! stdin, drain stdout/stderr, wait. Failures are values, never panics; the
//! orchestrator decides whether they stop the pool.

use std::fmt;
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::constants::MAX_DIAGNOSTIC_CHARS;
use crate::template::ResolvedCommand;
use crate::utils::{format_elapsed, truncate_chars};

/// The three programs driven for every test
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Generator,
    Brute,
    Solve,
}

impl Role {
    /// All roles in resolution order
    pub const ALL: [Role; 3] = [Role::Solve, Role::Brute, Role::Generator];

    pub fn name(&self) -> &'static str {
        match self {
            Role::Generator => "generator",
            Role::Brute => "brute",
            Role::Solve => "solve",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How a process terminated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitInfo {
    Exited(i32),
    Signaled(i32),
    Unknown,
}

impl ExitInfo {
    pub fn from_status(status: ExitStatus) -> Self {
        if let Some(code) = status.code() {
            return ExitInfo::Exited(code);
        }

        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            if let Some(signal) = status.signal() {
                return ExitInfo::Signaled(signal);
            }
        }

        ExitInfo::Unknown
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ExitInfo::Exited(0))
    }
}

impl fmt::Display for ExitInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitInfo::Exited(code) => write!(f, "exited with code {}", code),
            ExitInfo::Signaled(signal) => write!(f, "killed by signal {}", signal),
            ExitInfo::Unknown => f.write_str("terminated with unknown status"),
        }
    }
}

/// Outcome of one process execution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessResult {
    /// Captured standard output
    pub output: Vec<u8>,
    /// Captured standard error, diagnostic only
    pub stderr: Vec<u8>,
    pub exit: ExitInfo,
    /// Wall-clock time from spawn to exit
    pub elapsed: Duration,
}

impl ProcessResult {
    /// A clean exit with the given output
    pub fn completed(output: impl Into<Vec<u8>>, elapsed: Duration) -> Self {
        Self {
            output: output.into(),
            stderr: Vec::new(),
            exit: ExitInfo::Exited(0),
            elapsed,
        }
    }

    pub fn is_success(&self) -> bool {
        self.exit.is_success()
    }

    /// Stderr decoded lossily and cut to a printable length
    pub fn stderr_excerpt(&self) -> String {
        truncate_chars(
            String::from_utf8_lossy(&self.stderr).trim_end(),
            MAX_DIAGNOSTIC_CHARS,
        )
    }
}

/// A failed pipeline step, identified by role and test
#[derive(Debug, Clone, thiserror::Error)]
#[error("Test #{test_id}: {role} failed: {kind}")]
pub struct PipelineError {
    pub role: Role,
    pub test_id: u64,
    pub kind: PipelineErrorKind,
}

impl PipelineError {
    pub fn new(role: Role, test_id: u64, kind: PipelineErrorKind) -> Self {
        Self { role, test_id, kind }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum PipelineErrorKind {
    #[error("failed to spawn process: {0}")]
    Spawn(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("{}{}", .exit, stderr_suffix(.stderr))]
    NonZeroExit { exit: ExitInfo, stderr: String },
}

fn stderr_suffix(stderr: &str) -> String {
    if stderr.is_empty() {
        String::new()
    } else {
        format!("\n{}", stderr)
    }
}

/// Executes one command against one stdin payload
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    async fn run(
        &self,
        role: Role,
        test_id: u64,
        command: &ResolvedCommand,
        stdin: &[u8],
    ) -> Result<ProcessResult, PipelineError>;
}

/// Runs commands as local child processes
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

#[async_trait]
impl ProcessRunner for SystemRunner {
    async fn run(
        &self,
        role: Role,
        test_id: u64,
        command: &ResolvedCommand,
        stdin: &[u8],
    ) -> Result<ProcessResult, PipelineError> {
        let fail = |kind| PipelineError::new(role, test_id, kind);
        let start = Instant::now();

        let mut process = Command::new(command.program());
        if let Some(dir) = command.dir() {
            process.current_dir(dir);
        }
        let mut child = process
            .args(command.args())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| fail(PipelineErrorKind::Spawn(e.to_string())))?;

        let mut pipe = child
            .stdin
            .take()
            .ok_or_else(|| fail(PipelineErrorKind::Io("stdin was not captured".to_string())))?;

        // Feed stdin while stdout/stderr are drained so neither side can
        // block on a full pipe buffer.
        let feed = async move {
            let result = pipe.write_all(stdin).await;
            drop(pipe);
            result
        };
        let (fed, output) = tokio::join!(feed, child.wait_with_output());

        let output = output.map_err(|e| fail(PipelineErrorKind::Io(e.to_string())))?;
        let result = ProcessResult {
            output: output.stdout,
            stderr: output.stderr,
            exit: ExitInfo::from_status(output.status),
            elapsed: start.elapsed(),
        };

        tracing::debug!(
            role = %role,
            test_id,
            exit = %result.exit,
            elapsed = %format_elapsed(result.elapsed),
            "Process finished"
        );

        if !result.is_success() {
            return Err(fail(PipelineErrorKind::NonZeroExit {
                exit: result.exit,
                stderr: result.stderr_excerpt(),
            }));
        }

        match fed {
            Ok(()) => {}
            // The child exited cleanly without reading all of its input.
            Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {
                tracing::debug!(role = %role, test_id, "Child closed stdin early");
            }
            Err(e) => return Err(fail(PipelineErrorKind::Io(e.to_string()))),
        }

        Ok(result)
    }
}
