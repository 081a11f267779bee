//! Process runner: the single place where the engine forks.
//!
//! [`ProcessRunner::run`] executes a command line through a shell and
//! [`ProcessRunner::run_program`] executes an argv directly. Both share
//! [`run_command`], which handles pipes, output capture and the timeout.
//!
//! Every child is made the leader of its own process group. On timeout the
//! whole group is killed, so grandchildren forked by the shell do not
//! outlive the call.

use std::ffi::OsStr;
use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::task::JoinHandle;

use crate::result::{ExecutionResult, NO_EXIT_CODE};

/// Shell used for command lines when none is configured.
pub const DEFAULT_SHELL: &str = "/bin/sh";

/// Maximum stdout or stderr size captured per stream (10 MiB).
const MAX_OUTPUT_BYTES: usize = 10 * 1024 * 1024;

/// How long to wait for the output pipes to close once the direct child
/// has exited (or been killed).
const DRAIN_GRACE: Duration = Duration::from_millis(500);

/// Something that can run a shell command line to completion.
///
/// [`ProcessRunner`] is the production implementation; the remediation and
/// command paths are generic over this trait.
pub trait CommandRunner: Send + Sync {
    /// Run `command_line` through a shell, killing it after `timeout`.
    fn run(
        &self,
        command_line: &str,
        timeout: Duration,
        env: &[(String, String)],
    ) -> impl std::future::Future<Output = ExecutionResult> + Send;
}

/// Spawns host processes with bounded run time.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    shell: String,
}

impl Default for ProcessRunner {
    fn default() -> Self {
        Self::new(DEFAULT_SHELL)
    }
}

impl ProcessRunner {
    /// Create a runner that interprets command lines with `shell -c`.
    pub fn new(shell: impl Into<String>) -> Self {
        Self {
            shell: shell.into(),
        }
    }

    /// The shell used for command lines.
    pub fn shell(&self) -> &str {
        &self.shell
    }

    /// Run `program` with `args` directly, without a shell.
    ///
    /// The child runs in `working_dir` when given, else in the current
    /// directory.
    pub async fn run_program<I, S>(
        &self,
        program: impl AsRef<OsStr>,
        args: I,
        working_dir: Option<&Path>,
        timeout: Duration,
        env: &[(String, String)],
    ) -> ExecutionResult
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let label = program.as_ref().to_string_lossy().into_owned();
        let mut cmd = Command::new(program);
        cmd.args(args);
        if let Some(dir) = working_dir {
            cmd.current_dir(dir);
        }
        run_command(cmd, &label, timeout, env).await
    }
}

impl CommandRunner for ProcessRunner {
    async fn run(
        &self,
        command_line: &str,
        timeout: Duration,
        env: &[(String, String)],
    ) -> ExecutionResult {
        let mut cmd = Command::new(&self.shell);
        cmd.arg("-c").arg(command_line);
        run_command(cmd, &self.shell, timeout, env).await
    }
}

/// Spawn `cmd`, capture stdout/stderr and enforce `timeout`.
///
/// Never fails: spawn errors and timeouts become failed results.
async fn run_command(
    mut cmd: Command,
    label: &str,
    timeout: Duration,
    env: &[(String, String)],
) -> ExecutionResult {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .process_group(0);

    for (key, value) in env {
        cmd.env(key, value);
    }

    let start = Instant::now();

    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(e) => {
            tracing::warn!(program = %label, error = %e, "Failed to spawn process");
            return ExecutionResult::failure(
                format!("Failed to start {label}: {e}"),
                elapsed_ms(start),
            );
        }
    };

    // The child is its own group leader, so its pid is the group id.
    let pgid = child.id();
    tracing::debug!(program = %label, pid = ?pgid, timeout_ms = timeout.as_millis() as u64, "Process spawned");

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();
    let mut readers = tokio::spawn(async move { tokio::join!(read_stream(stdout), read_stream(stderr)) });

    match tokio::time::timeout(timeout, child.wait()).await {
        Ok(Ok(status)) => {
            let (stdout, stderr) = collect_output(&mut readers, pgid).await;
            let exit_code = status.code().unwrap_or(NO_EXIT_CODE);
            let duration_ms = elapsed_ms(start);
            tracing::debug!(
                program = %label,
                exit_code,
                duration_ms,
                stdout_bytes = stdout.len(),
                stderr_bytes = stderr.len(),
                "Process exited",
            );

            ExecutionResult {
                succeeded: status.success(),
                stdout,
                stderr: non_empty(stderr),
                exit_code,
                timed_out: false,
                duration_ms,
            }
        }
        Ok(Err(e)) => {
            kill_group(pgid);
            let _ = child.kill().await;
            readers.abort();
            ExecutionResult::failure(
                format!("Failed to wait for {label}: {e}"),
                elapsed_ms(start),
            )
        }
        Err(_elapsed) => {
            kill_group(pgid);
            // Sends SIGKILL again (harmless) and reaps the child.
            let _ = child.kill().await;
            let (stdout, _stderr) = collect_output(&mut readers, pgid).await;
            let duration_ms = elapsed_ms(start);
            tracing::warn!(program = %label, pid = ?pgid, duration_ms, "Process timed out and was killed");

            ExecutionResult {
                succeeded: false,
                stdout,
                stderr: Some(timeout_message(timeout)),
                exit_code: NO_EXIT_CODE,
                timed_out: true,
                duration_ms,
            }
        }
    }
}

/// Wait for both output streams, killing the process group if descendants
/// keep the pipes open past [`DRAIN_GRACE`].
async fn collect_output(
    readers: &mut JoinHandle<(Vec<u8>, Vec<u8>)>,
    pgid: Option<u32>,
) -> (String, String) {
    let (stdout, stderr) = match tokio::time::timeout(DRAIN_GRACE, &mut *readers).await {
        Ok(joined) => joined.unwrap_or_default(),
        Err(_) => {
            tracing::debug!(pid = ?pgid, "Output pipes still open after exit, killing process group");
            kill_group(pgid);
            match tokio::time::timeout(DRAIN_GRACE, &mut *readers).await {
                Ok(joined) => joined.unwrap_or_default(),
                Err(_) => {
                    readers.abort();
                    Default::default()
                }
            }
        }
    };

    (
        String::from_utf8_lossy(&stdout).into_owned(),
        String::from_utf8_lossy(&stderr).into_owned(),
    )
}

/// Send SIGKILL to every process in the group led by `pgid`.
fn kill_group(pgid: Option<u32>) {
    if let Some(pid) = pgid {
        // SAFETY: killpg only delivers a signal. The group was created by
        // `process_group(0)` for a child this module spawned.
        unsafe {
            libc::killpg(pid as libc::pid_t, libc::SIGKILL);
        }
    }
}

/// Read an entire output stream into a byte buffer, capped at [`MAX_OUTPUT_BYTES`].
///
/// Bytes past the cap are drained and discarded so a chatty child never
/// blocks on a full pipe.
async fn read_stream<R: AsyncRead + Unpin>(handle: Option<R>) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Some(mut h) = handle {
        let _ = (&mut h)
            .take(MAX_OUTPUT_BYTES as u64)
            .read_to_end(&mut buf)
            .await;
        let _ = tokio::io::copy(&mut h, &mut tokio::io::sink()).await;
    }
    buf
}

/// Human-readable sentinel for a killed process, e.g. `timed out after 30s`.
pub fn timeout_message(timeout: Duration) -> String {
    let amount = if timeout.subsec_millis() == 0 {
        format!("{}s", timeout.as_secs())
    } else {
        format!("{:.1}s", timeout.as_secs_f64())
    };
    format!("Execution timed out after {amount}")
}

fn non_empty(text: String) -> Option<String> {
    if text.trim().is_empty() {
        None
    } else {
        Some(text)
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
