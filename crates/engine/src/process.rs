// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process launch, output capture, and signal-based cancellation for one
//! step invocation (spec.md §4.4 steps 6-7, §4.2b shell selection, §5
//! "Process lifetime").
//!
//! Each step's process runs in its own process group so a stop signal
//! reaches its descendants, and shells out to the `kill` binary to deliver
//! that signal — the same approach the rest of this codebase's process
//! supervision uses rather than reaching for a libc/nix binding.

use crate::error::RuntimeError;
use crate::tail_buffer::TailBuffer;
use std::path::Path;
use std::time::Duration;
use tokio::fs::OpenOptions;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, Command};

/// Outcome of running one process to completion (or to forced termination).
#[derive(Debug)]
pub struct ProcessOutcome {
    pub exit_code: Option<i32>,
    pub cancelled: bool,
    pub stdout_tail: String,
    pub stderr_tail: String,
}

/// Strips a leading `SIG` (case-insensitively) so the result can be passed
/// to the `kill` binary's `-SIGNAME` form.
fn signal_name_for_kill(signal: &str) -> String {
    let upper = signal.to_ascii_uppercase();
    upper.strip_prefix("SIG").unwrap_or(&upper).to_string()
}

/// Best-effort: send `signal` to the process group led by `pgid` via the
/// `kill` binary (spec.md §4.4 step 7, §5 "Process lifetime" — one
/// process group per step so descendants receive the signal too).
async fn signal_process_group(pgid: u32, signal: &str) {
    let flag = format!("-{}", signal_name_for_kill(signal));
    let target = format!("-{pgid}"); // negative pid addresses the whole group
    let _ = Command::new("kill").arg(&flag).arg(&target).output().await;
}

/// Spawns `shell shell_args...` in `dir` with `env`, tees stdout/stderr to
/// both the given file paths (appended, created if absent) and bounded
/// in-memory tail buffers, and waits for completion — unless `cancel`
/// fires first, in which case it sends `signal_on_stop` to the process
/// group, waits up to `max_cleanup`, then escalates to `SIGKILL`.
#[allow(clippy::too_many_arguments)]
pub async fn run_command(
    shell: &str,
    shell_args: &[String],
    dir: &Path,
    env: &[(String, String)],
    stdout_path: &Path,
    stderr_path: &Path,
    tail_capacity: usize,
    cancel: &crate::cancel::CancelToken,
    signal_on_stop: &str,
    max_cleanup: Duration,
) -> Result<ProcessOutcome, RuntimeError> {
    tokio::fs::create_dir_all(dir).await.ok();
    if let Some(parent) = stdout_path.parent() {
        tokio::fs::create_dir_all(parent).await.ok();
    }
    if let Some(parent) = stderr_path.parent() {
        tokio::fs::create_dir_all(parent).await.ok();
    }

    let mut cmd = Command::new(shell);
    cmd.args(shell_args)
        .current_dir(dir)
        .envs(env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .stdout(std::process::Stdio::piped())
        .stderr(std::process::Stdio::piped())
        .stdin(std::process::Stdio::null());

    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        // New process group rooted at the child's own pid, so the stop
        // signal below reaches any descendants it spawns.
        cmd.process_group(0);
    }

    let mut child: Child = cmd
        .spawn()
        .map_err(|e| RuntimeError::ProcessSpawn(e.to_string()))?;
    let pid = child.id();

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    let stdout_path = stdout_path.to_path_buf();
    let stderr_path = stderr_path.to_path_buf();
    let stdout_task = tokio::spawn(tee_stream(stdout, stdout_path, tail_capacity));
    let stderr_task = tokio::spawn(tee_stream(stderr, stderr_path, tail_capacity));

    let mut cancelled = false;
    let exit_status = tokio::select! {
        status = child.wait() => status,
        _ = cancel.cancelled() => {
            cancelled = true;
            if let Some(pid) = pid {
                signal_process_group(pid, signal_on_stop).await;
                let waited = tokio::time::timeout(max_cleanup, child.wait()).await;
                match waited {
                    Ok(status) => status,
                    Err(_) => {
                        signal_process_group(pid, "SIGKILL").await;
                        child.wait().await
                    }
                }
            } else {
                child.wait().await
            }
        }
    };

    let stdout_tail = stdout_task
        .await
        .unwrap_or_else(|_| TailBuffer::new(tail_capacity));
    let stderr_tail = stderr_task
        .await
        .unwrap_or_else(|_| TailBuffer::new(tail_capacity));

    let exit_code = exit_status.ok().and_then(|s| s.code());

    Ok(ProcessOutcome {
        exit_code,
        cancelled,
        stdout_tail: stdout_tail.trimmed_string(),
        stderr_tail: stderr_tail.trimmed_string(),
    })
}

/// Reads a child's stream to completion, appending every chunk to both the
/// log file and the tail buffer (spec.md §4.4 step 6). Errors opening or
/// writing the file are swallowed — the tail buffer always has the
/// output even if file persistence fails, since the file is a convenience
/// (`${step.stdout}` resolves to a path, not the content) not the source
/// of truth for `${step.output}`.
async fn tee_stream(
    stream: Option<impl tokio::io::AsyncRead + Unpin>,
    path: std::path::PathBuf,
    tail_capacity: usize,
) -> TailBuffer {
    let mut tail = TailBuffer::new(tail_capacity);
    let Some(mut stream) = stream else {
        return tail;
    };

    let file = OpenOptions::new().create(true).append(true).open(&path).await;
    let mut file = file.ok();

    let mut chunk = [0u8; 8192];
    loop {
        match stream.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => {
                tail.push(&chunk[..n]);
                if let Some(f) = file.as_mut() {
                    let _ = f.write_all(&chunk[..n]).await;
                }
            }
            Err(_) => break,
        }
    }
    if let Some(f) = file.as_mut() {
        let _ = f.flush().await;
    }
    tail
}
