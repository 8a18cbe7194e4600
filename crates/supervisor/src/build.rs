// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Runs the configured shell build command ahead of a restart, with
//! cancellation and a timeout (spec.md §4.7 / C10).

use std::process::Stdio;
use std::time::Duration;

use tokio::process::{Child, Command};
use tokio::sync::{oneshot, Mutex};

use crate::error::BuildError;

/// Runs a build and reports cancellability. A trait so the Hot-Reload
/// Controller can be driven with an in-memory fake in tests, per spec.md §9.
#[async_trait::async_trait]
pub trait BuildRunner: Send + Sync {
    /// Run the build to completion. `true` on exit code 0 (or an empty/
    /// whitespace-only command, which is a no-op success). `false` on any
    /// non-zero exit, signal termination, spawn failure, timeout, or
    /// cancellation.
    async fn run(&self) -> bool;

    /// Cancel a build in flight. A no-op if none is running. Synchronous in
    /// spirit (spec.md §5): it only hands off a cancellation signal, the
    /// actual SIGTERM/SIGKILL escalation happens on the task awaiting
    /// `run()`.
    async fn cancel(&self);
}

/// Runs `buildCommand` through `/bin/sh -c`, ignoring its stdout (spec.md
/// §4.7: "ignores its output") but letting stderr through to the
/// supervisor's own stderr so a failing build is still diagnosable in logs.
pub struct ShellBuildRunner {
    command: String,
    timeout_ms: u64,
    inflight: Mutex<Option<oneshot::Sender<()>>>,
}

impl ShellBuildRunner {
    pub fn new(command: impl Into<String>, timeout_ms: u64) -> Self {
        Self {
            command: command.into(),
            timeout_ms,
            inflight: Mutex::new(None),
        }
    }
}

#[async_trait::async_trait]
impl BuildRunner for ShellBuildRunner {
    async fn run(&self) -> bool {
        // Reentrancy: a new run() always supersedes whatever is in flight.
        self.cancel().await;

        let trimmed = self.command.trim();
        if trimmed.is_empty() {
            return true;
        }

        let mut cmd = Command::new("/bin/sh");
        cmd.arg("-c").arg(trimmed);
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::null());
        cmd.stderr(Stdio::inherit());

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(source) => {
                tracing::warn!(error = %BuildError::Spawn(source), "failed to launch build command");
                return false;
            }
        };

        let (tx, rx) = oneshot::channel();
        *self.inflight.lock().await = Some(tx);

        let outcome = tokio::select! {
            result = tokio::time::timeout(Duration::from_millis(self.timeout_ms), child.wait()) => {
                match result {
                    Ok(Ok(status)) if status.success() => true,
                    Ok(Ok(status)) => {
                        tracing::warn!(error = %BuildError::NonZeroExit(status), "build command failed");
                        false
                    }
                    Ok(Err(err)) => {
                        tracing::warn!(error = %err, "failed to wait on build command");
                        false
                    }
                    Err(_elapsed) => {
                        tracing::warn!(error = %BuildError::Timeout(self.timeout_ms), "build command timed out");
                        terminate_child(&mut child).await;
                        false
                    }
                }
            }
            _ = rx => {
                tracing::debug!(error = %BuildError::Cancelled, "build command cancelled");
                terminate_child(&mut child).await;
                false
            }
        };

        self.inflight.lock().await.take();
        outcome
    }

    async fn cancel(&self) {
        if let Some(tx) = self.inflight.lock().await.take() {
            let _ = tx.send(());
        }
    }
}

/// SIGTERM, then SIGKILL after one more second (spec.md §4.7).
async fn terminate_child(child: &mut Child) {
    send_sigterm(child);
    if tokio::time::timeout(Duration::from_secs(1), child.wait())
        .await
        .is_err()
    {
        let _ = child.start_kill();
        let _ = child.wait().await;
    }
}

#[cfg(unix)]
fn send_sigterm(child: &Child) {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    if let Some(pid) = child.id() {
        let _ = kill(Pid::from_raw(pid as i32), Signal::SIGTERM);
    }
}

#[cfg(not(unix))]
fn send_sigterm(_child: &Child) {}

#[cfg(test)]
#[path = "build_tests.rs"]
mod tests;
