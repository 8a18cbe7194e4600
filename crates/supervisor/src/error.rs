// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Error types shared across the supervisor's components.
//!
//! Each component boundary gets its own `thiserror`-derived enum so that
//! callers can match on the specific failure kind named in the design
//! (`SpawnError`, `StartupExit`, `ReadinessTimeout`, ...) instead of a single
//! catch-all error.

use thiserror::Error;

/// Failure to spawn the child process.
#[derive(Debug, Error)]
pub enum SpawnError {
    #[error("failed to spawn `{command}`: {source}")]
    Io {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("spawned child is missing a piped stdio handle: {0}")]
    MissingStdio(&'static str),
}

/// Failure while waiting for a freshly spawned child to become ready.
#[derive(Debug, Error)]
pub enum ReadinessError {
    #[error("child exited during startup before becoming ready")]
    StartupExit { code: Option<i32>, signal: Option<i32> },
    #[error("child did not become ready within {0}ms")]
    ReadinessTimeout(u64),
}

/// Failure during the shutdown escalation state machine.
#[derive(Debug, Error)]
pub enum TerminatorError {
    #[error("child did not exit after SIGKILL within {0}ms (zombie)")]
    ZombieProcess(u64),
    #[error("failed to signal child: {0}")]
    Signal(#[from] std::io::Error),
}

/// Failure returned by the Lifecycle Manager.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("a child is already running")]
    AlreadyRunning,
    #[error(transparent)]
    Spawn(#[from] SpawnError),
    #[error(transparent)]
    Readiness(#[from] ReadinessError),
    #[error(transparent)]
    Terminator(#[from] TerminatorError),
}

/// Failure running the configured build command.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("build command exited with status {0}")]
    NonZeroExit(std::process::ExitStatus),
    #[error("build command timed out after {0}ms")]
    Timeout(u64),
    #[error("build command was cancelled")]
    Cancelled,
    #[error("failed to launch build command: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Failure raised by the Supervisor-supplied restart callback the Hot-Reload
/// Controller invokes after a successful build. Propagates out of the
/// current reload cycle (spec.md §4.9) rather than being swallowed like a
/// build failure.
#[derive(Debug, Error)]
#[error(transparent)]
pub struct RestartError(#[from] pub anyhow::Error);

/// Top-level supervisor failure — the only error kind that can abort the
/// whole process (spec.md §7: `SpawnError`/`StartupExit`/`ReadinessTimeout`
/// surface here as a fatal, non-zero exit).
#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("recursive supervisor invocation detected (instance marker already set)")]
    RecursiveInvocation,
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
}
