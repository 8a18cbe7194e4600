// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Owns the single child process slot: start, stop, and restart
//! (spec.md §4.4 / C8).

use tokio::process::{Child, ChildStdin, ChildStdout};

use crate::error::LifecycleError;
use crate::process::readiness::{ReadinessChecker, ReadinessConfig};
use crate::process::spawner::{SpawnSpec, Spawner};
use crate::process::terminator::{TerminationProfile, Terminator};

/// A handle to a running child retained after its stdio pipes have been
/// handed off elsewhere (to the Message Router). Rust's ownership model has
/// no room for the "non-owning reference" spec.md §9 describes for the
/// Router's view of the child, so ownership is split instead: the pipes
/// move to the Router at `connect_server` time, and this handle — just pid
/// plus the means to wait/signal — is what the Lifecycle Manager's
/// `stop`/`restart` operate on afterward.
pub struct ChildHandle {
    child: Child,
}

impl ChildHandle {
    pub fn pid(&self) -> Option<u32> {
        self.child.id()
    }

    /// Non-blocking exit check, the same `try_wait` polling idiom the
    /// Readiness Checker uses. The Supervisor's crash watcher polls this
    /// periodically rather than awaiting a one-shot future, since ownership
    /// of the handle must stay free for a concurrent `stop`/`restart` to
    /// reclaim it.
    pub fn try_exit_status(&mut self) -> Option<std::process::ExitStatus> {
        self.child.try_wait().ok().flatten()
    }

    pub fn is_alive(&mut self) -> bool {
        self.try_exit_status().is_none()
    }
}

/// Coordinates [`Spawner`], [`ReadinessChecker`], and [`Terminator`] behind a
/// single-slot state machine. At most one child is tracked at a time; a
/// second `start()` while one is running is rejected, per spec.md §4.4.
pub struct LifecycleManager {
    spawner: Box<dyn Spawner>,
    readiness: Box<dyn ReadinessChecker>,
    terminator: Box<dyn Terminator>,
    readiness_config: ReadinessConfig,
    running: bool,
}

impl LifecycleManager {
    pub fn new(
        spawner: Box<dyn Spawner>,
        readiness: Box<dyn ReadinessChecker>,
        terminator: Box<dyn Terminator>,
        readiness_config: ReadinessConfig,
    ) -> Self {
        Self {
            spawner,
            readiness,
            terminator,
            readiness_config,
            running: false,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Spawn a new child and wait for it to settle. On success the pipes
    /// and a [`ChildHandle`] (needed later for termination) are handed to
    /// the caller.
    pub async fn start(
        &mut self,
        spec: &SpawnSpec,
    ) -> Result<(ChildHandle, ChildStdin, ChildStdout), LifecycleError> {
        if self.running {
            return Err(LifecycleError::AlreadyRunning);
        }

        let spawned = self.spawner.spawn(spec)?;
        let mut child = spawned.child;

        self.readiness
            .wait_ready(&mut child, &self.readiness_config)
            .await?;

        self.running = true;

        Ok((ChildHandle { child }, spawned.stdin, spawned.stdout))
    }

    /// Terminate a child under the given profile. Takes the handle by
    /// value since a terminated child is not reusable.
    ///
    /// `close_stdin` in the termination profile is a no-op here: by the
    /// time a handle reaches this call the Router has already released its
    /// `ChildStdin` via `disconnect_server`, which closes the pipe. There is
    /// no stdin handle left for this call to close a second time.
    pub async fn stop(
        &mut self,
        mut handle: ChildHandle,
        profile: &TerminationProfile,
    ) -> Result<(), LifecycleError> {
        let result = self.terminator.terminate(&mut handle.child, None, profile).await;
        self.running = false;
        result.map_err(LifecycleError::from)
    }

    /// Stop the old child under the restart profile, then start a fresh one
    /// under the same spec. Per spec.md §4.5/§7, a termination failure (most
    /// notably `ZombieProcess`) aborts the restart outright: no new child is
    /// started on top of an old one that may still be alive, or leaked. The
    /// caller is left with no child attached and must surface the error.
    pub async fn restart(
        &mut self,
        old: ChildHandle,
        spec: &SpawnSpec,
    ) -> Result<(ChildHandle, ChildStdin, ChildStdout), LifecycleError> {
        self.stop(old, &TerminationProfile::restart()).await?;
        self.start(spec).await
    }

    /// Mark no child as tracked without running a terminator, used when the
    /// child has already exited on its own (crash).
    pub fn mark_stopped(&mut self) {
        self.running = false;
    }
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
