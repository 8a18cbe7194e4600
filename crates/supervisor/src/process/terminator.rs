// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Escalating shutdown sequence for a child process (spec.md §4.4 / C7).
//!
//! Four stages, each skipped once the child exits: close stdin, SIGTERM
//! after a grace period, SIGKILL after a force period, then a zombie check
//! after one more wait. On non-Unix targets the signal stages degrade to
//! `Child::kill()` (SIGKILL-equivalent only) since there is no portable
//! SIGTERM.

use std::time::Duration;

use tokio::process::{Child, ChildStdin};
use tokio::time::timeout;

use crate::error::TerminatorError;

/// One named shutdown profile. spec.md §9 resolves the Open Question on
/// concrete constants with two profiles: `stop()` (graceful, used on
/// supervisor exit) and `restart()` (used ahead of a hot-reload respawn,
/// where the replacement must come up quickly).
#[derive(Clone, Copy, Debug)]
pub struct TerminationProfile {
    pub close_stdin: bool,
    pub grace_ms: u64,
    pub force_ms: u64,
    pub zombie_ms: u64,
    pub throw_on_zombie: bool,
}

impl TerminationProfile {
    pub fn stop() -> Self {
        Self {
            close_stdin: true,
            grace_ms: 2_000,
            force_ms: 2_000,
            zombie_ms: 3_000,
            throw_on_zombie: false,
        }
    }

    pub fn restart() -> Self {
        Self {
            close_stdin: false,
            grace_ms: 0,
            force_ms: 1_500,
            zombie_ms: 2_000,
            throw_on_zombie: true,
        }
    }
}

/// Drives a child through its shutdown escalation.
///
/// A trait so the Lifecycle Manager can be tested with a fake that resolves
/// instantly, per spec.md §9.
#[async_trait::async_trait]
pub trait Terminator: Send + Sync {
    async fn terminate(
        &self,
        child: &mut Child,
        stdin: Option<ChildStdin>,
        profile: &TerminationProfile,
    ) -> Result<(), TerminatorError>;
}

#[derive(Debug, Default)]
pub struct EscalatingTerminator;

#[async_trait::async_trait]
impl Terminator for EscalatingTerminator {
    async fn terminate(
        &self,
        child: &mut Child,
        stdin: Option<ChildStdin>,
        profile: &TerminationProfile,
    ) -> Result<(), TerminatorError> {
        if profile.close_stdin {
            drop(stdin);
        }

        if already_exited(child).await {
            return Ok(());
        }

        if profile.grace_ms > 0 {
            if wait_for_exit(child, profile.grace_ms).await {
                return Ok(());
            }
        }

        send_sigterm(child)?;
        if wait_for_exit(child, profile.force_ms).await {
            return Ok(());
        }

        let _ = child.start_kill();
        if wait_for_exit(child, profile.zombie_ms).await {
            return Ok(());
        }

        if profile.throw_on_zombie {
            Err(TerminatorError::ZombieProcess(profile.zombie_ms))
        } else {
            Ok(())
        }
    }
}

async fn already_exited(child: &mut Child) -> bool {
    matches!(child.try_wait(), Ok(Some(_)))
}

async fn wait_for_exit(child: &mut Child, budget_ms: u64) -> bool {
    timeout(Duration::from_millis(budget_ms), child.wait())
        .await
        .is_ok()
}

#[cfg(unix)]
fn send_sigterm(child: &Child) -> Result<(), TerminatorError> {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    let Some(pid) = child.id() else {
        // Already reaped; nothing to signal.
        return Ok(());
    };
    match kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
        Ok(()) => Ok(()),
        // ESRCH: the child exited between our liveness check and the signal.
        Err(nix::errno::Errno::ESRCH) => Ok(()),
        Err(errno) => Err(TerminatorError::Signal(std::io::Error::from(errno))),
    }
}

#[cfg(not(unix))]
fn send_sigterm(_child: &Child) -> Result<(), TerminatorError> {
    Ok(())
}

#[cfg(test)]
#[path = "terminator_tests.rs"]
mod tests;
