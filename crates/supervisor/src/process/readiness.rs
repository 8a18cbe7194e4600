// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Waits for a freshly spawned child to become "ready" before the Lifecycle
//! Manager hands it to the router (spec.md §4.4 / C6).
//!
//! Readiness here is process-level, not protocol-level: the spec treats a
//! child as ready once it has survived a settle delay without exiting. There
//! is deliberately no handshake read from stdout — that would race the
//! Message Router, which owns the only stdout reader.

use std::time::Duration;

use tokio::process::Child;
use tokio::time::{interval, timeout};

use crate::error::ReadinessError;

/// `{checkIntervalMs, settleDelayMs, timeoutMs}` from spec.md §4.4.
#[derive(Clone, Copy, Debug)]
pub struct ReadinessConfig {
    pub check_interval_ms: u64,
    pub settle_delay_ms: u64,
    pub timeout_ms: u64,
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            check_interval_ms: 50,
            settle_delay_ms: 200,
            timeout_ms: 10_000,
        }
    }
}

/// Confirms a spawned child is alive long enough to be considered ready.
///
/// A trait so the Lifecycle Manager can be tested against a fake that
/// resolves instantly, per spec.md §9.
#[async_trait::async_trait]
pub trait ReadinessChecker: Send + Sync {
    async fn wait_ready(
        &self,
        child: &mut Child,
        config: &ReadinessConfig,
    ) -> Result<(), ReadinessError>;
}

/// Polls `try_wait()` until the settle delay elapses with no exit observed,
/// racing the overall `timeout_ms` budget.
#[derive(Debug, Default)]
pub struct SettleReadinessChecker;

#[async_trait::async_trait]
impl ReadinessChecker for SettleReadinessChecker {
    async fn wait_ready(
        &self,
        child: &mut Child,
        config: &ReadinessConfig,
    ) -> Result<(), ReadinessError> {
        let budget = Duration::from_millis(config.timeout_ms);
        match timeout(budget, poll_until_settled(child, config)).await {
            Ok(result) => result,
            Err(_) => Err(ReadinessError::ReadinessTimeout(config.timeout_ms)),
        }
    }
}

/// Polls on `check_interval_ms` and requires `settle_delay_ms` of continuous
/// survival. Any exit observed mid-poll — including mid-settle — fails fast
/// as [`ReadinessError::StartupExit`] instead of waiting out the window.
async fn poll_until_settled(
    child: &mut Child,
    config: &ReadinessConfig,
) -> Result<(), ReadinessError> {
    let mut ticker = interval(Duration::from_millis(config.check_interval_ms.max(1)));
    let mut alive_since: Option<tokio::time::Instant> = None;
    let settle = Duration::from_millis(config.settle_delay_ms);

    loop {
        ticker.tick().await;

        match child.try_wait() {
            Ok(Some(status)) => {
                return Err(ReadinessError::StartupExit {
                    code: status.code(),
                    signal: exit_signal(&status),
                });
            }
            Ok(None) => {
                let since = alive_since.get_or_insert_with(tokio::time::Instant::now);
                if since.elapsed() >= settle {
                    return Ok(());
                }
            }
            Err(_) => {
                // `try_wait` failing means the OS has already reaped the
                // child out from under us; treat it as an unreadable exit.
                return Err(ReadinessError::StartupExit {
                    code: None,
                    signal: None,
                });
            }
        }
    }
}

#[cfg(unix)]
fn exit_signal(status: &std::process::ExitStatus) -> Option<i32> {
    std::os::unix::process::ExitStatusExt::signal(status)
}

#[cfg(not(unix))]
fn exit_signal(_status: &std::process::ExitStatus) -> Option<i32> {
    None
}

#[cfg(test)]
#[path = "readiness_tests.rs"]
mod tests;
