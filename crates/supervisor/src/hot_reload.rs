// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Serializes build→restart cycles and coalesces overlapping file-change
//! bursts into at most one extra cycle (spec.md §4.9 / C12).

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::{watch, Mutex};

use crate::build::BuildRunner;
use crate::error::RestartError;

pub type RestartFuture = Pin<Box<dyn Future<Output = Result<(), RestartError>> + Send>>;
/// Supervisor-supplied callback invoked once a build succeeds: disconnect
/// the router from the doomed child, restart the Lifecycle Manager, attach
/// the new one, replay the initialize snapshot, drain the queue, and emit
/// the tools-changed notification.
pub type OnRestart = Arc<dyn Fn() -> RestartFuture + Send + Sync>;

/// What one `performBuildAndRestart` cycle produced, shared with any caller
/// that coalesced into it rather than driving it directly.
#[derive(Clone, Debug, Default)]
pub struct CycleOutcome {
    /// `Some` only when the build succeeded but `on_restart` itself failed.
    pub restart_error: Option<String>,
}

#[derive(Default)]
struct CycleState {
    pending: bool,
    running: bool,
}

/// Drives the build→restart loop described in spec.md §4.9. A file change
/// calls [`HotReloadController::handle_file_change`]; if a cycle is already
/// in flight the call coalesces into it instead of starting a second one.
pub struct HotReloadController {
    build: Arc<dyn BuildRunner>,
    on_restart: OnRestart,
    state: Mutex<CycleState>,
    outcome: watch::Sender<Option<CycleOutcome>>,
}

impl HotReloadController {
    pub fn new(build: Arc<dyn BuildRunner>, on_restart: OnRestart) -> Self {
        let (outcome, _rx) = watch::channel(None);
        Self {
            build,
            on_restart,
            state: Mutex::new(CycleState::default()),
            outcome,
        }
    }

    /// Called by the File Watcher on every debounced change. Sets the
    /// `pending` flag; becomes the cycle driver if none is running, or
    /// waits for the in-flight (and any coalesced follow-up) cycle to
    /// finish otherwise.
    pub async fn handle_file_change(&self) -> Option<CycleOutcome> {
        let mut outcome_rx = self.outcome.subscribe();

        let mut state = self.state.lock().await;
        state.pending = true;
        if state.running {
            drop(state);
            let _ = outcome_rx.changed().await;
            return outcome_rx.borrow().clone();
        }
        state.running = true;
        drop(state);

        let mut last_outcome = None;
        loop {
            let should_run = {
                let mut state = self.state.lock().await;
                if state.pending {
                    state.pending = false;
                    true
                } else {
                    state.running = false;
                    false
                }
            };
            if !should_run {
                break;
            }

            let outcome = self.perform_build_and_restart().await;
            let _ = self.outcome.send(Some(outcome.clone()));
            last_outcome = Some(outcome);
        }
        last_outcome
    }

    async fn perform_build_and_restart(&self) -> CycleOutcome {
        self.build.cancel().await;

        if !self.build.run().await {
            tracing::info!("build failed, hot-reload cycle will retry on the next change");
            return CycleOutcome::default();
        }

        match (self.on_restart)().await {
            Ok(()) => CycleOutcome::default(),
            Err(err) => {
                tracing::error!(error = %err, "restart failed during hot-reload cycle");
                CycleOutcome {
                    restart_error: Some(err.to_string()),
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "hot_reload_tests.rs"]
mod tests;
