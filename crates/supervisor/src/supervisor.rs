// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Top-level orchestrator (spec.md §4.10 / C13): owns the config, wires
//! every other component together, drives the control loop, and handles
//! client-facing signals and the crash/stale-request synthetic errors.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};
use tokio::sync::Mutex;

use tokio::process::{ChildStdin, ChildStdout};

use crate::build::{BuildRunner, ShellBuildRunner};
use crate::config::Config;
use crate::env;
use crate::error::SupervisorError;
use crate::exit_translation;
use crate::hot_reload::{HotReloadController, OnRestart, RestartFuture};
use crate::process::{
    ChildHandle, EscalatingTerminator, LifecycleManager, ProcessSpawner, ReadinessConfig,
    SettleReadinessChecker, SpawnSpec, TerminationProfile,
};
use crate::protocol;
use crate::queue::{MessageQueue, QueueMode};
use crate::router::MessageRouter;
use crate::session::SessionTracker;
use crate::watch::FileWatcher;

/// How long a pending request may sit unanswered once a restart begins
/// before the idle sweep fails it (spec.md §5, Open Question 2: the sweep
/// is armed only while a restart is in flight).
const STALE_REQUEST_SWEEP: Duration = Duration::from_secs(30);
/// Poll cadence for the idle sweep and the crash watcher.
const POLL_INTERVAL: Duration = Duration::from_millis(100);
/// Upper bound on how long a restart waits for the new child to acknowledge
/// the replayed initialize before emitting `tools/list_changed` anyway.
const INITIALIZE_ACK_TIMEOUT: Duration = Duration::from_secs(10);

fn spawn_spec(config: &Config) -> SpawnSpec {
    SpawnSpec {
        command: config.server_command.clone(),
        args: config.server_args.clone(),
        cwd: config.cwd.clone(),
        env: config.env.clone(),
    }
}

/// Orchestrates the whole supervisor. `W` is the client's write half
/// (`tokio::io::Stdout` in production, an in-memory duplex half in tests).
pub struct Supervisor<W> {
    config: Config,
    tracker: Arc<Mutex<SessionTracker>>,
    router: Arc<MessageRouter<W>>,
    lifecycle: Arc<Mutex<LifecycleManager>>,
    current: Arc<Mutex<Option<ChildHandle>>>,
    build: Option<Arc<dyn BuildRunner>>,
    hot_reload: Option<Arc<HotReloadController>>,
    watcher: Option<Arc<FileWatcher>>,
    restarts_in_flight: Arc<AtomicUsize>,
}

impl<W> Supervisor<W>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    pub fn new(config: Config, client_writer: W) -> Result<Self, SupervisorError> {
        if env::is_nested_instance() {
            return Err(SupervisorError::RecursiveInvocation);
        }

        let tracker = Arc::new(Mutex::new(SessionTracker::new()));
        let queue = Arc::new(Mutex::new(MessageQueue::new(QueueMode::Fifo)));
        let router = Arc::new(MessageRouter::new(
            client_writer,
            Arc::clone(&queue),
            Arc::clone(&tracker),
        ));
        let lifecycle = Arc::new(Mutex::new(LifecycleManager::new(
            Box::new(ProcessSpawner),
            Box::new(SettleReadinessChecker),
            Box::new(EscalatingTerminator),
            ReadinessConfig::default(),
        )));
        let current: Arc<Mutex<Option<ChildHandle>>> = Arc::new(Mutex::new(None));
        let restarts_in_flight = Arc::new(AtomicUsize::new(0));

        let (build, hot_reload, watcher) = if config.hot_reload_enabled() {
            let build: Arc<dyn BuildRunner> = Arc::new(ShellBuildRunner::new(
                config.build_command.clone(),
                config.build_timeout_ms,
            ));
            let on_restart = make_on_restart(
                Arc::clone(&lifecycle),
                Arc::clone(&current),
                Arc::clone(&router),
                Arc::clone(&tracker),
                spawn_spec(&config),
            );
            let controller = Arc::new(HotReloadController::new(Arc::clone(&build), on_restart));
            let watcher = FileWatcher::new(&config.watch_patterns, &config.cwd, config.debounce_ms)
                .map_err(|err| SupervisorError::Config(err.to_string()))?;
            (Some(build), Some(controller), Some(Arc::new(watcher)))
        } else {
            (None, None, None)
        };

        Ok(Self {
            config,
            tracker,
            router,
            lifecycle,
            current,
            build,
            hot_reload,
            watcher,
            restarts_in_flight,
        })
    }

    /// Start the child, relay client stdio, watch for file changes and
    /// signals, and run until a clean shutdown or fatal startup failure.
    /// Returns the process exit code (spec.md §6: 0 or 1, no other values).
    pub async fn run<R>(self, client_reader: R) -> i32
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let spec = spawn_spec(&self.config);
        {
            let mut lifecycle = self.lifecycle.lock().await;
            match lifecycle.start(&spec).await {
                Ok((handle, stdin, stdout)) => {
                    drop(lifecycle);
                    self.router.connect_server(stdin, stdout).await;
                    *self.current.lock().await = Some(handle);
                }
                Err(err) => {
                    tracing::error!(error = %err, "failed to start child process");
                    return 1;
                }
            }
        }

        let mut reader_task = tokio::spawn(pump_client_stdin(client_reader, Arc::clone(&self.router)));
        let watcher_task = self.spawn_watcher_task();
        let sweep_task = self.spawn_stale_sweep_task();
        let crash_task = self.spawn_crash_watcher_task();

        tokio::select! {
            _ = wait_for_shutdown_signal() => {
                tracing::info!("shutdown signal received");
            }
            _ = &mut reader_task => {
                tracing::info!("client stdin closed, shutting down");
            }
        }

        if let Some(watcher) = &self.watcher {
            watcher.stop().await;
        }
        if let Some(build) = &self.build {
            build.cancel().await;
        }
        reader_task.abort();
        watcher_task.abort();
        sweep_task.abort();
        crash_task.abort();

        self.router.stop().await;

        let handle = self.current.lock().await.take();
        if let Some(handle) = handle {
            let mut lifecycle = self.lifecycle.lock().await;
            if let Err(err) = lifecycle.stop(handle, &TerminationProfile::stop()).await {
                tracing::warn!(error = %err, "child did not terminate cleanly during shutdown");
            }
        }

        0
    }

    /// Drives the hot-reload cycle on every debounced file change. Per
    /// spec.md §4.9, a build failure just logs and waits for the next
    /// change — but a build *success* followed by a failed `on_restart`
    /// (e.g. the replacement child never becomes ready) leaves the
    /// supervisor with no child attached at all. `handle_file_change`'s
    /// `CycleOutcome::restart_error` is inspected rather than discarded so
    /// that case gets a single recovery attempt instead of silently queuing
    /// client traffic forever.
    fn spawn_watcher_task(&self) -> tokio::task::JoinHandle<()> {
        let (Some(watcher), Some(controller)) = (self.watcher.clone(), self.hot_reload.clone()) else {
            return tokio::spawn(async {});
        };
        let restarts_in_flight = Arc::clone(&self.restarts_in_flight);
        let lifecycle = Arc::clone(&self.lifecycle);
        let current = Arc::clone(&self.current);
        let router = Arc::clone(&self.router);
        let tracker = Arc::clone(&self.tracker);
        let spec = spawn_spec(&self.config);
        tokio::spawn(async move {
            while watcher.next_change().await.is_some() {
                restarts_in_flight.fetch_add(1, Ordering::SeqCst);
                let outcome = controller.handle_file_change().await;
                if let Some(message) = outcome.and_then(|o| o.restart_error) {
                    tracing::error!(
                        error = %message,
                        "restart failed after a successful build, attempting to recover with a fresh start"
                    );
                    recover_after_failed_restart(&lifecycle, &current, &router, &tracker, &spec).await;
                }
                restarts_in_flight.fetch_sub(1, Ordering::SeqCst);
            }
        })
    }

    fn spawn_stale_sweep_task(&self) -> tokio::task::JoinHandle<()> {
        let tracker = Arc::clone(&self.tracker);
        let router = Arc::clone(&self.router);
        let restarts_in_flight = Arc::clone(&self.restarts_in_flight);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(POLL_INTERVAL);
            loop {
                ticker.tick().await;
                if restarts_in_flight.load(Ordering::SeqCst) == 0 {
                    continue;
                }
                let stale = tracker.lock().await.take_stale_pending(STALE_REQUEST_SWEEP);
                if let Some(pending) = stale {
                    if let Some(raw) = protocol::stale_request_error(&pending.id, &pending.method) {
                        router.write_to_client(raw).await;
                    }
                }
            }
        })
    }

    fn spawn_crash_watcher_task(&self) -> tokio::task::JoinHandle<()> {
        let current = Arc::clone(&self.current);
        let lifecycle = Arc::clone(&self.lifecycle);
        let router = Arc::clone(&self.router);
        let tracker = Arc::clone(&self.tracker);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(POLL_INTERVAL);
            loop {
                ticker.tick().await;

                let exit_status = {
                    let mut guard = current.lock().await;
                    guard.as_mut().and_then(|handle| handle.try_exit_status())
                };
                let Some(status) = exit_status else {
                    continue;
                };

                // Still tracked in `current`, so this was not a deliberate
                // stop/restart — those remove the handle first (spec.md
                // §9's ownership-split note on the ChildHandle refactor).
                current.lock().await.take();
                lifecycle.lock().await.mark_stopped();
                router.disconnect_server().await;

                let translated = exit_translation::translate(status.code(), exit_signal(&status));
                tracing::warn!(%translated, "child process crashed");

                let pending = tracker.lock().await.clear_pending();
                if let Some(pending) = pending {
                    if let Some(raw) = protocol::crash_error(&pending.id, &pending.method, &translated) {
                        router.write_to_client(raw).await;
                    }
                }
            }
        })
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

async fn pump_client_stdin<R, W>(mut reader: R, router: Arc<MessageRouter<W>>)
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let mut buf = vec![0u8; 8192];
    loop {
        let n = match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(err) => {
                tracing::debug!(error = %err, "client stdin read failed");
                break;
            }
        };
        router
            .handle_client_chunk(Bytes::copy_from_slice(&buf[..n]))
            .await;
    }
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut terminate) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = terminate.recv() => {}
            }
        }
        Err(err) => {
            tracing::warn!(error = %err, "failed to install SIGTERM handler, watching Ctrl-C only");
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

fn make_on_restart<W>(
    lifecycle: Arc<Mutex<LifecycleManager>>,
    current: Arc<Mutex<Option<ChildHandle>>>,
    router: Arc<MessageRouter<W>>,
    tracker: Arc<Mutex<SessionTracker>>,
    spec: SpawnSpec,
) -> OnRestart
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    Arc::new(move || {
        let lifecycle = Arc::clone(&lifecycle);
        let current = Arc::clone(&current);
        let router = Arc::clone(&router);
        let tracker = Arc::clone(&tracker);
        let spec = spec.clone();
        let fut: RestartFuture = Box::pin(async move {
                // Release the Router's stdin handle and pull the old child
                // out of `current` *before* terminating it, so the crash
                // watcher never mistakes this deliberate restart for a
                // crash (spec.md §9).
                let old = current.lock().await.take();
                router.disconnect_server().await;

                let (new_handle, stdin, stdout) = {
                    let mut lifecycle = lifecycle.lock().await;
                    match old {
                        Some(old) => lifecycle.restart(old, &spec).await,
                        None => lifecycle.start(&spec).await,
                    }
                }
                .map_err(|err| crate::error::RestartError(anyhow::Error::from(err)))?;

                attach_new_child(&router, &tracker, &current, new_handle, stdin, stdout).await;
                Ok(())
            });
        fut
    })
}

/// Connect a freshly started child to the Router, replay the initialize
/// snapshot and flush the queue against it, wait for it to acknowledge, emit
/// `tools/list_changed`, then record it in `current`. Shared by the normal
/// restart path and by [`recover_after_failed_restart`]'s one-shot retry.
async fn attach_new_child<W>(
    router: &Arc<MessageRouter<W>>,
    tracker: &Arc<Mutex<SessionTracker>>,
    current: &Arc<Mutex<Option<ChildHandle>>>,
    new_handle: ChildHandle,
    stdin: ChildStdin,
    stdout: ChildStdout,
) where
    W: AsyncWrite + Unpin + Send + 'static,
{
    router.connect_server(stdin, stdout).await;
    router.replay_initialize().await;
    router.flush_queue().await;
    wait_for_initialize_ack(tracker).await;
    if let Some(raw) = protocol::tools_list_changed() {
        router.write_to_client(raw).await;
    }

    *current.lock().await = Some(new_handle);
}

/// Called when a hot-reload cycle's build succeeded but `on_restart` itself
/// failed (spec.md §4.9), leaving no child attached. Makes one attempt to
/// start a fresh child under the same spec and attach it; per spec.md §7's
/// "does not loop forever" guidance for startup failures, a second failure
/// here is only logged — client traffic queues until the next file change
/// drives another cycle.
async fn recover_after_failed_restart<W>(
    lifecycle: &Arc<Mutex<LifecycleManager>>,
    current: &Arc<Mutex<Option<ChildHandle>>>,
    router: &Arc<MessageRouter<W>>,
    tracker: &Arc<Mutex<SessionTracker>>,
    spec: &SpawnSpec,
) where
    W: AsyncWrite + Unpin + Send + 'static,
{
    if current.lock().await.is_some() {
        // A concurrent cycle already reattached a child; nothing to recover.
        return;
    }
    let started = { lifecycle.lock().await.start(spec).await };
    match started {
        Ok((handle, stdin, stdout)) => {
            attach_new_child(router, tracker, current, handle, stdin, stdout).await;
        }
        Err(err) => {
            tracing::error!(
                error = %err,
                "recovery start after a failed restart also failed; client traffic will queue until the next file change"
            );
        }
    }
}

/// Polls until the Session Tracker observes the replacement child
/// acknowledging the replayed initialize, or gives up after
/// [`INITIALIZE_ACK_TIMEOUT`]. A tracker with no initialize snapshot at all
/// has nothing to wait for and returns immediately — a restart must still
/// emit the notification even for a client session that never sent one.
async fn wait_for_initialize_ack(tracker: &Arc<Mutex<SessionTracker>>) {
    let deadline = tokio::time::Instant::now() + INITIALIZE_ACK_TIMEOUT;
    let mut ticker = tokio::time::interval(POLL_INTERVAL);
    loop {
        let ready = {
            let tracker = tracker.lock().await;
            match tracker.initialize_snapshot() {
                Some(snapshot) => snapshot.initialized,
                None => true,
            }
        };
        if ready || tokio::time::Instant::now() >= deadline {
            return;
        }
        ticker.tick().await;
    }
}

#[cfg(test)]
#[path = "supervisor_tests.rs"]
mod tests;
