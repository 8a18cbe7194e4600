// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Wires the client and child stdio streams together: the bidirectional
//! relay, the queue consulted while no child is attached, and the Session
//! Tracker observation hook on both directions (spec.md §4.6 / C9).
//!
//! Ownership follows spec.md §9's note on cyclic references: the Router
//! holds only non-owning handles to the child's stdio (an `Arc<Mutex<_>>`
//! for the write side, a background task for the read side), released
//! explicitly in [`MessageRouter::disconnect_server`] rather than through an
//! observer graph. The Lifecycle Manager remains the sole owner of the
//! `Child` itself.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::process::{ChildStdin, ChildStdout};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::jsonrpc::{LineBuffer, MessageParser};
use crate::queue::MessageQueue;
use crate::session::SessionTracker;

/// The live link to an attached child's stdio. The write half is shared with
/// the queue-flush and initialize-replay paths (all three write to the same
/// pipe), so it is wrapped in a lock; the read half is owned exclusively by
/// the background `reader_task`.
struct ServerLink {
    stdin: Arc<Mutex<ChildStdin>>,
    reader_task: JoinHandle<()>,
}

impl Drop for ServerLink {
    fn drop(&mut self) {
        self.reader_task.abort();
    }
}

/// Relays client↔child stdio. `W` is the client's write half (`tokio::io::Stdout`
/// in production, an in-memory duplex half in tests).
pub struct MessageRouter<W> {
    tracker: Arc<Mutex<SessionTracker>>,
    queue: Arc<Mutex<MessageQueue>>,
    client_writer: Arc<Mutex<W>>,
    client_buffer: Mutex<LineBuffer>,
    server: Mutex<Option<ServerLink>>,
    stopped: AtomicBool,
}

impl<W> MessageRouter<W>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    pub fn new(client_writer: W, queue: Arc<Mutex<MessageQueue>>, tracker: Arc<Mutex<SessionTracker>>) -> Self {
        Self {
            tracker,
            queue,
            client_writer: Arc::new(Mutex::new(client_writer)),
            client_buffer: Mutex::new(LineBuffer::new()),
            server: Mutex::new(None),
            stopped: AtomicBool::new(false),
        }
    }

    pub fn is_attached(&self) -> bool {
        // `try_lock` rather than blocking: this is a best-effort observability
        // hook, never consulted on the hot write path (which always attempts
        // the write and falls back to the queue on failure).
        self.server
            .try_lock()
            .map(|guard| guard.is_some())
            .unwrap_or(true)
    }

    /// Handle one chunk of raw bytes read from the client's stdin.
    ///
    /// Per spec.md §4.6: empty chunks are ignored silently; every complete
    /// line extracted from the (possibly multi-message, possibly
    /// mid-message) chunk is observed by the Session Tracker in order, then
    /// the complete lines are forwarded to the child as a single write if
    /// one is attached, or queued message-by-message otherwise. A chunk that
    /// completes no line yet (a message split across reads) yields nothing
    /// to forward this call; `LineBuffer` retains the partial tail and the
    /// bytes go out once a later chunk completes the line.
    pub async fn handle_client_chunk(&self, chunk: Bytes) {
        if self.stopped.load(Ordering::SeqCst) || chunk.is_empty() {
            return;
        }

        let lines = self.client_buffer.lock().await.push(&chunk);
        if lines.is_empty() {
            return;
        }

        {
            let mut tracker = self.tracker.lock().await;
            for line in &lines {
                tracker.process_client_data(line.clone());
            }
        }

        let stdin = {
            let server = self.server.lock().await;
            server.as_ref().map(|link| Arc::clone(&link.stdin))
        };

        match stdin {
            Some(stdin) => {
                // Write the reassembled complete lines, not the raw incoming
                // `chunk`: a line split across two stdin reads is buffered by
                // `LineBuffer` across calls, so `chunk` alone may be only a
                // trailing fragment. `lines` is exactly the set of complete
                // records ready to go out, concatenated into one write per
                // spec.md §4.6 ("forwarded as a single write").
                let combined = concat_lines(&lines);
                let mut stdin = stdin.lock().await;
                if let Err(err) = stdin.write_all(&combined).await {
                    tracing::warn!(error = %err, "write to child stdin failed, queueing chunk");
                    let mut queue = self.queue.lock().await;
                    for line in lines {
                        queue.add(line);
                    }
                }
            }
            None => {
                let mut queue = self.queue.lock().await;
                for line in lines {
                    queue.add(line);
                }
            }
        }
    }

    /// Attach a freshly spawned child. Disconnects any existing link first
    /// so a reconnect never leaves two server-data readers running
    /// (spec.md §8's "exactly one server-data listener present" boundary
    /// test). Does **not** replay the initialize request or flush the queue
    /// — callers must do that, in that order, via
    /// [`Self::replay_initialize`] and [`Self::flush_queue`], per the
    /// ordering guarantee in spec.md §5.
    pub async fn connect_server(&self, stdin: ChildStdin, stdout: ChildStdout) {
        self.disconnect_server().await;

        let stdin = Arc::new(Mutex::new(stdin));
        let reader_task = spawn_server_reader(stdout, Arc::clone(&self.tracker), Arc::clone(&self.client_writer));

        *self.server.lock().await = Some(ServerLink { stdin, reader_task });
    }

    /// Remove the server-data listener and release the stdin handle.
    /// Subsequent client data is queued until [`Self::connect_server`] runs
    /// again.
    pub async fn disconnect_server(&self) {
        self.server.lock().await.take();
    }

    /// Write the remembered initialize request directly to the child,
    /// bypassing the queue. A no-op if no initialize has ever been tracked.
    pub async fn replay_initialize(&self) {
        let raw = {
            let tracker = self.tracker.lock().await;
            tracker.initialize_snapshot().map(|snap| snap.raw.clone())
        };
        let Some(raw) = raw else {
            return;
        };
        self.write_to_child(raw).await;
    }

    /// Drain the queue to the attached child in rank-then-FIFO order. On a
    /// failed write mid-drain the record is re-queued at the head and
    /// draining stops (spec.md §4.2), leaving the rest for the next flush.
    pub async fn flush_queue(&self) {
        let drained = {
            let mut queue = self.queue.lock().await;
            queue.flush()
        };
        if drained.is_empty() {
            return;
        }

        let stdin = {
            let server = self.server.lock().await;
            server.as_ref().map(|link| Arc::clone(&link.stdin))
        };
        let Some(stdin) = stdin else {
            // Lost the child between flush() and now; put everything back.
            let mut queue = self.queue.lock().await;
            for raw in drained.into_iter().rev() {
                queue.requeue_at_head(raw);
            }
            return;
        };

        let mut iter = drained.into_iter();
        for raw in &mut iter {
            let mut guard = stdin.lock().await;
            if let Err(err) = guard.write_all(&raw).await {
                drop(guard);
                tracing::warn!(error = %err, "flush write failed, re-queueing and stopping drain");
                let mut queue = self.queue.lock().await;
                queue.requeue_at_head(raw);
                for remaining in iter.rev() {
                    queue.requeue_at_head(remaining);
                }
                return;
            }
        }
    }

    /// Write a raw record directly to the client's stdout, guarded against a
    /// stopped router. Used for the supervisor's synthetic protocol messages
    /// (crash errors, stale-request errors, the tools-changed notification).
    pub async fn write_to_client(&self, raw: Bytes) {
        if self.stopped.load(Ordering::SeqCst) {
            return;
        }
        let mut writer = self.client_writer.lock().await;
        if let Err(err) = writer.write_all(&raw).await {
            tracing::warn!(error = %err, "write to client stdout failed");
        }
    }

    async fn write_to_child(&self, raw: Bytes) {
        let stdin = {
            let server = self.server.lock().await;
            server.as_ref().map(|link| Arc::clone(&link.stdin))
        };
        let Some(stdin) = stdin else {
            let mut queue = self.queue.lock().await;
            queue.requeue_at_head(raw);
            return;
        };
        let mut guard = stdin.lock().await;
        if let Err(err) = guard.write_all(&raw).await {
            drop(guard);
            tracing::warn!(error = %err, "write to child stdin failed, queueing");
            let mut queue = self.queue.lock().await;
            queue.requeue_at_head(raw);
        }
    }

    /// Remove the client listener and disconnect the server. No further I/O
    /// is performed after this returns.
    pub async fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        self.disconnect_server().await;
    }
}

/// Concatenate complete lines into a single buffer for one write syscall.
fn concat_lines(lines: &[Bytes]) -> Bytes {
    if lines.len() == 1 {
        return lines[0].clone();
    }
    let total = lines.iter().map(Bytes::len).sum();
    let mut combined = Vec::with_capacity(total);
    for line in lines {
        combined.extend_from_slice(line);
    }
    Bytes::from(combined)
}

fn spawn_server_reader<W>(
    mut stdout: ChildStdout,
    tracker: Arc<Mutex<SessionTracker>>,
    client_writer: Arc<Mutex<W>>,
) -> JoinHandle<()>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        use tokio::io::AsyncReadExt;

        let mut buffer = LineBuffer::new();
        let mut chunk = vec![0u8; 8192];
        loop {
            let n = match stdout.read(&mut chunk).await {
                Ok(0) => break,
                Ok(n) => n,
                Err(err) => {
                    tracing::debug!(error = %err, "child stdout read failed");
                    break;
                }
            };

            let lines = buffer.push(&chunk[..n]);
            for line in lines {
                {
                    let mut tracker = tracker.lock().await;
                    tracker.process_server_data(line.clone());
                }
                let mut writer = client_writer.lock().await;
                if let Err(err) = writer.write_all(&line).await {
                    tracing::warn!(error = %err, "write to client stdout failed");
                }
            }
        }
    })
}

/// Strict JSON-RPC parsing used only by tests in this module to assert on
/// what the router forwarded; production code never needs a standalone
/// parser instance beyond the one embedded in [`SessionTracker`].
#[cfg(test)]
fn parse(raw: &Bytes) -> Option<crate::jsonrpc::ParsedMessage> {
    MessageParser::new().parse(raw)
}

#[cfg(test)]
#[path = "router_tests.rs"]
mod tests;
