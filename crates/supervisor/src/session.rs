// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Remembers the last `initialize` request/response and the single most
//! recent in-flight request, so a replacement child can be silently
//! re-initialized and a crash can be turned into a structured error
//! response (spec.md §4.3 / C4).

use std::time::Instant;

use bytes::Bytes;

use crate::jsonrpc::{MessageParser, RequestId};

/// `{id, method}` of the most recent client request with no observed
/// response yet. At most one is tracked at a time.
#[derive(Clone, Debug)]
pub struct PendingRequest {
    pub id: RequestId,
    pub method: String,
    pub raw: Bytes,
    pub timestamp: Instant,
}

/// The last `initialize` request sent by the client and whether the child
/// has acknowledged it. Survives child restarts — on reattach the
/// supervisor replays `raw` to the new child (spec.md §3).
#[derive(Clone, Debug)]
pub struct InitializeSnapshot {
    pub raw: Bytes,
    pub id: RequestId,
    pub initialized: bool,
}

/// Observes both relay directions and maintains the pending-request and
/// initialize snapshot state. `process_*` always returns its input
/// unchanged — transparency is a hard contract (spec.md §4.3, §8).
#[derive(Debug, Default)]
pub struct SessionTracker {
    parser: MessageParser,
    initialize: Option<InitializeSnapshot>,
    pending: Option<PendingRequest>,
}

impl SessionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Observe one raw record flowing client → child. Returns `raw`
    /// unchanged.
    pub fn process_client_data(&mut self, raw: Bytes) -> Bytes {
        if let Some(msg) = self.parser.parse(&raw) {
            if msg.method.as_deref() == Some("initialize") {
                if let Some(id) = msg.id.clone() {
                    self.initialize = Some(InitializeSnapshot {
                        raw: raw.clone(),
                        id,
                        initialized: false,
                    });
                }
            }
            if let (Some(id), Some(method)) = (msg.id.clone(), msg.method.clone()) {
                self.pending = Some(PendingRequest {
                    id,
                    method,
                    raw: raw.clone(),
                    timestamp: Instant::now(),
                });
            }
        }
        raw
    }

    /// Observe one raw record flowing child → client. Returns `raw`
    /// unchanged.
    pub fn process_server_data(&mut self, raw: Bytes) -> Bytes {
        if let Some(msg) = self.parser.parse(&raw) {
            if let Some(ref id) = msg.id {
                if let Some(ref pending) = self.pending {
                    if &pending.id == id {
                        self.pending = None;
                    }
                }
                if let Some(ref mut snapshot) = self.initialize {
                    if &snapshot.id == id {
                        snapshot.initialized = msg.result.is_some();
                    }
                }
            }
        }
        raw
    }

    pub fn initialize_snapshot(&self) -> Option<&InitializeSnapshot> {
        self.initialize.as_ref()
    }

    pub fn pending_request(&self) -> Option<&PendingRequest> {
        self.pending.as_ref()
    }

    /// Take the pending request if it is older than `max_age`, clearing it.
    /// Used for the stale-request idle sweep during a restart.
    pub fn take_stale_pending(&mut self, max_age: std::time::Duration) -> Option<PendingRequest> {
        let is_stale = self
            .pending
            .as_ref()
            .is_some_and(|p| p.timestamp.elapsed() >= max_age);
        if is_stale {
            self.pending.take()
        } else {
            None
        }
    }

    /// Clear the pending request, e.g. after synthesizing a crash error.
    pub fn clear_pending(&mut self) -> Option<PendingRequest> {
        self.pending.take()
    }

    /// Clear all tracked state. Called only on explicit shutdown.
    pub fn reset(&mut self) {
        self.initialize = None;
        self.pending = None;
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
