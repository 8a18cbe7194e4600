// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! FIFO (optionally priority-ordered) holding area for raw records while no
//! child is attached (spec.md §4.2 / C3).

use std::collections::VecDeque;

use bytes::Bytes;

use crate::jsonrpc::MessageParser;

/// Whether [`MessageQueue::add`] assigns a priority rank by inspecting the
/// parsed method, or just appends in arrival order.
///
/// Defaults to FIFO per spec.md §9 ("preserve it as a configurable mode but
/// default to FIFO to minimize client surprise").
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum QueueMode {
    #[default]
    Fifo,
    Priority,
}

#[derive(Debug)]
struct Entry {
    raw: Bytes,
    rank: u8,
    seq: u64,
}

/// Ordered holding area for records that arrived with no child attached.
#[derive(Debug, Default)]
pub struct MessageQueue {
    mode: QueueMode,
    entries: VecDeque<Entry>,
    next_seq: u64,
}

impl MessageQueue {
    pub fn new(mode: QueueMode) -> Self {
        Self {
            mode,
            entries: VecDeque::new(),
            next_seq: 0,
        }
    }

    /// Append a raw record. In priority mode the rank is derived from the
    /// parsed method: `initialize` (0) < `tools/*`/`resources/*` (1) <
    /// other requests (2) < notifications (3); ties keep FIFO order.
    pub fn add(&mut self, raw: Bytes) {
        let rank = match self.mode {
            QueueMode::Fifo => 0,
            QueueMode::Priority => rank_of(&raw),
        };
        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries.push_back(Entry { raw, rank, seq });
    }

    /// Re-queue a record at the head (used when a flushed write fails
    /// mid-drain, per spec.md §4.2).
    pub fn requeue_at_head(&mut self, raw: Bytes) {
        self.entries.push_front(Entry {
            raw,
            rank: 0,
            seq: 0,
        });
    }

    /// Drain all queued records in rank-then-FIFO order, emptying the queue.
    pub fn flush(&mut self) -> Vec<Bytes> {
        let mut drained: Vec<Entry> = self.entries.drain(..).collect();
        drained.sort_by(|a, b| a.rank.cmp(&b.rank).then(a.seq.cmp(&b.seq)));
        drained.into_iter().map(|e| e.raw).collect()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn size(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn rank_of(raw: &Bytes) -> u8 {
    let parser = MessageParser::new();
    match parser.parse(raw) {
        Some(msg) if msg.method.as_deref() == Some("initialize") => 0,
        Some(msg) if msg.is_notification() => 3,
        Some(msg) => match msg.method.as_deref() {
            Some(m) if m.starts_with("tools/") || m.starts_with("resources/") => 1,
            _ => 2,
        },
        None => 2,
    }
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
