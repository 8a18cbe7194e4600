// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Accumulates stream bytes into complete newline-terminated records,
//! retaining any partial tail for the next push (spec.md §4.1 / C1).

use bytes::{Bytes, BytesMut};

/// Incremental line splitter that preserves exact bytes (including the
/// trailing `\n`) so callers can forward the raw record unchanged.
#[derive(Debug, Default)]
pub struct LineBuffer {
    tail: BytesMut,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk of bytes (possibly mid-message). Returns each complete
    /// line found, in order, with its trailing `\n` re-attached. The final
    /// incomplete segment, if any, is retained for the next call.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Bytes> {
        if chunk.is_empty() {
            return Vec::new();
        }

        self.tail.extend_from_slice(chunk);

        let mut lines = Vec::new();
        loop {
            let Some(newline_at) = self.tail.iter().position(|&b| b == b'\n') else {
                break;
            };
            let line = self.tail.split_to(newline_at + 1);
            if line.len() > 1 {
                // Skip lines that are newline-only (empty record).
                lines.push(line.freeze());
            }
        }
        lines
    }

    /// Discard any retained partial tail.
    pub fn clear(&mut self) {
        self.tail.clear();
    }

    /// Bytes currently retained as an incomplete record.
    pub fn pending(&self) -> &[u8] {
        &self.tail
    }
}

#[cfg(test)]
#[path = "line_buffer_tests.rs"]
mod tests;
