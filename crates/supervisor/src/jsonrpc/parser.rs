// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Validates JSON-RPC 2.0 framing on a single line (spec.md §4.1 / C2).
//!
//! Rejects never raise past this boundary — malformed or wrong-version lines
//! are logged and dropped, per spec.md §7 (`ParseError` is "never surfaced").

use bytes::Bytes;

use super::message::{ParsedMessage, JSONRPC_VERSION};

#[derive(Debug, Default)]
pub struct MessageParser;

impl MessageParser {
    pub fn new() -> Self {
        Self
    }

    /// Attempt to decode one raw line as a JSON-RPC 2.0 message.
    ///
    /// Returns `None` (after logging) on a JSON decode failure or a
    /// `jsonrpc` field other than `"2.0"`. Never panics.
    pub fn parse(&self, raw: &Bytes) -> Option<ParsedMessage> {
        let parsed: ParsedMessage = match serde_json::from_slice(raw) {
            Ok(msg) => msg,
            Err(err) => {
                tracing::debug!(error = %err, "dropping line that failed JSON-RPC decode");
                return None;
            }
        };

        if parsed.jsonrpc != JSONRPC_VERSION {
            tracing::debug!(got = %parsed.jsonrpc, "dropping line with unexpected jsonrpc version");
            return None;
        }

        Some(parsed)
    }

    /// Parse every raw line, pairing each parsed view (or `None`, on reject)
    /// with the raw bytes it came from so observers can correlate the two.
    pub fn parse_all(&self, raw_lines: &[Bytes]) -> Vec<(Option<ParsedMessage>, Bytes)> {
        raw_lines
            .iter()
            .map(|raw| (self.parse(raw), raw.clone()))
            .collect()
    }
}

#[cfg(test)]
#[path = "parser_tests.rs"]
mod tests;
