// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Builds the three synthetic JSON-RPC records the Supervisor itself ever
//! writes (spec.md §6): the crash error, the stale-request timeout error,
//! and the tools-changed notification.

use bytes::Bytes;
use serde_json::json;

use crate::jsonrpc::RequestId;

const INTERNAL_ERROR_CODE: i64 = -32603;

fn request_id_to_value(id: &RequestId) -> serde_json::Value {
    match id {
        RequestId::String(s) => json!(s),
        RequestId::Integer(n) => json!(n),
        RequestId::Null => serde_json::Value::Null,
    }
}

// spec.md §7: "If it cannot produce a valid synthetic response, it must drop
// the synthetic and rely on client-side timeout" — so every builder here
// returns `Option<Bytes>` rather than panicking on a (theoretical) encode
// failure, and callers simply skip the write on `None`.

fn error_record(id: &RequestId, message: String, method: &str) -> Option<Bytes> {
    let body = json!({
        "jsonrpc": "2.0",
        "id": request_id_to_value(id),
        "error": {
            "code": INTERNAL_ERROR_CODE,
            "message": message,
            "data": { "method": method },
        },
    });
    let mut line = serde_json::to_vec(&body).ok()?;
    line.push(b'\n');
    Some(Bytes::from(line))
}

/// Response to a pending request whose child crashed while it was
/// in flight (spec.md §6, §4.10).
pub fn crash_error(id: &RequestId, method: &str, translated_exit: &str) -> Option<Bytes> {
    error_record(
        id,
        format!("Server terminated unexpectedly ({translated_exit})"),
        method,
    )
}

/// Response to a pending request abandoned by the 30s idle sweep that runs
/// while a restart is in flight (spec.md §5, Open Question 2).
pub fn stale_request_error(id: &RequestId, method: &str) -> Option<Bytes> {
    error_record(id, "Request timed out during restart".to_string(), method)
}

/// `notifications/tools/list_changed`, sent after every successful restart
/// (spec.md §4.10, Open Question 1: sent unconditionally, no tool-set
/// diffing).
pub fn tools_list_changed() -> Option<Bytes> {
    let body = json!({
        "jsonrpc": "2.0",
        "method": "notifications/tools/list_changed",
        "params": {},
    });
    let mut line = serde_json::to_vec(&body).ok()?;
    line.push(b'\n');
    Some(Bytes::from(line))
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
