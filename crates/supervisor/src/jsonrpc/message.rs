// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! JSON-RPC 2.0 message types (parsed view).
//!
//! These mirror the fields spec.md §3 says the supervisor is allowed to look
//! at: `jsonrpc`, `id`, `method`, `result`, `error`. Nothing else is ever
//! inspected — the Non-goals in spec.md §1 are explicit that payloads beyond
//! these fields are never touched.

use serde::Deserialize;

pub const JSONRPC_VERSION: &str = "2.0";

/// A request/response id, which the spec allows to be a string, number, or
/// null.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    String(String),
    Integer(i64),
    Null,
}

/// `{code, message, data}` per JSON-RPC 2.0.
#[derive(Clone, Debug, Deserialize)]
pub struct JsonRpcErrorObject {
    pub code: i64,
    pub message: String,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

/// The fields the supervisor cares about, decoded from one line of input.
/// Constructed only by [`super::parser::MessageParser`], which enforces the
/// `jsonrpc: "2.0"` invariant before this type is ever produced.
#[derive(Clone, Debug, Deserialize)]
pub struct ParsedMessage {
    pub jsonrpc: String,
    #[serde(default)]
    pub id: Option<RequestId>,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub result: Option<serde_json::Value>,
    #[serde(default)]
    pub error: Option<JsonRpcErrorObject>,
}

impl ParsedMessage {
    pub fn is_request(&self) -> bool {
        self.id.is_some() && self.method.is_some()
    }

    pub fn is_response(&self) -> bool {
        self.id.is_some() && self.method.is_none() && (self.result.is_some() || self.error.is_some())
    }

    pub fn is_notification(&self) -> bool {
        self.id.is_none() && self.method.is_some()
    }
}
