// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Newline-delimited JSON-RPC 2.0 framing: line splitting (C1), message
//! validation (C2), and the parsed-message view shared by the rest of the
//! supervisor.

pub mod line_buffer;
pub mod message;
pub mod parser;

pub use line_buffer::LineBuffer;
pub use message::{JsonRpcErrorObject, ParsedMessage, RequestId, JSONRPC_VERSION};
pub use parser::MessageParser;
