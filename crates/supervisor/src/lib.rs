// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! `mcp-hot-reload`: a hot-reloading supervisor for JSON-RPC stdio MCP
//! servers. See `SPEC_FULL.md` at the repository root for the full design.

pub mod build;
pub mod cli;
pub mod config;
pub mod env;
pub mod error;
pub mod exit_translation;
pub mod hot_reload;
pub mod jsonrpc;
pub mod logging;
pub mod process;
pub mod protocol;
pub mod queue;
pub mod router;
pub mod session;
pub mod supervisor;
pub mod watch;

pub use config::Config;
pub use supervisor::Supervisor;
