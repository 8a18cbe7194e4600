// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Structured logging setup.
//!
//! Every component emits events through `tracing` rather than ad hoc
//! `eprintln!`. `--json-logs` switches the formatter to one JSON object per
//! line (machine-readable); otherwise a compact human-readable formatter is
//! used. Both write to stderr so stdout stays reserved for the JSON-RPC wire
//! protocol (spec.md §6: child stderr is pass-through, and the supervisor
//! itself must never pollute its own stdout).

use tracing_subscriber::EnvFilter;

/// Install the global `tracing` subscriber. Call once, at process startup.
pub fn init(json_logs: bool, verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("mcp_hot_reload={default_level}")));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if json_logs {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}
