// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! CLI argument parsing for the supervisor entry point.

use std::collections::HashMap;
use std::path::PathBuf;

use clap::Parser;

/// Hot-reloading supervisor for JSON-RPC stdio MCP servers.
///
/// Launch in place of the real MCP server; the supervisor spawns
/// `<server-command> [server-args...]`, relays stdio between the client and
/// that child, and rebuilds/restarts it transparently when a watched file
/// changes.
#[derive(Parser, Debug, Clone)]
#[command(name = "mcp-hot-reload", version, about)]
pub struct Cli {
    /// Executable to spawn as the child MCP server.
    #[arg(value_name = "SERVER_COMMAND")]
    pub server_command: String,

    /// Arguments passed through to the child MCP server.
    #[arg(value_name = "SERVER_ARGS", trailing_var_arg = true, allow_hyphen_values = true)]
    pub server_args: Vec<String>,

    /// Path or glob to watch for hot reload (repeatable).
    #[arg(long = "watch", value_name = "PATTERN")]
    pub watch: Vec<String>,

    /// Shell command to run before each restart.
    #[arg(long = "build", value_name = "COMMAND")]
    pub build: Option<String>,

    /// Debounce window (ms) for coalescing file-change bursts.
    #[arg(long = "debounce", value_name = "MS")]
    pub debounce_ms: Option<u64>,

    /// Working directory for the child process and the file watcher.
    #[arg(long = "cwd", value_name = "PATH")]
    pub cwd: Option<PathBuf>,

    /// Explicit config file, overriding auto-discovery in `cwd`.
    #[arg(long = "config", value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Extra `KEY=VALUE` environment variable for the child (repeatable).
    #[arg(long = "env", value_name = "KEY=VALUE")]
    pub env: Vec<String>,

    /// Emit one JSON object per log line instead of the human formatter.
    #[arg(long = "json-logs")]
    pub json_logs: bool,

    /// Increase log verbosity.
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,
}

impl Cli {
    /// Parse `KEY=VALUE` entries from `--env`, silently dropping malformed ones
    /// (a missing `=` is reported nowhere else so it is simply not applied).
    pub fn env_overrides(&self) -> HashMap<String, String> {
        self.env
            .iter()
            .filter_map(|kv| kv.split_once('='))
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }
}
