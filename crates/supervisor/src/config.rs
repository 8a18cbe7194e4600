// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Supervisor configuration.
//!
//! Assembled from, in increasing priority: built-in defaults, an optional
//! `mcp-hot-reload.toml` / `.json` file in the working directory, then CLI
//! flags. Immutable once constructed (spec.md §3).

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::cli::Cli;

/// Default debounce window applied to file-watch events.
pub const DEFAULT_DEBOUNCE_MS: u64 = 300;
/// Default ceiling on how long the build command may run.
pub const DEFAULT_BUILD_TIMEOUT_MS: u64 = 60_000;

/// Watched file patterns: either a single pattern or a list.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(untagged)]
pub enum WatchPattern {
    #[default]
    None,
    One(String),
    Many(Vec<String>),
}

impl WatchPattern {
    /// Normalize to a flat list of patterns, empty when watching is disabled.
    pub fn as_list(&self) -> Vec<String> {
        match self {
            WatchPattern::None => Vec::new(),
            WatchPattern::One(p) => vec![p.clone()],
            WatchPattern::Many(ps) => ps.clone(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.as_list().is_empty()
    }
}

/// Immutable supervisor configuration (spec.md §3's `Config`).
#[derive(Clone, Debug)]
pub struct Config {
    /// Executable to spawn as the child MCP server.
    pub server_command: String,
    /// Arguments passed to `server_command`.
    pub server_args: Vec<String>,
    /// Working directory for the child process and the file watcher.
    pub cwd: PathBuf,
    /// Extra environment variables merged over the inherited environment.
    pub env: HashMap<String, String>,
    /// Patterns (globs or directories) to watch for hot reload. Empty disables it.
    pub watch_patterns: Vec<String>,
    /// Debounce window for coalescing file-change bursts.
    pub debounce_ms: u64,
    /// Shell command run before each restart. Empty/whitespace = no-op success.
    pub build_command: String,
    /// Ceiling on how long the build command may run.
    pub build_timeout_ms: u64,
    /// Emit one JSON object per log line instead of the human formatter.
    pub json_logs: bool,
    /// Increase log verbosity.
    pub verbose: bool,
}

impl Config {
    /// Build the effective config from a parsed CLI invocation, optionally
    /// layering in a config file discovered in `cwd`.
    pub fn from_cli(cli: &Cli) -> Result<Self, ConfigError> {
        let cwd = cli
            .cwd
            .clone()
            .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

        let file = cli
            .config
            .clone()
            .or_else(|| default_config_path(&cwd))
            .map(|path| ConfigFile::load(&path))
            .transpose()?
            .unwrap_or_default();

        if cli.server_command.is_empty() {
            return Err(ConfigError::Validation(
                "serverCommand is required".to_string(),
            ));
        }

        let watch_patterns = if !cli.watch.is_empty() {
            cli.watch.clone()
        } else {
            file.watch_pattern.as_list()
        };

        let debounce_ms = cli
            .debounce_ms
            .or(file.debounce_ms)
            .unwrap_or(DEFAULT_DEBOUNCE_MS);

        let build_command = cli
            .build
            .clone()
            .or(file.build_command.clone())
            .unwrap_or_default();

        let build_timeout_ms = file.build_timeout_ms.unwrap_or(DEFAULT_BUILD_TIMEOUT_MS);

        let mut env = file.env.clone();
        env.extend(cli.env_overrides());

        Ok(Self {
            server_command: cli.server_command.clone(),
            server_args: cli.server_args.clone(),
            cwd,
            env,
            watch_patterns,
            debounce_ms,
            build_command,
            build_timeout_ms,
            json_logs: cli.json_logs,
            verbose: cli.verbose,
        })
    }

    pub fn hot_reload_enabled(&self) -> bool {
        !self.watch_patterns.is_empty()
    }
}

/// On-disk config file shape (optional). Field names are `camelCase` to match
/// the rest of this codebase's JSON-facing types.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
struct ConfigFile {
    #[serde(default)]
    watch_pattern: WatchPattern,
    #[serde(default)]
    debounce_ms: Option<u64>,
    #[serde(default)]
    build_command: Option<String>,
    #[serde(default)]
    build_timeout_ms: Option<u64>,
    #[serde(default)]
    env: HashMap<String, String>,
}

impl ConfigFile {
    fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.display().to_string(), e.to_string()))?;

        match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => toml::from_str(&content)
                .map_err(|e| ConfigError::Parse(path.display().to_string(), e.to_string())),
            _ => json5::from_str(&content)
                .or_else(|_| serde_json::from_str(&content))
                .map_err(|e| ConfigError::Parse(path.display().to_string(), e.to_string())),
        }
    }
}

fn default_config_path(cwd: &Path) -> Option<PathBuf> {
    for name in ["mcp-hot-reload.toml", "mcp-hot-reload.json"] {
        let candidate = cwd.join(name);
        if candidate.is_file() {
            return Some(candidate);
        }
    }
    None
}

/// Errors that can occur while assembling the supervisor configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config from {0}: {1}")]
    Io(String, String),
    #[error("failed to parse config {0}: {1}")]
    Parse(String, String),
    #[error("invalid configuration: {0}")]
    Validation(String),
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
