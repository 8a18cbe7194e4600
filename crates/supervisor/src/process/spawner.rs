// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Launches a child with three configured stdio pipes (spec.md §4.4 / C5).

use std::collections::HashMap;
use std::path::Path;

use tokio::process::{Child, ChildStdin, ChildStdout, Command};

use crate::env::INSTANCE_MARKER;
use crate::error::SpawnError;

/// What the child is spawned with.
#[derive(Clone, Debug)]
pub struct SpawnSpec {
    pub command: String,
    pub args: Vec<String>,
    pub cwd: std::path::PathBuf,
    pub env: HashMap<String, String>,
}

/// A freshly spawned child with its stdin/stdout pipes split off. Stderr is
/// always inherited, per spec.md §6 ("stderr is pass-through to the
/// supervisor's stderr, not consumed"), so there is no stderr handle here.
pub struct SpawnedChild {
    pub child: Child,
    pub stdin: ChildStdin,
    pub stdout: ChildStdout,
}

/// Spawns child processes per a [`SpawnSpec`].
///
/// A trait (rather than a free function) so the Lifecycle Manager can be
/// driven with an in-memory fake in tests, per spec.md §9's note on
/// substituting small interface abstractions for dynamic dispatch.
pub trait Spawner: Send + Sync {
    fn spawn(&self, spec: &SpawnSpec) -> Result<SpawnedChild, SpawnError>;
}

/// Spawns a real OS process via `tokio::process::Command`.
#[derive(Debug, Default)]
pub struct ProcessSpawner;

impl Spawner for ProcessSpawner {
    fn spawn(&self, spec: &SpawnSpec) -> Result<SpawnedChild, SpawnError> {
        spawn_real(spec)
    }
}

fn spawn_real(spec: &SpawnSpec) -> Result<SpawnedChild, SpawnError> {
    let mut cmd = Command::new(&spec.command);
    cmd.args(&spec.args);
    cmd.current_dir(cwd_or_current(&spec.cwd));
    for (key, value) in &spec.env {
        cmd.env(key, value);
    }
    // The instance marker breaks recursive self-spawn (spec.md §6, §9).
    cmd.env(INSTANCE_MARKER, "1");

    cmd.stdin(std::process::Stdio::piped());
    cmd.stdout(std::process::Stdio::piped());
    cmd.stderr(std::process::Stdio::inherit());
    cmd.kill_on_drop(false);

    let mut child = cmd.spawn().map_err(|source| SpawnError::Io {
        command: spec.command.clone(),
        source,
    })?;

    let stdin = child
        .stdin
        .take()
        .ok_or(SpawnError::MissingStdio("stdin"))?;
    let stdout = child
        .stdout
        .take()
        .ok_or(SpawnError::MissingStdio("stdout"))?;

    Ok(SpawnedChild {
        child,
        stdin,
        stdout,
    })
}

fn cwd_or_current(path: &Path) -> &Path {
    if path.as_os_str().is_empty() {
        Path::new(".")
    } else {
        path
    }
}

#[cfg(test)]
#[path = "spawner_tests.rs"]
mod tests;
