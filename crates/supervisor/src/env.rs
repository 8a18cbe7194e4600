// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access.
//!
//! Use these accessors instead of calling `std::env::var()` directly, so the
//! set of environment variables this supervisor reacts to stays discoverable
//! in one place.

/// Set (to `"1"`) in the child's environment before spawn, and checked on
/// supervisor startup. Its presence means this process *is* the child of
/// another supervisor instance — starting would recurse forever, so startup
/// refuses with [`crate::error::SupervisorError::RecursiveInvocation`].
///
/// Initialized once at startup and never mutated afterwards (spec.md §9:
/// "the one module-wide piece of state").
pub const INSTANCE_MARKER: &str = "MCP_HOT_RELOAD_INSTANCE";

/// Returns `true` if this process was itself spawned as the child of an
/// `mcp-hot-reload` supervisor.
pub fn is_nested_instance() -> bool {
    std::env::var(INSTANCE_MARKER).is_ok()
}
