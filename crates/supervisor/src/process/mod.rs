// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Child process management: spawning (C5), readiness (C6), termination
//! (C7), and the single-slot lifecycle state machine that ties them
//! together (C8).

pub mod lifecycle;
pub mod readiness;
pub mod spawner;
pub mod terminator;

pub use lifecycle::{ChildHandle, LifecycleManager};
pub use readiness::{ReadinessChecker, ReadinessConfig, SettleReadinessChecker};
pub use spawner::{ProcessSpawner, SpawnSpec, SpawnedChild, Spawner};
pub use terminator::{EscalatingTerminator, TerminationProfile, Terminator};
