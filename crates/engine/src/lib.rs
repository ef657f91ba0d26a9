// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! hearth-engine: the Snapshot Engine (C3), PTY Session Manager (C4),
//! Terminal Stream Store (C5), and Tunnel Manager (C7) — the coordination
//! layer's process- and filesystem-facing subsystems.

pub mod error;
pub mod pty;
pub mod snapshot;
pub mod stream_store;
pub mod tunnel;

pub use error::EngineError;
pub use pty::{OutputSink, PtyEvent, PtyManager, PtySubscription};
pub use snapshot::{RestoreOutcome, SnapshotEngine, Timeline, TimelineNode};
pub use stream_store::{TerminalStreamStore, RETENTION_AFTER_COMPLETE};
pub use tunnel::{ProcessTunnelBinary, TunnelBinary, TunnelKey, TunnelManager, TunnelProgress, TunnelStage};
