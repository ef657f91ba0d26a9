// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! hearth-core: shared entities, IDs, clock, and error taxonomy for the
//! workspace's coordination layer (router, PTY manager, snapshot engine,
//! browser tab manager).

pub mod macros;

pub mod branch;
pub mod browser_tab;
pub mod chat_session;
pub mod checkpoint;
pub mod clock;
pub mod error;
pub mod id;
pub mod mcp_control;
pub mod message;
pub mod project;
pub mod pty_session;
pub mod snapshot;
pub mod terminal_stream;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use branch::{Branch, BranchId};
pub use browser_tab::{
    BrowserTab, BrowserTabId, DeviceSize, DialogId, PendingDialog, Rotation, MAX_CONSOLE_ENTRIES,
};
pub use chat_session::{ChatSession, ChatSessionId};
pub use checkpoint::{CheckpointTree, CheckpointTreeState};
pub use clock::{Clock, FakeClock, SystemClock};
pub use error::{ErrorCode, WireError};
pub use id::{short, IdBuf, ID_MAX_LEN};
pub use mcp_control::McpControlState;
pub use message::{Message, MessageId, MessageRole};
pub use project::{Project, ProjectId};
pub use pty_session::{
    PtySession, PtySessionId, PtySize, IDLE_KILL_THRESHOLD_MS, SWEEP_INTERVAL_MS,
};
pub use snapshot::{DeltaChanges, Snapshot, SnapshotId, SnapshotType};
pub use terminal_stream::{
    StreamId, StreamStatus, TerminalStream, MAX_OUTPUT_ENTRIES, RETENTION_AFTER_COMPLETE_SECS,
};
