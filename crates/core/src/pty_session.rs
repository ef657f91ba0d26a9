// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! PTY session bookkeeping. The live shell process and OS-thread reader
//! live in the engine crate; this module owns the reusable, serializable
//! session shape and its `output_seq` discipline.

use serde::{Deserialize, Serialize};

use crate::define_id;
use crate::project::ProjectId;

define_id! {
    /// Short random ID for a [`PtySession`].
    pub struct PtySessionId("pty-");
}

/// Terminal size in columns/rows, mirrored to the PTY via ioctl on resize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PtySize {
    pub cols: u16,
    pub rows: u16,
}

impl Default for PtySize {
    fn default() -> Self {
        Self { cols: 80, rows: 24 }
    }
}

/// Bookkeeping record for one interactive shell. Owned by the PTY manager.
///
/// Invariant 5: a `PtySession` exists in the manager ⇒ its shell process is
/// alive or an exit event has already been dispatched for it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PtySession {
    pub id: PtySessionId,
    pub cwd: String,
    pub project_id: Option<ProjectId>,
    pub size: PtySize,
    pub created_at: String,
    pub last_activity_at: String,
    /// Monotonically increasing sequence number for fanned-out output
    /// chunks, allowing clients to deduplicate replayed frames.
    pub output_seq: u64,
    pub exited: bool,
}

impl PtySession {
    pub fn new(
        cwd: impl Into<String>,
        project_id: Option<ProjectId>,
        size: PtySize,
        created_at: impl Into<String>,
    ) -> Self {
        let created_at = created_at.into();
        Self {
            id: PtySessionId::new(),
            cwd: cwd.into(),
            project_id,
            size,
            created_at: created_at.clone(),
            last_activity_at: created_at,
            output_seq: 0,
            exited: false,
        }
    }

    pub fn touch(&mut self, now: impl Into<String>) {
        self.last_activity_at = now.into();
    }

    /// Advances the output sequence and returns the new value. Called once
    /// per flush, after every pending chunk in that flush has been fanned
    /// out, so `output_seq` always identifies a *batch* boundary.
    pub fn next_output_seq(&mut self) -> u64 {
        self.output_seq += 1;
        self.output_seq
    }

    pub fn mark_exited(&mut self) {
        self.exited = true;
    }

    pub fn idle_for(&self, now_epoch_ms: u64, last_activity_epoch_ms: u64) -> bool {
        now_epoch_ms.saturating_sub(last_activity_epoch_ms) > IDLE_KILL_THRESHOLD_MS
    }
}

/// Sessions idle longer than this are killed by the periodic sweep (§4.4).
pub const IDLE_KILL_THRESHOLD_MS: u64 = 60 * 60 * 1000;
/// Interval between idle sweeps.
pub const SWEEP_INTERVAL_MS: u64 = 15 * 60 * 1000;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_seq_increments_monotonically() {
        let mut session = PtySession::new("/tmp", None, PtySize::default(), "2026-01-01T00:00:00Z");
        assert_eq!(session.next_output_seq(), 1);
        assert_eq!(session.next_output_seq(), 2);
        assert_eq!(session.next_output_seq(), 3);
    }

    #[test]
    fn idle_for_respects_one_hour_threshold() {
        let session = PtySession::new("/tmp", None, PtySize::default(), "2026-01-01T00:00:00Z");
        assert!(!session.idle_for(1_000, 0));
        assert!(session.idle_for(IDLE_KILL_THRESHOLD_MS + 1, 0));
    }

    #[test]
    fn mark_exited_is_idempotent() {
        let mut session = PtySession::new("/tmp", None, PtySize::default(), "2026-01-01T00:00:00Z");
        session.mark_exited();
        session.mark_exited();
        assert!(session.exited);
    }
}
