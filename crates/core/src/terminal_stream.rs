// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Rolling output buffer for a PTY session, mirrored to a per-session cache
//! file by the storage crate for reconnect/replay.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::chat_session::ChatSessionId;
use crate::define_id;
use crate::project::ProjectId;

define_id! {
    /// Short random ID for a [`TerminalStream`].
    pub struct StreamId("str-");
}

/// Lifecycle status of a terminal stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamStatus {
    Running,
    Completed,
    Cancelled,
    Error,
}

impl StreamStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, StreamStatus::Running)
    }
}

/// Streams ring buffers are trimmed to at most this many entries (invariant 7).
pub const MAX_OUTPUT_ENTRIES: usize = 2000;

/// Terminal output streams stay resident this long after completion so a
/// reconnecting client can still read the tail (§4.5).
pub const RETENTION_AFTER_COMPLETE_SECS: u64 = 5 * 60;

/// A logical channel around a PTY session: rolling output buffer +
/// persistence + status.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TerminalStream {
    pub stream_id: StreamId,
    pub session_id: ChatSessionId,
    pub command: String,
    pub project_id: Option<ProjectId>,
    pub output: VecDeque<String>,
    /// Index of the first entry currently in `output`; never decreases
    /// (invariant 7), so clients can request `fromIndex` deltas.
    pub output_start_index: u64,
    pub status: StreamStatus,
    pub started_at: String,
}

impl TerminalStream {
    pub fn new(session_id: ChatSessionId, command: impl Into<String>, project_id: Option<ProjectId>, started_at: impl Into<String>) -> Self {
        Self {
            stream_id: StreamId::new(),
            session_id,
            command: command.into(),
            project_id,
            output: VecDeque::new(),
            output_start_index: 0,
            status: StreamStatus::Running,
            started_at: started_at.into(),
        }
    }

    /// Appends a chunk, trimming the ring buffer to `MAX_OUTPUT_ENTRIES`
    /// and advancing `output_start_index` by however many entries were
    /// evicted.
    pub fn push(&mut self, chunk: impl Into<String>) {
        self.output.push_back(chunk.into());
        while self.output.len() > MAX_OUTPUT_ENTRIES {
            self.output.pop_front();
            self.output_start_index += 1;
        }
    }

    /// Returns entries from `from_index` onward, relative to the stream's
    /// absolute indexing (not the in-memory buffer's).
    pub fn missed_since(&self, from_index: u64) -> Vec<&str> {
        if from_index < self.output_start_index {
            // Caller's watermark predates what we retain in memory; the
            // storage crate falls back to the cache file in that case.
            return self.output.iter().map(String::as_str).collect();
        }
        let skip = (from_index - self.output_start_index) as usize;
        self.output.iter().skip(skip).map(String::as_str).collect()
    }

    pub fn finish(&mut self, status: StreamStatus) {
        debug_assert!(status.is_terminal());
        self.status = status;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_trims_ring_buffer_and_advances_start_index() {
        let mut stream = TerminalStream::new(ChatSessionId::new(), "ls", None, "2026-01-01T00:00:00Z");
        for i in 0..MAX_OUTPUT_ENTRIES + 10 {
            stream.push(format!("line-{i}"));
        }
        assert_eq!(stream.output.len(), MAX_OUTPUT_ENTRIES);
        assert_eq!(stream.output_start_index, 10);
    }

    #[test]
    fn missed_since_returns_only_newer_entries() {
        let mut stream = TerminalStream::new(ChatSessionId::new(), "ls", None, "2026-01-01T00:00:00Z");
        stream.push("a");
        stream.push("b");
        stream.push("c");
        assert_eq!(stream.missed_since(1), vec!["b", "c"]);
    }

    #[test]
    fn finish_sets_terminal_status() {
        let mut stream = TerminalStream::new(ChatSessionId::new(), "ls", None, "2026-01-01T00:00:00Z");
        stream.finish(StreamStatus::Completed);
        assert_eq!(stream.status, StreamStatus::Completed);
        assert!(stream.status.is_terminal());
    }
}
