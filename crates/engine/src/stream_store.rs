// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Terminal Stream Store (§4.5, C5): the in-memory half of the rolling
//! output buffer, backed by [`TerminalCacheStore`] for the on-disk half a
//! reconnecting client can replay from once a stream has been evicted.
//!
//! [`PtyManager`](crate::pty::PtyManager)'s [`OutputSink`](crate::pty::OutputSink)
//! hook calls into this store before fan-out, matching §4.4's "push to the
//! stream store *first*" ordering.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use hearth_core::{ChatSessionId, ProjectId, PtySessionId, StreamId, StreamStatus, TerminalStream};
use hearth_storage::{CachedStream, StorageError, TerminalCacheStore};
use parking_lot::Mutex as SyncMutex;

use crate::error::EngineError;

/// Streams stay resident for this long after reaching a terminal status,
/// so a reconnecting client can still query missed output (§4.5).
pub const RETENTION_AFTER_COMPLETE: Duration = Duration::from_secs(300);

struct ResidentStream {
    stream: TerminalStream,
    project_path: Option<String>,
    cwd: Option<String>,
    /// Maps the PTY session back to the stream that mirrors its output,
    /// so the `OutputSink` hook can look a stream up by PTY session id.
    pty_session_id: Option<PtySessionId>,
}

/// Runtime registry of terminal streams, one per command invocation.
/// Completed/cancelled/errored streams are retained for
/// [`RETENTION_AFTER_COMPLETE`] and then dropped along with their cache
/// file.
pub struct TerminalStreamStore {
    streams: SyncMutex<HashMap<StreamId, ResidentStream>>,
    cache: TerminalCacheStore,
    now: Arc<dyn Fn() -> String + Send + Sync>,
}

impl TerminalStreamStore {
    pub fn new(cache: TerminalCacheStore, now: Arc<dyn Fn() -> String + Send + Sync>) -> Self {
        Self { streams: SyncMutex::new(HashMap::new()), cache, now }
    }

    /// Registers a new stream for a freshly-created PTY session.
    pub fn start(
        &self,
        session_id: ChatSessionId,
        command: impl Into<String>,
        project_id: Option<ProjectId>,
        project_path: Option<String>,
        cwd: Option<String>,
        pty_session_id: Option<PtySessionId>,
    ) -> StreamId {
        let stream = TerminalStream::new(session_id, command, project_id, (self.now)());
        let stream_id = stream.stream_id;
        self.streams.lock().insert(
            stream_id,
            ResidentStream { stream, project_path, cwd, pty_session_id },
        );
        stream_id
    }

    pub fn stream_id_for_pty_session(&self, pty_session_id: PtySessionId) -> Option<StreamId> {
        self.streams
            .lock()
            .iter()
            .find(|(_, r)| r.pty_session_id == Some(pty_session_id))
            .map(|(id, _)| *id)
    }

    /// Appends one output chunk, persisting the updated cache snapshot.
    pub fn push_output(&self, stream_id: StreamId, data: &str) -> Result<(), StorageError> {
        let mut streams = self.streams.lock();
        let Some(resident) = streams.get_mut(&stream_id) else { return Ok(()) };
        resident.stream.push(data);
        self.persist(resident)
    }

    /// Marks a stream terminal and persists its final state. The caller is
    /// responsible for scheduling [`Self::evict`] after the retention
    /// window (the daemon's lifecycle owns that timer).
    pub fn finish(&self, stream_id: StreamId, status: StreamStatus) -> Result<(), StorageError> {
        let mut streams = self.streams.lock();
        let Some(resident) = streams.get_mut(&stream_id) else { return Ok(()) };
        resident.stream.finish(status);
        self.persist(resident)
    }

    fn persist(&self, resident: &ResidentStream) -> Result<(), StorageError> {
        let cached = CachedStream::from_stream(
            &resident.stream,
            resident.project_path.clone(),
            resident.cwd.clone(),
            (self.now)(),
        );
        self.cache.write(resident.stream.session_id, &cached)
    }

    /// Output entries with index `>= from_index`, serving from memory when
    /// resident, else falling back to the on-disk cache (§4.5 reconnect path).
    pub fn missed_output(
        &self,
        stream_id: StreamId,
        session_id: ChatSessionId,
        from_index: u64,
    ) -> Result<Vec<String>, EngineError> {
        if let Some(resident) = self.streams.lock().get(&stream_id) {
            return Ok(resident.stream.missed_since(from_index).into_iter().map(str::to_string).collect());
        }
        let cached = self.cache.read(session_id)?;
        Ok(cached
            .output
            .into_iter()
            .skip(from_index.saturating_sub(cached.output_start_index) as usize)
            .collect())
    }

    /// Drops a stream's in-memory and on-disk state. Called once the
    /// retention window has elapsed after it reached a terminal status.
    pub fn evict(&self, stream_id: StreamId) -> Result<(), StorageError> {
        let session_id = self.streams.lock().remove(&stream_id).map(|r| r.stream.session_id);
        if let Some(session_id) = session_id {
            self.cache.remove(session_id)?;
        }
        Ok(())
    }

    pub fn status(&self, stream_id: StreamId) -> Option<StreamStatus> {
        self.streams.lock().get(&stream_id).map(|r| r.stream.status)
    }

    /// Session and project a stream belongs to, so a caller can target a
    /// broadcast without duplicating the stream's own bookkeeping.
    pub fn scope_of(&self, stream_id: StreamId) -> Option<(ChatSessionId, Option<ProjectId>)> {
        self.streams.lock().get(&stream_id).map(|r| (r.stream.session_id, r.stream.project_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, TerminalStreamStore) {
        let dir = tempfile::tempdir().unwrap();
        let cache = TerminalCacheStore::new(dir.path());
        let store = TerminalStreamStore::new(cache, Arc::new(|| "2026-01-01T00:00:00Z".to_string()));
        (dir, store)
    }

    #[test]
    fn pushed_output_is_visible_as_missed_output_from_zero() {
        let (_dir, store) = store();
        let session_id = ChatSessionId::new();
        let stream_id = store.start(session_id, "npm run dev", None, None, None, None);
        store.push_output(stream_id, "line one").unwrap();
        store.push_output(stream_id, "line two").unwrap();

        let missed = store.missed_output(stream_id, session_id, 0).unwrap();
        assert_eq!(missed, vec!["line one".to_string(), "line two".to_string()]);
    }

    #[test]
    fn finish_then_evict_removes_the_cache_file() {
        let (_dir, store) = store();
        let session_id = ChatSessionId::new();
        let stream_id = store.start(session_id, "npm test", None, None, None, None);
        store.push_output(stream_id, "ok").unwrap();
        store.finish(stream_id, StreamStatus::Completed).unwrap();
        assert_eq!(store.status(stream_id), Some(StreamStatus::Completed));

        store.evict(stream_id).unwrap();
        assert!(store.status(stream_id).is_none());
        let err = store.missed_output(stream_id, session_id, 0).unwrap_err();
        assert!(matches!(err, EngineError::Storage(StorageError::NotFound(_))));
    }

    #[test]
    fn missed_output_falls_back_to_the_cache_file_once_evicted_from_memory() {
        let (_dir, store) = store();
        let session_id = ChatSessionId::new();
        let stream_id = store.start(session_id, "npm test", None, None, None, None);
        store.push_output(stream_id, "a").unwrap();
        store.push_output(stream_id, "b").unwrap();

        // Remove only from memory, simulating a process restart that
        // still has the cache file on disk.
        store.streams.lock().remove(&stream_id);

        let missed = store.missed_output(stream_id, session_id, 0).unwrap();
        assert_eq!(missed, vec!["a".to_string(), "b".to_string()]);
    }
}
