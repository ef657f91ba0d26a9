// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Persists a [`TerminalStream`] to `.terminal-output-cache/<session_id>.json`
//! so a reconnecting client can replay output the in-memory stream store
//! has already evicted (§4.5).

use std::path::PathBuf;

use hearth_core::{ChatSessionId, ProjectId, StreamId, StreamStatus, TerminalStream};
use serde::{Deserialize, Serialize};

use crate::error::StorageError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedStream {
    pub stream_id: StreamId,
    pub session_id: ChatSessionId,
    pub command: String,
    pub project_id: Option<ProjectId>,
    pub project_path: Option<String>,
    pub cwd: Option<String>,
    pub started_at: String,
    pub status: StreamStatus,
    pub output: Vec<String>,
    pub output_start_index: u64,
    pub last_updated: String,
}

impl CachedStream {
    pub fn from_stream(stream: &TerminalStream, project_path: Option<String>, cwd: Option<String>, last_updated: impl Into<String>) -> Self {
        Self {
            stream_id: stream.stream_id,
            session_id: stream.session_id,
            command: stream.command.clone(),
            project_id: stream.project_id,
            project_path,
            cwd,
            started_at: stream.started_at.clone(),
            status: stream.status,
            output: stream.output.iter().cloned().collect(),
            output_start_index: stream.output_start_index,
            last_updated: last_updated.into(),
        }
    }
}

/// Directory-rooted cache of terminal stream snapshots, one JSON file per
/// session id.
pub struct TerminalCacheStore {
    root: PathBuf,
}

impl TerminalCacheStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, session_id: ChatSessionId) -> PathBuf {
        self.root.join(format!("{session_id}.json"))
    }

    pub fn write(&self, session_id: ChatSessionId, cached: &CachedStream) -> Result<(), StorageError> {
        std::fs::create_dir_all(&self.root)?;
        let json = serde_json::to_vec_pretty(cached)?;
        std::fs::write(self.path_for(session_id), json)?;
        Ok(())
    }

    pub fn read(&self, session_id: ChatSessionId) -> Result<CachedStream, StorageError> {
        let path = self.path_for(session_id);
        let bytes = std::fs::read(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StorageError::NotFound(format!("terminal cache for session {session_id}"))
            } else {
                StorageError::Io(e)
            }
        })?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Removes a session's cache file. Called 5 minutes after a stream
    /// reaches a terminal status (§4.5 retention window).
    pub fn remove(&self, session_id: ChatSessionId) -> Result<(), StorageError> {
        match std::fs::remove_file(self.path_for(session_id)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::Io(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_stream() -> TerminalStream {
        let mut s = TerminalStream::new(ChatSessionId::new(), "npm run dev", None, "2026-01-01T00:00:00Z");
        s.push("starting...");
        s
    }

    #[test]
    fn write_then_read_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let cache = TerminalCacheStore::new(dir.path());
        let stream = sample_stream();
        let cached = CachedStream::from_stream(&stream, Some("/home/demo".into()), Some("/home/demo".into()), "2026-01-01T00:00:01Z");

        cache.write(stream.session_id, &cached).unwrap();
        let back = cache.read(stream.session_id).unwrap();
        assert_eq!(back.command, "npm run dev");
        assert_eq!(back.output, vec!["starting...".to_string()]);
    }

    #[test]
    fn remove_is_idempotent_for_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let cache = TerminalCacheStore::new(dir.path());
        cache.remove(ChatSessionId::new()).unwrap();
    }

    #[test]
    fn reading_missing_cache_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let cache = TerminalCacheStore::new(dir.path());
        let err = cache.read(ChatSessionId::new()).unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
    }
}
