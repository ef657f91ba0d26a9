// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared process-wide singletons, one instance per running daemon (§5
//! "Per-subsystem singletons").

use std::collections::HashMap;
use std::sync::Arc;

use hearth_adapters::webrtc_bridge::StreamSession;
use hearth_adapters::{BrowserTabManager, McpDispatcher, UnavailableBrowserEngine};
use hearth_core::{BrowserTabId, Clock, ProjectId, SystemClock};
use hearth_engine::{PtyManager, SnapshotEngine, TerminalStreamStore, TunnelManager};
use hearth_shell::GitService;
use hearth_storage::{BlobStore, CacheEntry, InMemoryDb, TerminalCacheStore, TreeStore};
use parking_lot::Mutex as SyncMutex;

use crate::lifecycle::Config;
use crate::registry::ConnectionRegistry;
use crate::sink::RouterOutputSink;

/// Shared cross-connection state: every sub-router handler closes over an
/// `Arc<AppState>` (mirroring the teacher's `ListenCtx`, §4.6).
pub struct AppState {
    pub db: Arc<InMemoryDb>,
    pub snapshots: SnapshotEngine<InMemoryDb>,
    pub pty: Arc<PtyManager>,
    pub streams: Arc<TerminalStreamStore>,
    pub tunnels: Arc<TunnelManager>,
    pub browser: Arc<BrowserTabManager<UnavailableBrowserEngine>>,
    pub mcp: Arc<McpDispatcher<UnavailableBrowserEngine>>,
    pub connections: Arc<ConnectionRegistry>,
    /// One in-flight WebRTC peer per tab currently previewing (§4.9). Keyed
    /// by tab rather than connection, since the stream outlives any single
    /// client reconnect.
    pub preview_streams: SyncMutex<HashMap<BrowserTabId, Arc<StreamSession>>>,
    /// PTY session id -> terminal stream id, so the output sink can find
    /// which stream to append to (populated by the `terminal:create` handler).
    pub stream_by_pty: SyncMutex<HashMap<hearth_core::PtySessionId, hearth_core::StreamId>>,
    /// Per-project mtime+size hash cache threaded through every
    /// [`SnapshotEngine::capture`] call for that project (§4.2/§4.3).
    pub hash_cache: SyncMutex<HashMap<ProjectId, HashMap<String, CacheEntry>>>,
    /// Sanitized environment every shelled-out child process (git, the
    /// tunnel binary) inherits (§4.1).
    pub child_env: HashMap<String, String>,
    pub clock: SystemClock,
}

impl AppState {
    pub fn build(config: &Config, tunnel_binary: Arc<dyn hearth_engine::TunnelBinary>) -> Arc<Self> {
        let db = Arc::new(InMemoryDb::new());
        let blobs = BlobStore::new(config.blobs_path.clone());
        let trees = TreeStore::new(config.trees_path.clone());
        let snapshots = SnapshotEngine::new(db.clone(), blobs, trees);

        let connections = Arc::new(ConnectionRegistry::new());
        let now_fn = now_closure();

        let cache = TerminalCacheStore::new(config.terminal_cache_path.clone());
        let streams = Arc::new(TerminalStreamStore::new(cache, now_fn.clone()));

        let sink: Arc<dyn hearth_engine::OutputSink> =
            Arc::new(RouterOutputSink::new(streams.clone(), connections.clone()));
        let pty = Arc::new(PtyManager::new(sink, now_fn.clone()));

        let tunnels = Arc::new(TunnelManager::new(tunnel_binary, config.tunnel_auto_stop_after));

        let browser = Arc::new(BrowserTabManager::new(Arc::new(UnavailableBrowserEngine), now_fn.clone()));
        let mcp = Arc::new(McpDispatcher::new(browser.clone(), now_fn));

        let dotenv = config.dotenv_path.as_ref().and_then(|p| std::fs::read_to_string(p).ok()).map(|s| hearth_shell::parse_dotenv(&s)).unwrap_or_default();
        let parent_env: HashMap<String, String> = std::env::vars().collect();
        let child_env = hearth_shell::sanitize_env(&parent_env, &dotenv);

        Arc::new(Self {
            db,
            snapshots,
            pty,
            streams,
            tunnels,
            browser,
            mcp,
            connections,
            preview_streams: SyncMutex::new(HashMap::new()),
            stream_by_pty: SyncMutex::new(HashMap::new()),
            hash_cache: SyncMutex::new(HashMap::new()),
            child_env,
            clock: SystemClock,
        })
    }

    /// Builds a fresh [`GitService`] for `repo_path`. Cheap: the service
    /// holds no state beyond the path and environment, matching the shell
    /// crate's "independently retriable, nothing cached" contract.
    pub fn git_service(&self, repo_path: impl Into<std::path::PathBuf>) -> GitService {
        GitService::new(repo_path, self.child_env.clone())
    }

    /// Runs `capture` for `project_id`, threading its persistent hash cache
    /// through without the caller needing to manage it.
    pub fn capture_snapshot(
        &self,
        project_path: &std::path::Path,
        project_id: ProjectId,
        session_id: hearth_core::ChatSessionId,
        message_id: hearth_core::MessageId,
    ) -> Result<hearth_core::Snapshot, hearth_engine::EngineError> {
        let mut caches = self.hash_cache.lock();
        let cache = caches.entry(project_id).or_default();
        self.snapshots.capture(project_path, project_id, session_id, message_id, cache, now_closure()())
    }
}

/// Builds the `Arc<dyn Fn() -> String>` clock closure every subsystem
/// singleton takes, backed by [`SystemClock`] so timestamps are real
/// RFC 3339 instants and not just an opaque counter.
pub fn now_closure() -> Arc<dyn Fn() -> String + Send + Sync> {
    Arc::new(|| {
        let ms = SystemClock.epoch_ms();
        chrono::DateTime::<chrono::Utc>::from_timestamp_millis(ms as i64)
            .unwrap_or_default()
            .to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn epoch_zero_formats_as_the_unix_epoch_date() {
        let formatted = chrono::DateTime::<chrono::Utc>::from_timestamp_millis(0)
            .unwrap()
            .to_rfc3339_opts(chrono::SecondsFormat::Millis, true);
        assert_eq!(formatted, "1970-01-01T00:00:00.000Z");
    }

    #[test]
    fn now_closure_produces_a_sortable_millisecond_timestamp() {
        let now = now_closure();
        let a = now();
        assert!(a.ends_with('Z'));
        assert!(a.contains('T'));
        chrono::DateTime::parse_from_rfc3339(&a).expect("now_closure output must be valid RFC 3339");
    }
}
