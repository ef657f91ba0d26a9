// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bridges [`PtyManager`](hearth_engine::PtyManager)'s [`OutputSink`] hook to
//! the terminal stream store and the live connection registry: every PTY
//! byte chunk is persisted *then* broadcast (§4.4, §4.5).

use std::sync::Arc;

use hearth_core::{PtySessionId, StreamStatus};
use hearth_engine::{OutputSink, TerminalStreamStore, RETENTION_AFTER_COMPLETE};
use hearth_wire::Broadcaster;
use tracing::warn;

use crate::registry::ConnectionRegistry;

pub struct RouterOutputSink {
    streams: Arc<TerminalStreamStore>,
    connections: Arc<ConnectionRegistry>,
}

impl RouterOutputSink {
    pub fn new(streams: Arc<TerminalStreamStore>, connections: Arc<ConnectionRegistry>) -> Self {
        Self { streams, connections }
    }
}

impl OutputSink for RouterOutputSink {
    fn on_output(&self, session_id: PtySessionId, seq: u64, data: &str) {
        let Some(stream_id) = self.streams.stream_id_for_pty_session(session_id) else { return };
        if let Err(err) = self.streams.push_output(stream_id, data) {
            warn!(%stream_id, "failed to persist terminal output: {err}");
        }
        let Some((chat_session_id, _project_id)) = self.streams.scope_of(stream_id) else { return };
        self.connections.emit_chat_session(
            chat_session_id,
            "terminal:output",
            serde_json::json!({ "streamId": stream_id, "seq": seq, "chunk": data }),
        );
    }

    fn on_exit(&self, session_id: PtySessionId, code: i32) {
        let Some(stream_id) = self.streams.stream_id_for_pty_session(session_id) else { return };
        let status = if code == 0 { StreamStatus::Completed } else { StreamStatus::Error };
        if let Err(err) = self.streams.finish(stream_id, status) {
            warn!(%stream_id, "failed to persist terminal exit: {err}");
        }
        if let Some((chat_session_id, _project_id)) = self.streams.scope_of(stream_id) {
            self.connections.emit_chat_session(
                chat_session_id,
                "terminal:exit",
                serde_json::json!({ "streamId": stream_id, "code": code }),
            );
        }

        let streams = self.streams.clone();
        tokio::spawn(async move {
            tokio::time::sleep(RETENTION_AFTER_COMPLETE).await;
            if let Err(err) = streams.evict(stream_id) {
                warn!(%stream_id, "failed to evict terminal stream after retention window: {err}");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hearth_core::ChatSessionId;
    use hearth_storage::TerminalCacheStore;

    fn sink() -> (tempfile::TempDir, RouterOutputSink, Arc<TerminalStreamStore>, Arc<ConnectionRegistry>) {
        let dir = tempfile::tempdir().unwrap();
        let cache = TerminalCacheStore::new(dir.path());
        let streams = Arc::new(TerminalStreamStore::new(cache, Arc::new(|| "2026-01-01T00:00:00Z".to_string())));
        let connections = Arc::new(ConnectionRegistry::new());
        let sink = RouterOutputSink::new(streams.clone(), connections.clone());
        (dir, sink, streams, connections)
    }

    #[tokio::test]
    async fn on_output_with_no_mapped_stream_is_a_silent_no_op() {
        let (_dir, sink, _streams, _connections) = sink();
        sink.on_output(PtySessionId::new(), 0, "orphaned chunk");
    }

    #[tokio::test]
    async fn on_output_persists_and_broadcasts_to_the_owning_chat_session() {
        let (_dir, sink, streams, connections) = sink();
        let pty_session_id = PtySessionId::new();
        let chat_session_id = ChatSessionId::new();
        let stream_id = streams.start(chat_session_id, "echo hi", None, None, None, Some(pty_session_id));
        let (handle, mut rx) = connections.register();
        handle.set_chat_session(chat_session_id);

        sink.on_output(pty_session_id, 1, "hi\n");

        let missed = streams.missed_output(stream_id, chat_session_id, 0).unwrap();
        assert_eq!(missed, vec!["hi\n".to_string()]);
        assert!(rx.try_recv().is_ok());
    }
}
