// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Live connection bookkeeping and broadcast delivery (§4.6 "Rooms and
//! scoping"). One [`ConnectionHandle`] per accepted WebSocket; a connection
//! joins a project room and/or a chat-session room as its client issues
//! requests that imply scope (opening a project, starting a chat session).

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use hearth_core::{ChatSessionId, ProjectId};
use hearth_wire::{Broadcaster, Frame};
use parking_lot::Mutex as SyncMutex;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tracing::debug;

/// Bound on a connection's outbound queue. A client that can't keep up with
/// its own backlog is slow, not merely congested — the frame is dropped
/// rather than buffered without limit (§5).
const OUTBOUND_QUEUE_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

/// Per-connection outbound sender plus the rooms it currently belongs to.
pub struct ConnectionHandle {
    pub id: ConnectionId,
    sender: mpsc::Sender<Message>,
    project_id: SyncMutex<Option<ProjectId>>,
    chat_session_id: SyncMutex<Option<ChatSessionId>>,
}

impl ConnectionHandle {
    pub fn set_project(&self, project_id: ProjectId) {
        *self.project_id.lock() = Some(project_id);
    }

    pub fn set_chat_session(&self, session_id: ChatSessionId) {
        *self.chat_session_id.lock() = Some(session_id);
    }

    /// Sends a frame to this connection only, dropping it silently if the
    /// client is slow (queue full) or gone (channel closed).
    pub fn send(&self, frame: &Frame) {
        let Ok(text) = frame.to_json() else { return };
        if let Err(err) = self.sender.try_send(Message::Text(text.into())) {
            debug!(connection = self.id.0, "dropping frame for slow or closed connection: {err}");
        }
    }
}

/// Tracks every live connection and implements [`Broadcaster`] by fanning
/// an `emit` frame out to every connection whose room matches.
pub struct ConnectionRegistry {
    connections: SyncMutex<HashMap<ConnectionId, Arc<ConnectionHandle>>>,
    next_id: AtomicU64,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self { connections: SyncMutex::new(HashMap::new()), next_id: AtomicU64::new(1) }
    }

    /// Registers a freshly-accepted connection and returns its handle plus
    /// the receiving half the listener's write loop drains.
    pub fn register(&self) -> (Arc<ConnectionHandle>, mpsc::Receiver<Message>) {
        let id = ConnectionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (sender, receiver) = mpsc::channel(OUTBOUND_QUEUE_CAPACITY);
        let handle = Arc::new(ConnectionHandle {
            id,
            sender,
            project_id: SyncMutex::new(None),
            chat_session_id: SyncMutex::new(None),
        });
        self.connections.lock().insert(id, handle.clone());
        (handle, receiver)
    }

    pub fn unregister(&self, id: ConnectionId) {
        self.connections.lock().remove(&id);
    }

    pub fn connection_count(&self) -> usize {
        self.connections.lock().len()
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl Broadcaster for ConnectionRegistry {
    fn emit_project(&self, project_id: ProjectId, channel: &str, payload: serde_json::Value) {
        let frame = Frame::event(channel, payload);
        let targets: Vec<_> = self
            .connections
            .lock()
            .values()
            .filter(|handle| *handle.project_id.lock() == Some(project_id))
            .cloned()
            .collect();
        for handle in targets {
            handle.send(&frame);
        }
    }

    fn emit_chat_session(&self, session_id: ChatSessionId, channel: &str, payload: serde_json::Value) {
        let frame = Frame::event(channel, payload);
        let targets: Vec<_> = self
            .connections
            .lock()
            .values()
            .filter(|handle| *handle.chat_session_id.lock() == Some(session_id))
            .cloned()
            .collect();
        for handle in targets {
            handle.send(&frame);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn emit_chat_session_only_reaches_connections_in_that_room() {
        let registry = ConnectionRegistry::new();
        let (handle_a, mut rx_a) = registry.register();
        let (handle_b, mut rx_b) = registry.register();
        let session_id = ChatSessionId::new();
        handle_a.set_chat_session(session_id);

        registry.emit_chat_session(session_id, "terminal:output", serde_json::json!({"chunk": "hi"}));

        let received = rx_a.try_recv().expect("handle_a should receive the event");
        assert!(matches!(received, Message::Text(_)));
        assert!(rx_b.try_recv().is_err());
        let _ = handle_b.id;
    }

    #[tokio::test]
    async fn unregister_drops_a_connection_from_future_broadcasts() {
        let registry = ConnectionRegistry::new();
        let (handle, mut rx) = registry.register();
        let project_id = ProjectId::new();
        handle.set_project(project_id);
        registry.unregister(handle.id);

        registry.emit_project(project_id, "preview:browser-tab-opened", serde_json::json!({}));
        assert!(rx.try_recv().is_err());
    }
}
