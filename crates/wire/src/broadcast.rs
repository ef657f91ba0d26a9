// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Broadcast scoping abstraction (§4.6 "Rooms and scoping").
//!
//! The wire crate only defines the contract; the daemon crate's connection
//! registry is the concrete implementation that knows about live sockets.

use hearth_core::{ChatSessionId, ProjectId};
use serde_json::Value;

/// Delivers `emit` frames to connections scoped to a project room or a
/// chat-session room. Implementations are non-blocking and best-effort: a
/// slow or dead connection is dropped rather than backing up the caller.
pub trait Broadcaster: Send + Sync {
    fn emit_project(&self, project_id: ProjectId, channel: &str, payload: Value);
    fn emit_chat_session(&self, session_id: ChatSessionId, channel: &str, payload: Value);
}

/// A [`Broadcaster`] that records emitted frames instead of delivering
/// them, for unit-testing sub-routers without a live connection registry.
#[derive(Default)]
pub struct RecordingBroadcaster {
    pub project_emits: std::sync::Mutex<Vec<(ProjectId, String, Value)>>,
    pub session_emits: std::sync::Mutex<Vec<(ChatSessionId, String, Value)>>,
}

impl Broadcaster for RecordingBroadcaster {
    fn emit_project(&self, project_id: ProjectId, channel: &str, payload: Value) {
        self.project_emits.lock().unwrap_or_else(|e| e.into_inner()).push((
            project_id,
            channel.to_string(),
            payload,
        ));
    }

    fn emit_chat_session(&self, session_id: ChatSessionId, channel: &str, payload: Value) {
        self.session_emits.lock().unwrap_or_else(|e| e.into_inner()).push((
            session_id,
            channel.to_string(),
            payload,
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_broadcaster_captures_project_emits() {
        let broadcaster = RecordingBroadcaster::default();
        let project_id = ProjectId::new();
        broadcaster.emit_project(project_id, "preview:browser-dialog", serde_json::json!({"id": "dlg-1"}));

        let emits = broadcaster.project_emits.lock().unwrap();
        assert_eq!(emits.len(), 1);
        assert_eq!(emits[0].0, project_id);
        assert_eq!(emits[0].1, "preview:browser-dialog");
    }
}
