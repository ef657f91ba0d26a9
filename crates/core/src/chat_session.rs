// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Chat sessions: the conversation a project's chat messages belong to.

use serde::{Deserialize, Serialize};

use crate::define_uuid_id;
use crate::message::MessageId;
use crate::project::ProjectId;

define_uuid_id! {
    /// Identifies a [`ChatSession`].
    pub struct ChatSessionId;
}

/// An AI-assisted conversation bound to a project.
///
/// `current_head_message_id` is the HEAD pointer of the message DAG: it
/// either is `None` (empty session) or refers to an undeleted [`Message`]
/// in this session.
///
/// [`Message`]: crate::message::Message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSession {
    pub id: ChatSessionId,
    pub project_id: ProjectId,
    pub title: String,
    pub engine: String,
    pub model: String,
    pub latest_sdk_session_id: Option<String>,
    pub current_head_message_id: Option<MessageId>,
    pub started_at: String,
    pub ended_at: Option<String>,
}

impl ChatSession {
    pub fn new(
        project_id: ProjectId,
        title: impl Into<String>,
        engine: impl Into<String>,
        model: impl Into<String>,
        started_at: impl Into<String>,
    ) -> Self {
        Self {
            id: ChatSessionId::new(),
            project_id,
            title: title.into(),
            engine: engine.into(),
            model: model.into(),
            latest_sdk_session_id: None,
            current_head_message_id: None,
            started_at: started_at.into(),
            ended_at: None,
        }
    }

    /// Moves HEAD to `message_id`. Does not itself validate that the
    /// message belongs to this session or is undeleted — callers
    /// maintaining invariant 1 (see crate-level docs) must check first.
    pub fn move_head(&mut self, message_id: MessageId) {
        self.current_head_message_id = Some(message_id);
    }

    pub fn is_empty(&self) -> bool {
        self.current_head_message_id.is_none()
    }

    pub fn end(&mut self, ended_at: impl Into<String>) {
        self.ended_at = Some(ended_at.into());
    }
}
