// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Chat messages: the nodes of the per-session message DAG.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::branch::BranchId;
use crate::chat_session::ChatSessionId;
use crate::define_uuid_id;

define_uuid_id! {
    /// Identifies a [`Message`].
    pub struct MessageId;
}

/// A single node in a chat session's message DAG.
///
/// `parent_message_id` forms the DAG; `is_deleted` is the soft-delete flag
/// used while switching branches (see crate-level invariant 2: a set
/// parent always belongs to the same session).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: MessageId,
    pub session_id: ChatSessionId,
    pub timestamp: String,
    pub sdk_payload: Value,
    pub sender_id: Option<String>,
    pub sender_name: Option<String>,
    pub is_deleted: bool,
    pub branch_id: Option<BranchId>,
    pub parent_message_id: Option<MessageId>,
    pub sdk_session_id: Option<String>,
    pub role: MessageRole,
}

/// Coarse classification used by the checkpoint-tree walk (§4.3): a
/// checkpoint is a [`MessageRole::User`] message with non-empty text that
/// is not itself a tool result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    User,
    Assistant,
    ToolResult,
}

impl Message {
    pub fn new(
        session_id: ChatSessionId,
        timestamp: impl Into<String>,
        sdk_payload: Value,
        role: MessageRole,
        parent_message_id: Option<MessageId>,
    ) -> Self {
        Self {
            id: MessageId::new(),
            session_id,
            timestamp: timestamp.into(),
            sdk_payload,
            sender_id: None,
            sender_name: None,
            is_deleted: false,
            branch_id: None,
            parent_message_id,
            sdk_session_id: None,
            role,
        }
    }

    /// A checkpoint is a user message with non-empty text that is not a
    /// tool result (GLOSSARY).
    pub fn is_checkpoint(&self, text: &str) -> bool {
        self.role == MessageRole::User && !text.trim().is_empty()
    }

    pub fn soft_delete(&mut self) {
        self.is_deleted = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(role: MessageRole) -> Message {
        Message::new(
            ChatSessionId::new(),
            "2026-01-01T00:00:00Z",
            Value::Null,
            role,
            None,
        )
    }

    #[test]
    fn user_message_with_text_is_a_checkpoint() {
        let m = msg(MessageRole::User);
        assert!(m.is_checkpoint("hello there"));
    }

    #[test]
    fn user_message_with_blank_text_is_not_a_checkpoint() {
        let m = msg(MessageRole::User);
        assert!(!m.is_checkpoint("   "));
    }

    #[test]
    fn assistant_message_is_never_a_checkpoint() {
        let m = msg(MessageRole::Assistant);
        assert!(!m.is_checkpoint("anything"));
    }

    #[test]
    fn tool_result_message_is_never_a_checkpoint() {
        let m = msg(MessageRole::ToolResult);
        assert!(!m.is_checkpoint("anything"));
    }

    #[test]
    fn soft_delete_sets_flag() {
        let mut m = msg(MessageRole::User);
        assert!(!m.is_deleted);
        m.soft_delete();
        assert!(m.is_deleted);
    }
}
