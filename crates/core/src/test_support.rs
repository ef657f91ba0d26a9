// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Test-only fixture builders, available to other crates via the
//! `test-support` feature.

use crate::chat_session::{ChatSession, ChatSessionId};
use crate::message::{Message, MessageId, MessageRole};
use crate::project::{Project, ProjectId};

crate::builder! {
    pub struct ProjectBuilder => Project {
        into { name: String = "demo-project" }
        into { absolute_path: String = "/tmp/demo-project" }
        into { created_at: String = "2026-01-01T00:00:00Z" }
        into { last_opened_at: String = "2026-01-01T00:00:00Z" }
        computed { id: ProjectId = ProjectId::new() }
    }
}

crate::builder! {
    pub struct ChatSessionBuilder => ChatSession {
        set { project_id: ProjectId = ProjectId::new() }
        into { title: String = "untitled" }
        into { engine: String = "claude_code" }
        into { model: String = "sonnet" }
        into { started_at: String = "2026-01-01T00:00:00Z" }
        option { latest_sdk_session_id: String = None }
        option { current_head_message_id: MessageId = None }
        option { ended_at: String = None }
        computed { id: ChatSessionId = ChatSessionId::new() }
    }
}

crate::builder! {
    pub struct MessageBuilder => Message {
        set { session_id: ChatSessionId = ChatSessionId::new() }
        into { timestamp: String = "2026-01-01T00:00:00Z" }
        set { sdk_payload: serde_json::Value = serde_json::Value::Null }
        set { role: MessageRole = MessageRole::User }
        set { is_deleted: bool = false }
        option { sender_id: String = None }
        option { sender_name: String = None }
        option { branch_id: crate::branch::BranchId = None }
        option { parent_message_id: MessageId = None }
        option { sdk_session_id: String = None }
        computed { id: MessageId = MessageId::new() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn project_builder_applies_overrides() {
        let project = Project::builder().name("my-app").build();
        assert_eq!(project.name, "my-app");
    }

    #[test]
    fn message_builder_defaults_to_root_user_message() {
        let message = Message::builder().build();
        assert_eq!(message.role, MessageRole::User);
        assert!(message.parent_message_id.is_none());
    }
}
