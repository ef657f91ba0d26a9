// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Named pointers into a session's message DAG — semantically "git branch".

use serde::{Deserialize, Serialize};

use crate::chat_session::ChatSessionId;
use crate::define_id;
use crate::message::MessageId;

define_id! {
    /// Short random ID for a [`Branch`].
    pub struct BranchId("brn-");
}

/// A named pointer to a message within a chat session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Branch {
    pub id: BranchId,
    pub session_id: ChatSessionId,
    pub name: String,
    pub head_message_id: MessageId,
    pub created_at: String,
}

impl Branch {
    pub fn new(
        session_id: ChatSessionId,
        name: impl Into<String>,
        head_message_id: MessageId,
        created_at: impl Into<String>,
    ) -> Self {
        Self {
            id: BranchId::new(),
            session_id,
            name: name.into(),
            head_message_id,
            created_at: created_at.into(),
        }
    }

    pub fn retarget(&mut self, head_message_id: MessageId) {
        self.head_message_id = head_message_id;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn branch_id_carries_prefix() {
        let id = BranchId::new();
        assert!(id.as_str().starts_with("brn-"));
    }

    #[test]
    fn retarget_updates_head() {
        let session_id = ChatSessionId::new();
        let first_head = MessageId::new();
        let mut branch = Branch::new(session_id, "feature/x", first_head, "2026-01-01T00:00:00Z");
        let next_head = MessageId::new();
        branch.retarget(next_head);
        assert_eq!(branch.head_message_id, next_head);
    }
}
