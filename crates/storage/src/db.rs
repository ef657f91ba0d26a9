// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The relational-store boundary (§6 "Database surface").
//!
//! The real store is SQLite-shaped and out of this core's scope; handlers
//! never issue SQL directly, they call through [`Db`]. [`InMemoryDb`] is the
//! reference implementation used by tests and by the router/MCP layers
//! wherever only the query *shape* matters.

use std::collections::HashMap;

use hearth_core::{
    Branch, BranchId, ChatSession, ChatSessionId, CheckpointTreeState, Message, MessageId, Project,
    ProjectId, Snapshot, SnapshotId,
};
use parking_lot::RwLock;

use crate::error::StorageError;

/// One row of the `settings` table: an opaque key/value pair.
pub type SettingsMap = HashMap<String, String>;

/// Narrow relational-store contract. Every method group corresponds to one
/// or more tables named in §6; callers never see SQL.
pub trait Db: Send + Sync {
    fn insert_project(&self, project: Project) -> Result<(), StorageError>;
    fn get_project(&self, id: ProjectId) -> Result<Project, StorageError>;
    fn list_projects(&self) -> Result<Vec<Project>, StorageError>;
    /// Deletes a project and cascades to its chat sessions, messages,
    /// branches, and snapshots (§3 Project entity).
    fn delete_project_cascade(&self, id: ProjectId) -> Result<(), StorageError>;

    fn insert_chat_session(&self, session: ChatSession) -> Result<(), StorageError>;
    fn get_chat_session(&self, id: ChatSessionId) -> Result<ChatSession, StorageError>;
    fn list_chat_sessions(&self, project_id: ProjectId) -> Result<Vec<ChatSession>, StorageError>;
    fn update_chat_session(&self, session: ChatSession) -> Result<(), StorageError>;

    fn insert_message(&self, message: Message) -> Result<(), StorageError>;
    fn get_message(&self, id: MessageId) -> Result<Message, StorageError>;
    fn list_messages(&self, session_id: ChatSessionId) -> Result<Vec<Message>, StorageError>;
    fn update_message(&self, message: Message) -> Result<(), StorageError>;
    /// Hard-deletes every message in `session_id` with `timestamp` strictly
    /// greater than `after` (resolved Open Question, §4.3 / §9: `>`, never `>=`).
    fn hard_delete_messages_after(&self, session_id: ChatSessionId, after: &str) -> Result<u32, StorageError>;

    fn insert_branch(&self, branch: Branch) -> Result<(), StorageError>;
    fn get_branch(&self, id: BranchId) -> Result<Branch, StorageError>;
    fn list_branches(&self, session_id: ChatSessionId) -> Result<Vec<Branch>, StorageError>;

    fn insert_snapshot(&self, snapshot: Snapshot) -> Result<(), StorageError>;
    fn get_snapshot(&self, id: SnapshotId) -> Result<Snapshot, StorageError>;
    fn list_snapshots(&self, session_id: ChatSessionId) -> Result<Vec<Snapshot>, StorageError>;
    /// Most recent non-deleted snapshot for a session, by `created_at`.
    fn latest_snapshot(&self, session_id: ChatSessionId) -> Result<Option<Snapshot>, StorageError>;

    fn get_checkpoint_tree_state(&self, session_id: ChatSessionId, checkpoint_id: MessageId) -> Result<Option<CheckpointTreeState>, StorageError>;
    fn put_checkpoint_tree_state(&self, checkpoint_id: MessageId, state: CheckpointTreeState) -> Result<(), StorageError>;

    fn get_setting(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn put_setting(&self, key: &str, value: &str) -> Result<(), StorageError>;
}

#[derive(Default)]
struct InMemoryTables {
    projects: HashMap<ProjectId, Project>,
    chat_sessions: HashMap<ChatSessionId, ChatSession>,
    messages: HashMap<MessageId, Message>,
    branches: HashMap<BranchId, Branch>,
    snapshots: HashMap<SnapshotId, Snapshot>,
    checkpoint_tree: HashMap<MessageId, CheckpointTreeState>,
    settings: SettingsMap,
}

/// In-memory reference implementation of [`Db`]. Every table is an
/// `HashMap` behind a single `RwLock`, matching the "single connection,
/// serialized writes" policy of the real store (§5) closely enough for
/// tests that only need the query shape.
#[derive(Default)]
pub struct InMemoryDb {
    tables: RwLock<InMemoryTables>,
}

impl InMemoryDb {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Db for InMemoryDb {
    fn insert_project(&self, project: Project) -> Result<(), StorageError> {
        self.tables.write().projects.insert(project.id, project);
        Ok(())
    }

    fn get_project(&self, id: ProjectId) -> Result<Project, StorageError> {
        self.tables
            .read()
            .projects
            .get(&id)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(format!("project {id}")))
    }

    fn list_projects(&self) -> Result<Vec<Project>, StorageError> {
        Ok(self.tables.read().projects.values().cloned().collect())
    }

    fn delete_project_cascade(&self, id: ProjectId) -> Result<(), StorageError> {
        let mut tables = self.tables.write();
        tables.projects.remove(&id);
        let dead_sessions: Vec<ChatSessionId> = tables
            .chat_sessions
            .values()
            .filter(|s| s.project_id == id)
            .map(|s| s.id)
            .collect();
        for session_id in &dead_sessions {
            tables.messages.retain(|_, m| m.session_id != *session_id);
            tables.branches.retain(|_, b| b.session_id != *session_id);
            tables.snapshots.retain(|_, s| s.session_id != *session_id);
        }
        tables.chat_sessions.retain(|_, s| s.project_id != id);
        Ok(())
    }

    fn insert_chat_session(&self, session: ChatSession) -> Result<(), StorageError> {
        self.tables.write().chat_sessions.insert(session.id, session);
        Ok(())
    }

    fn get_chat_session(&self, id: ChatSessionId) -> Result<ChatSession, StorageError> {
        self.tables
            .read()
            .chat_sessions
            .get(&id)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(format!("chat session {id}")))
    }

    fn list_chat_sessions(&self, project_id: ProjectId) -> Result<Vec<ChatSession>, StorageError> {
        Ok(self
            .tables
            .read()
            .chat_sessions
            .values()
            .filter(|s| s.project_id == project_id)
            .cloned()
            .collect())
    }

    fn update_chat_session(&self, session: ChatSession) -> Result<(), StorageError> {
        self.tables.write().chat_sessions.insert(session.id, session);
        Ok(())
    }

    fn insert_message(&self, message: Message) -> Result<(), StorageError> {
        self.tables.write().messages.insert(message.id, message);
        Ok(())
    }

    fn get_message(&self, id: MessageId) -> Result<Message, StorageError> {
        self.tables
            .read()
            .messages
            .get(&id)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(format!("message {id}")))
    }

    fn list_messages(&self, session_id: ChatSessionId) -> Result<Vec<Message>, StorageError> {
        Ok(self
            .tables
            .read()
            .messages
            .values()
            .filter(|m| m.session_id == session_id)
            .cloned()
            .collect())
    }

    fn update_message(&self, message: Message) -> Result<(), StorageError> {
        self.tables.write().messages.insert(message.id, message);
        Ok(())
    }

    fn hard_delete_messages_after(&self, session_id: ChatSessionId, after: &str) -> Result<u32, StorageError> {
        let mut tables = self.tables.write();
        let doomed: Vec<MessageId> = tables
            .messages
            .values()
            .filter(|m| m.session_id == session_id && m.timestamp.as_str() > after)
            .map(|m| m.id)
            .collect();
        for id in &doomed {
            tables.messages.remove(id);
        }
        Ok(doomed.len() as u32)
    }

    fn insert_branch(&self, branch: Branch) -> Result<(), StorageError> {
        self.tables.write().branches.insert(branch.id, branch);
        Ok(())
    }

    fn get_branch(&self, id: BranchId) -> Result<Branch, StorageError> {
        self.tables
            .read()
            .branches
            .get(&id)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(format!("branch {id}")))
    }

    fn list_branches(&self, session_id: ChatSessionId) -> Result<Vec<Branch>, StorageError> {
        Ok(self
            .tables
            .read()
            .branches
            .values()
            .filter(|b| b.session_id == session_id)
            .cloned()
            .collect())
    }

    fn insert_snapshot(&self, snapshot: Snapshot) -> Result<(), StorageError> {
        self.tables.write().snapshots.insert(snapshot.id, snapshot);
        Ok(())
    }

    fn get_snapshot(&self, id: SnapshotId) -> Result<Snapshot, StorageError> {
        self.tables
            .read()
            .snapshots
            .get(&id)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(format!("snapshot {id}")))
    }

    fn list_snapshots(&self, session_id: ChatSessionId) -> Result<Vec<Snapshot>, StorageError> {
        Ok(self
            .tables
            .read()
            .snapshots
            .values()
            .filter(|s| s.session_id == session_id)
            .cloned()
            .collect())
    }

    fn latest_snapshot(&self, session_id: ChatSessionId) -> Result<Option<Snapshot>, StorageError> {
        Ok(self
            .tables
            .read()
            .snapshots
            .values()
            .filter(|s| s.session_id == session_id && !s.is_deleted)
            .max_by_key(|s| s.created_at.clone())
            .cloned())
    }

    fn get_checkpoint_tree_state(&self, _session_id: ChatSessionId, checkpoint_id: MessageId) -> Result<Option<CheckpointTreeState>, StorageError> {
        Ok(self.tables.read().checkpoint_tree.get(&checkpoint_id).cloned())
    }

    fn put_checkpoint_tree_state(&self, checkpoint_id: MessageId, state: CheckpointTreeState) -> Result<(), StorageError> {
        self.tables.write().checkpoint_tree.insert(checkpoint_id, state);
        Ok(())
    }

    fn get_setting(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.tables.read().settings.get(key).cloned())
    }

    fn put_setting(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.tables.write().settings.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hearth_core::{MessageRole, SnapshotType};

    #[test]
    fn project_round_trips() {
        let db = InMemoryDb::new();
        let project = Project::new("demo", "/tmp/demo", "2026-01-01T00:00:00Z");
        db.insert_project(project.clone()).unwrap();
        assert_eq!(db.get_project(project.id).unwrap(), project);
    }

    #[test]
    fn delete_project_cascades_to_sessions_messages_and_snapshots() {
        let db = InMemoryDb::new();
        let project = Project::new("demo", "/tmp/demo", "2026-01-01T00:00:00Z");
        let session = ChatSession::new(project.id, "chat", "claude_code", "sonnet", "2026-01-01T00:00:00Z");
        let message = Message::new(session.id, "2026-01-01T00:00:00Z", serde_json::Value::Null, MessageRole::User, None);
        let snapshot = Snapshot::new(message.id, session.id, project.id, SnapshotType::Full, None, "2026-01-01T00:00:00Z");

        db.insert_project(project.clone()).unwrap();
        db.insert_chat_session(session.clone()).unwrap();
        db.insert_message(message.clone()).unwrap();
        db.insert_snapshot(snapshot.clone()).unwrap();

        db.delete_project_cascade(project.id).unwrap();

        assert!(db.get_project(project.id).is_err());
        assert!(db.get_chat_session(session.id).is_err());
        assert!(db.get_message(message.id).is_err());
        assert!(db.get_snapshot(snapshot.id).is_err());
    }

    #[test]
    fn hard_delete_messages_after_is_strictly_greater_than() {
        let db = InMemoryDb::new();
        let session_id = ChatSessionId::new();
        let anchor = Message::new(session_id, "2026-01-01T00:00:00Z", serde_json::Value::Null, MessageRole::User, None);
        let later = Message::new(session_id, "2026-01-01T00:00:01Z", serde_json::Value::Null, MessageRole::Assistant, Some(anchor.id));

        db.insert_message(anchor.clone()).unwrap();
        db.insert_message(later.clone()).unwrap();

        let deleted = db.hard_delete_messages_after(session_id, "2026-01-01T00:00:00Z").unwrap();
        assert_eq!(deleted, 1);
        assert!(db.get_message(anchor.id).is_ok(), "anchor at the cut point must survive");
        assert!(db.get_message(later.id).is_err());
    }

    #[test]
    fn latest_snapshot_picks_max_created_at() {
        let db = InMemoryDb::new();
        let session_id = ChatSessionId::new();
        let project_id = ProjectId::new();
        let older = Snapshot::new(MessageId::new(), session_id, project_id, SnapshotType::Full, None, "2026-01-01T00:00:00Z");
        let newer = Snapshot::new(MessageId::new(), session_id, project_id, SnapshotType::Delta, None, "2026-01-02T00:00:00Z");
        db.insert_snapshot(older).unwrap();
        db.insert_snapshot(newer.clone()).unwrap();

        assert_eq!(db.latest_snapshot(session_id).unwrap().unwrap().id, newer.id);
    }

    #[test]
    fn settings_round_trip() {
        let db = InMemoryDb::new();
        assert_eq!(db.get_setting("theme").unwrap(), None);
        db.put_setting("theme", "dark").unwrap();
        assert_eq!(db.get_setting("theme").unwrap(), Some("dark".to_string()));
    }
}
