// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Snapshot rows. Tree/blob storage lives in the storage crate; this module
//! owns only the row shape and the full/delta distinction.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::branch::BranchId;
use crate::chat_session::ChatSessionId;
use crate::define_uuid_id;
use crate::message::MessageId;
use crate::project::ProjectId;

define_uuid_id! {
    /// Identifies a [`Snapshot`].
    pub struct SnapshotId;
}

/// Whether a snapshot stores a full tree or only a delta against its parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotType {
    Full,
    Delta,
}

/// Added/modified/deleted paths between a snapshot and its predecessor,
/// compared by blob hash only (never by content diff).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeltaChanges {
    pub added: Vec<String>,
    pub modified: Vec<String>,
    pub deleted: Vec<String>,
}

impl DeltaChanges {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.modified.is_empty() && self.deleted.is_empty()
    }

    /// Computes added/modified/deleted by comparing two `path -> blob hash`
    /// maps. Never inspects file contents.
    pub fn diff(old: &HashMap<String, String>, new: &HashMap<String, String>) -> Self {
        let mut changes = DeltaChanges::default();
        for (path, hash) in new {
            match old.get(path) {
                None => changes.added.push(path.clone()),
                Some(old_hash) if old_hash != hash => changes.modified.push(path.clone()),
                _ => {}
            }
        }
        for path in old.keys() {
            if !new.contains_key(path) {
                changes.deleted.push(path.clone());
            }
        }
        changes.added.sort();
        changes.modified.sort();
        changes.deleted.sort();
        changes
    }
}

/// A point-in-time capture of a project's working tree, anchored to the
/// message that triggered the capture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub id: SnapshotId,
    pub message_id: MessageId,
    pub session_id: ChatSessionId,
    pub project_id: ProjectId,
    pub snapshot_type: SnapshotType,
    pub parent_snapshot_id: Option<SnapshotId>,
    pub tree_hash: Option<String>,
    pub delta_changes: Option<DeltaChanges>,
    pub files_changed: u32,
    pub insertions: u32,
    pub deletions: u32,
    pub branch_id: Option<BranchId>,
    pub is_deleted: bool,
    pub created_at: String,
}

impl Snapshot {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        message_id: MessageId,
        session_id: ChatSessionId,
        project_id: ProjectId,
        snapshot_type: SnapshotType,
        parent_snapshot_id: Option<SnapshotId>,
        created_at: impl Into<String>,
    ) -> Self {
        Self {
            id: SnapshotId::new(),
            message_id,
            session_id,
            project_id,
            snapshot_type,
            parent_snapshot_id,
            tree_hash: None,
            delta_changes: None,
            files_changed: 0,
            insertions: 0,
            deletions: 0,
            branch_id: None,
            is_deleted: false,
            created_at: created_at.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delta_diff_finds_added_modified_deleted() {
        let mut old = HashMap::new();
        old.insert("a.txt".to_string(), "hash-a".to_string());
        old.insert("b.txt".to_string(), "hash-b".to_string());

        let mut new = HashMap::new();
        new.insert("a.txt".to_string(), "hash-a".to_string()); // unchanged
        new.insert("b.txt".to_string(), "hash-b2".to_string()); // modified
        new.insert("c.txt".to_string(), "hash-c".to_string()); // added

        let changes = DeltaChanges::diff(&old, &new);
        assert_eq!(changes.added, vec!["c.txt"]);
        assert_eq!(changes.modified, vec!["b.txt"]);
        assert_eq!(changes.deleted, Vec::<String>::new());
    }

    #[test]
    fn delta_diff_of_identical_maps_is_empty() {
        let mut map = HashMap::new();
        map.insert("a.txt".to_string(), "hash-a".to_string());
        let changes = DeltaChanges::diff(&map, &map);
        assert!(changes.is_empty());
    }

    #[test]
    fn new_snapshot_starts_with_zeroed_stats() {
        let snap = Snapshot::new(
            MessageId::new(),
            ChatSessionId::new(),
            ProjectId::new(),
            SnapshotType::Full,
            None,
            "2026-01-01T00:00:00Z",
        );
        assert_eq!(snap.files_changed, 0);
        assert!(!snap.is_deleted);
    }
}
