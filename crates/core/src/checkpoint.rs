// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-checkpoint bookkeeping for the git-like checkpoint tree over chat
//! messages. Walking and restore logic live with the snapshot engine; this
//! module only owns the data shape and the invariant-preserving mutators.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::chat_session::ChatSessionId;
use crate::message::MessageId;

/// For a single checkpoint node, which child lies on the "straight" line
/// (i.e. is currently selected when the tree forks).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckpointTreeState {
    pub session_id: ChatSessionId,
    pub parent_checkpoint_id: Option<MessageId>,
    pub active_child_id: Option<MessageId>,
}

impl CheckpointTreeState {
    pub fn root(session_id: ChatSessionId) -> Self {
        Self { session_id, parent_checkpoint_id: None, active_child_id: None }
    }
}

/// Per-session map from checkpoint message id to its tree-state entry.
///
/// Kept as an explicit map (rather than embedding the state on [`Message`])
/// so the active-child path can be recomputed without touching message
/// rows, mirroring the "never mutate the shared adjacency map" design note.
///
/// [`Message`]: crate::message::Message
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckpointTree {
    pub nodes: HashMap<MessageId, CheckpointTreeState>,
}

impl CheckpointTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, checkpoint_id: MessageId, state: CheckpointTreeState) {
        self.nodes.insert(checkpoint_id, state);
    }

    pub fn get(&self, checkpoint_id: &MessageId) -> Option<&CheckpointTreeState> {
        self.nodes.get(checkpoint_id)
    }

    /// Sets the active child of `parent`'s entry, creating the entry if
    /// absent. Used while recomputing the checkpoint path during restore.
    pub fn set_active_child(
        &mut self,
        session_id: ChatSessionId,
        parent: MessageId,
        child: MessageId,
    ) {
        self.nodes
            .entry(parent)
            .or_insert_with(|| CheckpointTreeState::root(session_id))
            .active_child_id = Some(child);
    }

    /// Walks `parent_checkpoint_id` pointers from `from` to the root,
    /// returning the path in root-to-`from` order. Uses a visited set so a
    /// malformed cycle terminates instead of looping forever.
    pub fn path_to_root(&self, from: MessageId) -> Vec<MessageId> {
        let mut path = vec![from];
        let mut visited = std::collections::HashSet::new();
        visited.insert(from);
        let mut current = from;
        while let Some(state) = self.nodes.get(&current) {
            match state.parent_checkpoint_id {
                Some(parent) if visited.insert(parent) => {
                    path.push(parent);
                    current = parent;
                }
                _ => break,
            }
        }
        path.reverse();
        path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_to_root_walks_parent_chain_in_order() {
        let session_id = ChatSessionId::new();
        let root = MessageId::new();
        let child = MessageId::new();
        let grandchild = MessageId::new();

        let mut tree = CheckpointTree::new();
        tree.insert(root, CheckpointTreeState::root(session_id));
        tree.insert(
            child,
            CheckpointTreeState {
                session_id,
                parent_checkpoint_id: Some(root),
                active_child_id: None,
            },
        );
        tree.insert(
            grandchild,
            CheckpointTreeState {
                session_id,
                parent_checkpoint_id: Some(child),
                active_child_id: None,
            },
        );

        assert_eq!(tree.path_to_root(grandchild), vec![root, child, grandchild]);
    }

    #[test]
    fn path_to_root_terminates_on_cycle() {
        let session_id = ChatSessionId::new();
        let a = MessageId::new();
        let b = MessageId::new();

        let mut tree = CheckpointTree::new();
        tree.insert(
            a,
            CheckpointTreeState { session_id, parent_checkpoint_id: Some(b), active_child_id: None },
        );
        tree.insert(
            b,
            CheckpointTreeState { session_id, parent_checkpoint_id: Some(a), active_child_id: None },
        );

        // Must terminate rather than loop forever.
        let path = tree.path_to_root(a);
        assert!(path.len() <= 2);
    }

    #[test]
    fn set_active_child_creates_missing_entry() {
        let session_id = ChatSessionId::new();
        let parent = MessageId::new();
        let child = MessageId::new();
        let mut tree = CheckpointTree::new();
        tree.set_active_child(session_id, parent, child);
        assert_eq!(tree.get(&parent).unwrap().active_child_id, Some(child));
    }
}
