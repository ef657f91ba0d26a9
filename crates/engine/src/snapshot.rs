// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Snapshot capture/restore and the checkpoint tree walk over chat
//! messages (§4.3, C3).
//!
//! File enumeration prefers `git ls-files` (so `.gitignore` is honored for
//! free) and falls back to a plain directory walk with a skip set when no
//! `git` binary is on `PATH` or the project isn't a repo.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;

use hearth_core::{
    ChatSessionId, CheckpointTree, CheckpointTreeState, ChatSession, DeltaChanges, Message, MessageId,
    ProjectId, Snapshot, SnapshotType,
};
use hearth_storage::blob::{hash_file, BlobStore, CacheEntry};
use hearth_storage::db::Db;
use hearth_storage::tree::{TreeMap, TreeStore};
use similar::{ChangeTag, TextDiff};

use crate::error::EngineError;

const MAX_FILE_SIZE: u64 = 5 * 1024 * 1024;
const SKIP_DIRS: &[&str] = &[".git", "node_modules", "target", "dist", ".next", ".appdata", ".terminal-output-cache"];

/// Enumerates every file under `project_path` worth hashing, respecting
/// `.gitignore` when possible.
fn enumerate_files(project_path: &Path) -> Vec<String> {
    git_ls_files(project_path).unwrap_or_else(|| walk_with_skip_set(project_path))
}

fn git_ls_files(project_path: &Path) -> Option<Vec<String>> {
    let output = std::process::Command::new("git")
        .arg("-C")
        .arg(project_path)
        .args(["ls-files", "-z", "--cached", "--others", "--exclude-standard"])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let text = String::from_utf8_lossy(&output.stdout);
    Some(text.split('\0').filter(|s| !s.is_empty()).map(str::to_string).collect())
}

fn walk_with_skip_set(project_path: &Path) -> Vec<String> {
    let mut out = Vec::new();
    let mut stack = vec![project_path.to_path_buf()];
    while let Some(dir) = stack.pop() {
        let Ok(entries) = std::fs::read_dir(&dir) else { continue };
        for entry in entries.flatten() {
            let path = entry.path();
            let name = entry.file_name().to_string_lossy().into_owned();
            if SKIP_DIRS.contains(&name.as_str()) {
                continue;
            }
            if path.is_dir() {
                stack.push(path);
            } else if path.is_file() {
                if let Ok(rel) = path.strip_prefix(project_path) {
                    out.push(rel.to_string_lossy().replace('\\', "/"));
                }
            }
        }
    }
    out.sort();
    out
}

/// Line-level insertion/deletion counts between two byte slices, treated
/// as text (lossily) for diffing purposes only — the stored blobs
/// themselves stay binary-exact.
fn line_diff_stats(old: &[u8], new: &[u8]) -> (u32, u32) {
    let old_text = String::from_utf8_lossy(old);
    let new_text = String::from_utf8_lossy(new);
    let diff = TextDiff::from_lines(old_text.as_ref(), new_text.as_ref());
    let mut insertions = 0u32;
    let mut deletions = 0u32;
    for change in diff.iter_all_changes() {
        match change.tag() {
            ChangeTag::Insert => insertions += 1,
            ChangeTag::Delete => deletions += 1,
            ChangeTag::Equal => {}
        }
    }
    (insertions, deletions)
}

fn message_text(message: &Message) -> String {
    message.sdk_payload.get("text").and_then(|v| v.as_str()).unwrap_or("").to_string()
}

fn is_checkpoint_message(message: &Message) -> bool {
    message.is_checkpoint(&message_text(message))
}

fn nearest_checkpoint_ancestor(by_id: &HashMap<MessageId, &Message>, start: Option<MessageId>) -> Option<MessageId> {
    let mut cursor = start.and_then(|id| by_id.get(&id).copied());
    let mut visited = HashSet::new();
    while let Some(m) = cursor {
        if !visited.insert(m.id) {
            return None;
        }
        if is_checkpoint_message(m) {
            return Some(m.id);
        }
        cursor = m.parent_message_id.and_then(|p| by_id.get(&p).copied());
    }
    None
}

fn children_by_parent(messages: &[Message]) -> HashMap<MessageId, Vec<Message>> {
    let mut map: HashMap<MessageId, Vec<Message>> = HashMap::new();
    for m in messages {
        if let Some(parent) = m.parent_message_id {
            map.entry(parent).or_default().push(m.clone());
        }
    }
    for kids in map.values_mut() {
        kids.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
    }
    map
}

/// Walk (a): follow `parent_message_id` children, sorted by timestamp,
/// skipping over anything that would itself start a new checkpoint.
fn session_end_via_parent_walk(children: &HashMap<MessageId, Vec<Message>>, checkpoint_id: MessageId) -> MessageId {
    let mut current = checkpoint_id;
    loop {
        let Some(kids) = children.get(&current) else { break };
        match kids.iter().find(|m| !is_checkpoint_message(m)) {
            Some(m) => current = m.id,
            None => break,
        }
    }
    current
}

/// Walk (b): the timestamp-ordered fallback used when the parent-based
/// walk returns the checkpoint itself (no recorded children).
fn session_end_via_timestamp_walk(messages: &[Message], checkpoint: &Message) -> MessageId {
    let mut after: Vec<&Message> = messages.iter().filter(|m| m.timestamp > checkpoint.timestamp).collect();
    after.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
    let mut current = checkpoint.id;
    for m in after {
        if is_checkpoint_message(m) {
            break;
        }
        current = m.id;
    }
    current
}

pub fn find_session_end(messages: &[Message], checkpoint: &Message) -> MessageId {
    let children = children_by_parent(messages);
    let via_parent = session_end_via_parent_walk(&children, checkpoint.id);
    if via_parent == checkpoint.id {
        session_end_via_timestamp_walk(messages, checkpoint)
    } else {
        via_parent
    }
}

/// Outcome of [`SnapshotEngine::restore_to_checkpoint`]; the caller (the
/// router) is responsible for broadcasting `chat:messages-changed` once
/// this returns successfully.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoreOutcome {
    pub head_message_id: MessageId,
    pub restored_snapshot: Option<Snapshot>,
}

/// One row of a [`Timeline`].
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineNode {
    pub message_id: MessageId,
    pub parent_id: Option<MessageId>,
    pub active_child_id: Option<MessageId>,
    pub timestamp: String,
    pub message_text: String,
    pub is_on_active_path: bool,
    pub is_orphaned: bool,
    pub is_current: bool,
    pub has_snapshot: bool,
    pub files_changed: u32,
    pub insertions: u32,
    pub deletions: u32,
}

#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Timeline {
    pub nodes: Vec<TimelineNode>,
    pub current_head_id: Option<MessageId>,
}

fn descendant_checkpoints(checkpoints: &[&Message], tree: &CheckpointTree, head: MessageId) -> HashSet<MessageId> {
    checkpoints.iter().filter(|m| tree.path_to_root(m.id).contains(&head)).map(|m| m.id).collect()
}

fn aggregate_snapshot_stats(snapshots: &[Snapshot], from_ts: &str, to_ts: Option<&str>) -> (u32, u32, u32) {
    snapshots
        .iter()
        .filter(|s| !s.is_deleted)
        .filter(|s| s.created_at.as_str() > from_ts)
        .filter(|s| to_ts.map(|to| s.created_at.as_str() < to).unwrap_or(true))
        .fold((0, 0, 0), |(fc, ins, del), s| (fc + s.files_changed, ins + s.insertions, del + s.deletions))
}

/// Capture/restore plus the checkpoint-tree bookkeeping, wired to a
/// concrete [`Db`] and the two on-disk stores it delegates to.
pub struct SnapshotEngine<D: Db> {
    db: Arc<D>,
    blobs: BlobStore,
    trees: TreeStore,
}

impl<D: Db> SnapshotEngine<D> {
    pub fn new(db: Arc<D>, blobs: BlobStore, trees: TreeStore) -> Self {
        Self { db, blobs, trees }
    }

    fn load_tree(&self, snapshot: &Snapshot) -> Result<TreeMap, EngineError> {
        Ok(self.trees.read_tree(snapshot.id)?)
    }

    /// Captures the project's current working tree as a new [`Snapshot`]
    /// anchored to `message_id` (§4.3 capture steps 1-7).
    #[allow(clippy::too_many_arguments)]
    pub fn capture(
        &self,
        project_path: &Path,
        project_id: ProjectId,
        session_id: ChatSessionId,
        message_id: MessageId,
        cache: &mut HashMap<String, CacheEntry>,
        now: impl Into<String>,
    ) -> Result<Snapshot, EngineError> {
        let files = enumerate_files(project_path);
        let mut tree: TreeMap = HashMap::new();
        let mut contents: HashMap<String, Vec<u8>> = HashMap::new();

        for rel in &files {
            let full = project_path.join(rel);
            let metadata = match std::fs::metadata(&full) {
                Ok(m) => m,
                Err(_) => continue,
            };
            if !metadata.is_file() || metadata.len() > MAX_FILE_SIZE {
                continue;
            }
            let hashed = hash_file(&self.blobs, cache, rel, &full)?;
            if let Some(bytes) = hashed.content {
                contents.insert(rel.clone(), bytes);
            }
            tree.insert(rel.clone(), hashed.hash);
        }

        let previous = self.db.latest_snapshot(session_id)?;
        let old_tree = match &previous {
            Some(snap) => self.load_tree(snap)?,
            None => TreeMap::new(),
        };
        let delta = DeltaChanges::diff(&old_tree, &tree);
        let (files_changed, insertions, deletions) = self.diff_stats(&old_tree, &tree, &contents, &delta);

        let mut snapshot = Snapshot::new(
            message_id,
            session_id,
            project_id,
            SnapshotType::Full,
            previous.as_ref().map(|s| s.id),
            now,
        );
        let tree_hash = self.trees.store_tree(snapshot.id, &tree)?;
        snapshot.tree_hash = Some(tree_hash);
        snapshot.delta_changes = Some(delta);
        snapshot.files_changed = files_changed;
        snapshot.insertions = insertions;
        snapshot.deletions = deletions;

        self.db.insert_snapshot(snapshot.clone())?;
        Ok(snapshot)
    }

    fn diff_stats(
        &self,
        old_tree: &TreeMap,
        new_tree: &TreeMap,
        new_contents: &HashMap<String, Vec<u8>>,
        delta: &DeltaChanges,
    ) -> (u32, u32, u32) {
        let mut files_changed = 0u32;
        let mut insertions = 0u32;
        let mut deletions = 0u32;

        for path in delta.added.iter().chain(delta.modified.iter()) {
            files_changed += 1;
            let Some(new_hash) = new_tree.get(path) else { continue };
            let new_bytes = new_contents
                .get(path)
                .cloned()
                .unwrap_or_else(|| self.blobs.read_blob(new_hash).unwrap_or_default());
            let old_bytes = old_tree.get(path).and_then(|h| self.blobs.read_blob(h).ok()).unwrap_or_default();
            let (ins, del) = line_diff_stats(&old_bytes, &new_bytes);
            insertions += ins;
            deletions += del;
        }
        for path in &delta.deleted {
            files_changed += 1;
            if let Some(old_bytes) = old_tree.get(path).and_then(|h| self.blobs.read_blob(h).ok()) {
                let (_, del) = line_diff_stats(&old_bytes, &[]);
                deletions += del;
            }
        }
        (files_changed, insertions, deletions)
    }

    /// Materializes `snapshot`'s tree onto disk at `project_path` (§4.3
    /// restore steps 1-4). Best-effort: on error the caller has whatever
    /// partial set was written before the failing operation.
    pub fn restore(&self, project_path: &Path, snapshot: &Snapshot) -> Result<(), EngineError> {
        let tree = self.load_tree(snapshot)?;
        let current_files = enumerate_files(project_path);

        for rel in &current_files {
            if !tree.contains_key(rel) {
                let full = project_path.join(rel);
                std::fs::remove_file(&full)?;
            }
        }

        for (rel, hash) in &tree {
            let full = project_path.join(rel);
            let target_bytes = self.blobs.read_blob(hash)?;
            let unchanged = std::fs::read(&full).map(|existing| existing == target_bytes).unwrap_or(false);
            if unchanged {
                continue;
            }
            if let Some(parent) = full.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&full, &target_bytes)?;
        }
        Ok(())
    }

    /// The central restore operation (§4.3 steps 1-6; step 7, broadcasting
    /// `chat:messages-changed`, is the router's job once this returns Ok).
    pub fn restore_to_checkpoint(
        &self,
        project_path: &Path,
        session_id: ChatSessionId,
        checkpoint_message_id: MessageId,
    ) -> Result<RestoreOutcome, EngineError> {
        let target = self.db.get_message(checkpoint_message_id)?;
        let messages = self.db.list_messages(session_id)?;
        let by_id: HashMap<MessageId, &Message> = messages.iter().map(|m| (m.id, m)).collect();

        let session_end_id = find_session_end(&messages, &target);

        let mut session: ChatSession = self.db.get_chat_session(session_id)?;
        session.move_head(session_end_id);

        let mut cursor = by_id.get(&session_end_id).copied();
        let mut visited = HashSet::new();
        while let Some(m) = cursor {
            if !visited.insert(m.id) {
                break;
            }
            if let Some(sdk_session_id) = &m.sdk_session_id {
                session.latest_sdk_session_id = Some(sdk_session_id.clone());
                break;
            }
            cursor = m.parent_message_id.and_then(|p| by_id.get(&p).copied());
        }
        self.db.update_chat_session(session)?;

        let mut tree = CheckpointTree::new();
        for m in messages.iter().filter(|m| is_checkpoint_message(m)) {
            let state = self.db.get_checkpoint_tree_state(session_id, m.id)?.unwrap_or_else(|| CheckpointTreeState {
                session_id,
                parent_checkpoint_id: nearest_checkpoint_ancestor(&by_id, m.parent_message_id),
                active_child_id: None,
            });
            tree.insert(m.id, state);
        }
        let path = tree.path_to_root(checkpoint_message_id);
        for pair in path.windows(2) {
            tree.set_active_child(session_id, pair[0], pair[1]);
        }
        for id in &path {
            if let Some(state) = tree.get(id) {
                self.db.put_checkpoint_tree_state(*id, state.clone())?;
            }
        }

        let snapshots = self.db.list_snapshots(session_id)?;
        let snapshots_by_message: HashMap<MessageId, &Snapshot> =
            snapshots.iter().filter(|s| !s.is_deleted).map(|s| (s.message_id, s)).collect();

        let mut restored_snapshot = None;
        let mut cursor = by_id.get(&session_end_id).copied();
        let mut visited = HashSet::new();
        while let Some(m) = cursor {
            if !visited.insert(m.id) {
                break;
            }
            if let Some(snap) = snapshots_by_message.get(&m.id) {
                restored_snapshot = Some((*snap).clone());
                break;
            }
            if m.id == target.id {
                break;
            }
            cursor = m.parent_message_id.and_then(|p| by_id.get(&p).copied());
        }

        if let Some(snap) = &restored_snapshot {
            self.restore(project_path, snap)?;
        }

        Ok(RestoreOutcome { head_message_id: session_end_id, restored_snapshot })
    }

    /// The checkpoint-tree timeline for a session (§4.3 timeline query).
    pub fn timeline(&self, session_id: ChatSessionId) -> Result<Timeline, EngineError> {
        let session = self.db.get_chat_session(session_id)?;
        let messages = self.db.list_messages(session_id)?;
        let by_id: HashMap<MessageId, &Message> = messages.iter().map(|m| (m.id, m)).collect();
        let mut checkpoints: Vec<&Message> = messages.iter().filter(|m| is_checkpoint_message(m)).collect();
        checkpoints.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));

        let snapshots = self.db.list_snapshots(session_id)?;

        let head_checkpoint = session.current_head_message_id.and_then(|head| {
            by_id.get(&head).copied().and_then(|m| {
                if is_checkpoint_message(m) {
                    Some(m.id)
                } else {
                    nearest_checkpoint_ancestor(&by_id, Some(m.id))
                }
            })
        });

        let mut tree = CheckpointTree::new();
        for m in &checkpoints {
            if let Some(state) = self.db.get_checkpoint_tree_state(session_id, m.id)? {
                tree.insert(m.id, state);
            }
        }

        let active_path: HashSet<MessageId> =
            head_checkpoint.map(|h| tree.path_to_root(h).into_iter().collect()).unwrap_or_default();
        let descendants = head_checkpoint
            .map(|h| descendant_checkpoints(&checkpoints, &tree, h))
            .unwrap_or_default();

        let mut nodes = Vec::with_capacity(checkpoints.len());
        for (idx, m) in checkpoints.iter().enumerate() {
            let state = tree.get(&m.id);
            let next_timestamp = checkpoints.get(idx + 1).map(|n| n.timestamp.clone());
            let (files_changed, insertions, deletions) =
                aggregate_snapshot_stats(&snapshots, &m.timestamp, next_timestamp.as_deref());
            let has_snapshot = snapshots.iter().any(|s| !s.is_deleted && s.message_id == m.id);
            let text: String = message_text(m).chars().take(100).collect();

            nodes.push(TimelineNode {
                message_id: m.id,
                parent_id: state.and_then(|s| s.parent_checkpoint_id),
                active_child_id: state.and_then(|s| s.active_child_id),
                timestamp: m.timestamp.clone(),
                message_text: text,
                is_on_active_path: active_path.contains(&m.id),
                is_orphaned: descendants.contains(&m.id) && !active_path.contains(&m.id),
                is_current: Some(m.id) == head_checkpoint,
                has_snapshot,
                files_changed,
                insertions,
                deletions,
            });
        }

        Ok(Timeline { nodes, current_head_id: session.current_head_message_id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hearth_core::test_support::{MessageBuilder, ProjectBuilder};
    use hearth_core::{MessageRole, Project};
    use hearth_storage::db::InMemoryDb;

    fn engine(dir: &std::path::Path) -> SnapshotEngine<InMemoryDb> {
        SnapshotEngine::new(
            Arc::new(InMemoryDb::new()),
            BlobStore::new(dir.join("blobs")),
            TreeStore::new(dir.join("trees")),
        )
    }

    fn user(session_id: ChatSessionId, text: &str, parent: Option<MessageId>, ts: &str) -> Message {
        let mut builder = MessageBuilder::default()
            .session_id(session_id)
            .role(MessageRole::User)
            .timestamp(ts)
            .sdk_payload(serde_json::json!({ "text": text }));
        if let Some(p) = parent {
            builder = builder.parent_message_id(p);
        }
        builder.build()
    }

    fn assistant(session_id: ChatSessionId, parent: MessageId, ts: &str) -> Message {
        MessageBuilder::default()
            .session_id(session_id)
            .role(MessageRole::Assistant)
            .parent_message_id(parent)
            .timestamp(ts)
            .sdk_payload(serde_json::json!({ "text": "" }))
            .build()
    }

    #[test]
    fn capture_then_restore_round_trips_a_project_tree() {
        let workdir = tempfile::tempdir().unwrap();
        let project_path = workdir.path().join("project");
        std::fs::create_dir_all(&project_path).unwrap();
        std::fs::write(project_path.join("a.txt"), b"hello").unwrap();

        let store_dir = workdir.path().join("store");
        let eng = engine(&store_dir);

        let project: Project = ProjectBuilder::default().name("demo").build();
        let session_id = ChatSessionId::new();
        let message_id = MessageId::new();
        let mut cache = HashMap::new();

        let snapshot =
            eng.capture(&project_path, project.id, session_id, message_id, &mut cache, "2026-01-01T00:00:00Z").unwrap();
        assert_eq!(snapshot.files_changed, 1);
        assert_eq!(snapshot.insertions, 1);

        std::fs::write(project_path.join("a.txt"), b"changed").unwrap();
        std::fs::write(project_path.join("b.txt"), b"new file").unwrap();

        eng.restore(&project_path, &snapshot).unwrap();

        assert_eq!(std::fs::read(project_path.join("a.txt")).unwrap(), b"hello");
        assert!(!project_path.join("b.txt").exists());
    }

    #[test]
    fn second_capture_reports_an_empty_delta_for_an_unmodified_tree() {
        let workdir = tempfile::tempdir().unwrap();
        let project_path = workdir.path().join("project");
        std::fs::create_dir_all(&project_path).unwrap();
        std::fs::write(project_path.join("a.txt"), b"hello").unwrap();

        let eng = engine(&workdir.path().join("store"));
        let project: Project = ProjectBuilder::default().name("demo").build();
        let session_id = ChatSessionId::new();
        let mut cache = HashMap::new();

        eng.capture(&project_path, project.id, session_id, MessageId::new(), &mut cache, "2026-01-01T00:00:00Z")
            .unwrap();
        let second = eng
            .capture(&project_path, project.id, session_id, MessageId::new(), &mut cache, "2026-01-01T00:01:00Z")
            .unwrap();

        assert!(second.delta_changes.unwrap().is_empty());
        assert_eq!(second.files_changed, 0);
    }

    #[test]
    fn find_session_end_follows_parent_walk_to_deepest_non_checkpoint() {
        let session_id = ChatSessionId::new();
        let checkpoint = user(session_id, "do the thing", None, "2026-01-01T00:00:00Z");
        let reply1 = assistant(session_id, checkpoint.id, "2026-01-01T00:00:01Z");
        let reply2 = assistant(session_id, reply1.id, "2026-01-01T00:00:02Z");
        let messages = vec![checkpoint.clone(), reply1, reply2.clone()];

        assert_eq!(find_session_end(&messages, &checkpoint), reply2.id);
    }

    #[test]
    fn find_session_end_falls_back_to_timestamp_walk_when_no_children_recorded() {
        let session_id = ChatSessionId::new();
        let checkpoint = user(session_id, "do the thing", None, "2026-01-01T00:00:00Z");
        // No parent_message_id links recorded, only timestamps.
        let reply = MessageBuilder::default()
            .session_id(session_id)
            .role(MessageRole::Assistant)
            .timestamp("2026-01-01T00:00:01Z")
            .sdk_payload(serde_json::json!({ "text": "" }))
            .build();
        let messages = vec![checkpoint.clone(), reply.clone()];

        assert_eq!(find_session_end(&messages, &checkpoint), reply.id);
    }

    #[test]
    fn find_session_end_stops_at_the_next_checkpoint() {
        let session_id = ChatSessionId::new();
        let checkpoint = user(session_id, "first", None, "2026-01-01T00:00:00Z");
        let reply = assistant(session_id, checkpoint.id, "2026-01-01T00:00:01Z");
        let next_checkpoint = user(session_id, "second", Some(reply.id), "2026-01-01T00:00:02Z");
        let messages = vec![checkpoint.clone(), reply.clone(), next_checkpoint];

        assert_eq!(find_session_end(&messages, &checkpoint), reply.id);
    }
}
