// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tree files: JSON mappings of `relative_path -> blob_hash` for a
//! snapshot, stored at `trees/<snapshot_id>.json` (§4.2/§3).

use std::collections::HashMap;
use std::path::PathBuf;

use hearth_core::SnapshotId;

use crate::blob::{hash_content, BlobStore};
use crate::error::StorageError;

pub type TreeMap = HashMap<String, String>;

pub struct TreeStore {
    root: PathBuf,
}

impl TreeStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, snapshot_id: SnapshotId) -> PathBuf {
        self.root.join(format!("{snapshot_id}.json"))
    }

    /// Persists `map` for `snapshot_id` and returns the SHA-256 of its
    /// canonical JSON encoding, stored back on the snapshot row as
    /// `tree_hash` for integrity verification.
    pub fn store_tree(&self, snapshot_id: SnapshotId, map: &TreeMap) -> Result<String, StorageError> {
        std::fs::create_dir_all(&self.root)?;
        let mut sorted: Vec<_> = map.iter().collect();
        sorted.sort_by_key(|(path, _)| path.as_str());
        let json = serde_json::to_vec(&sorted)?;
        std::fs::write(self.path_for(snapshot_id), &json)?;
        Ok(hash_content(&json))
    }

    pub fn read_tree(&self, snapshot_id: SnapshotId) -> Result<TreeMap, StorageError> {
        let path = self.path_for(snapshot_id);
        let bytes = std::fs::read(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StorageError::TreeNotFound(snapshot_id.to_string())
            } else {
                StorageError::Io(e)
            }
        })?;
        let pairs: Vec<(String, String)> = serde_json::from_slice(&bytes)?;
        Ok(pairs.into_iter().collect())
    }

    /// Reads every blob referenced by `map` in parallel-shaped fashion
    /// (sequentially here — the blob store itself has no concurrent I/O to
    /// exploit without async file handles, matching the daemon's
    /// synchronous disk access elsewhere).
    pub fn resolve_tree(&self, store: &BlobStore, map: &TreeMap) -> Result<HashMap<String, Vec<u8>>, StorageError> {
        map.iter()
            .map(|(path, hash)| Ok((path.clone(), store.read_blob(hash)?)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_and_read_tree_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let trees = TreeStore::new(dir.path());
        let mut map = TreeMap::new();
        map.insert("src/main.rs".to_string(), "hash-1".to_string());
        map.insert("Cargo.toml".to_string(), "hash-2".to_string());

        let snapshot_id = SnapshotId::new();
        trees.store_tree(snapshot_id, &map).unwrap();
        let back = trees.read_tree(snapshot_id).unwrap();
        assert_eq!(back, map);
    }

    #[test]
    fn same_content_produces_same_tree_hash() {
        let dir = tempfile::tempdir().unwrap();
        let trees = TreeStore::new(dir.path());
        let mut map = TreeMap::new();
        map.insert("a.txt".to_string(), "hash-a".to_string());

        let hash1 = trees.store_tree(SnapshotId::new(), &map).unwrap();
        let hash2 = trees.store_tree(SnapshotId::new(), &map).unwrap();
        assert_eq!(hash1, hash2);
    }

    #[test]
    fn reading_missing_tree_returns_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let trees = TreeStore::new(dir.path());
        let err = trees.read_tree(SnapshotId::new()).unwrap_err();
        assert!(matches!(err, StorageError::TreeNotFound(_)));
    }

    #[test]
    fn resolve_tree_reads_every_referenced_blob() {
        let dir = tempfile::tempdir().unwrap();
        let store = BlobStore::new(dir.path().join("blobs"));
        let trees = TreeStore::new(dir.path().join("trees"));

        let hash = store.store_blob(b"fn main() {}").unwrap();
        let mut map = TreeMap::new();
        map.insert("src/main.rs".to_string(), hash);

        let resolved = trees.resolve_tree(&store, &map).unwrap();
        assert_eq!(resolved["src/main.rs"], b"fn main() {}");
    }
}
