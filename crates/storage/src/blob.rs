// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Content-addressed, gzip-compressed blob storage (§4.2, C2).
//!
//! Blobs live at `blobs/<hh>/<hash>.gz` where `hh` is the first two hex
//! characters of the SHA-256 hash. Writes are atomic (temp file + rename)
//! and idempotent: writing a blob whose hash already exists is a no-op
//! (invariant 8).

use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use sha2::{Digest, Sha256};

use crate::error::StorageError;

pub fn hash_content(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex_encode(&hasher.finalize())
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Disk-backed, content-addressed blob store rooted at a directory
/// (conventionally `.appdata/snapshots/blobs`).
pub struct BlobStore {
    root: PathBuf,
}

impl BlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path_for(&self, hash: &str) -> PathBuf {
        let prefix = &hash[..2.min(hash.len())];
        self.root.join(prefix).join(format!("{hash}.gz"))
    }

    pub fn exists(&self, hash: &str) -> bool {
        self.path_for(hash).exists()
    }

    /// Writes `bytes` under their SHA-256 hash, gzip-compressed, and
    /// returns the hash. A no-op (other than the hash computation) if a
    /// blob with that hash already exists.
    pub fn store_blob(&self, bytes: &[u8]) -> Result<String, StorageError> {
        let hash = hash_content(bytes);
        let dest = self.path_for(&hash);
        if dest.exists() {
            return Ok(hash);
        }
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(bytes)?;
        let compressed = encoder.finish()?;

        let tmp = dest.with_extension("gz.tmp");
        std::fs::write(&tmp, &compressed)?;
        std::fs::rename(&tmp, &dest)?;
        Ok(hash)
    }

    pub fn read_blob(&self, hash: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.path_for(hash);
        let compressed = std::fs::read(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StorageError::BlobNotFound(hash.to_string())
            } else {
                StorageError::Io(e)
            }
        })?;
        let mut decoder = GzDecoder::new(compressed.as_slice());
        let mut out = Vec::new();
        decoder.read_to_end(&mut out)?;
        Ok(out)
    }
}

/// An entry in the mtime+size hash cache: if the file's current
/// `(mtime_ms, size)` matches the cached entry, the cached hash is reused
/// without reading the file again (§4.2 `hash_file`).
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct CacheEntry {
    pub mtime_ms: u64,
    pub size: u64,
    pub hash: String,
}

/// Result of [`hash_file`]. `content` is only populated on a cache miss, so
/// callers building a delta don't hold every file's bytes in memory when
/// most files are unchanged.
pub struct HashedFile {
    pub hash: String,
    pub content: Option<Vec<u8>>,
    pub cached: bool,
}

/// Hashes `full_path`, consulting `cache` first. On a hit, returns the
/// cached hash without reading file contents; on a miss, reads, hashes,
/// stores the blob, and updates `cache`.
pub fn hash_file(
    store: &BlobStore,
    cache: &mut std::collections::HashMap<String, CacheEntry>,
    relative_path: &str,
    full_path: &Path,
) -> Result<HashedFile, StorageError> {
    let metadata = std::fs::metadata(full_path)?;
    let size = metadata.len();
    let mtime_ms = metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0);

    if let Some(entry) = cache.get(relative_path) {
        if entry.mtime_ms == mtime_ms && entry.size == size {
            return Ok(HashedFile { hash: entry.hash.clone(), content: None, cached: true });
        }
    }

    let bytes = std::fs::read(full_path)?;
    let hash = store.store_blob(&bytes)?;
    cache.insert(relative_path.to_string(), CacheEntry { mtime_ms, size, hash: hash.clone() });
    Ok(HashedFile { hash, content: Some(bytes), cached: false })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_and_read_blob_round_trips_bytes_exactly() {
        let dir = tempfile::tempdir().unwrap();
        let store = BlobStore::new(dir.path());
        let bytes = b"hello, binary-safe world\x00\x01\x02";
        let hash = store.store_blob(bytes).unwrap();
        assert_eq!(store.read_blob(&hash).unwrap(), bytes);
    }

    #[test]
    fn storing_the_same_bytes_twice_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let store = BlobStore::new(dir.path());
        let hash1 = store.store_blob(b"same content").unwrap();
        let path = store.path_for(&hash1);
        let mtime1 = std::fs::metadata(&path).unwrap().modified().unwrap();

        std::thread::sleep(std::time::Duration::from_millis(10));
        let hash2 = store.store_blob(b"same content").unwrap();
        let mtime2 = std::fs::metadata(&path).unwrap().modified().unwrap();

        assert_eq!(hash1, hash2);
        assert_eq!(mtime1, mtime2);
    }

    #[test]
    fn reading_missing_blob_returns_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = BlobStore::new(dir.path());
        let err = store.read_blob("deadbeef").unwrap_err();
        assert!(matches!(err, StorageError::BlobNotFound(_)));
    }

    #[test]
    fn hash_file_is_cached_on_unchanged_mtime_and_size() {
        let dir = tempfile::tempdir().unwrap();
        let store = BlobStore::new(dir.path().join("blobs"));
        let file_path = dir.path().join("a.txt");
        std::fs::write(&file_path, b"v1").unwrap();

        let mut cache = std::collections::HashMap::new();
        let first = hash_file(&store, &mut cache, "a.txt", &file_path).unwrap();
        assert!(!first.cached);
        assert!(first.content.is_some());

        let second = hash_file(&store, &mut cache, "a.txt", &file_path).unwrap();
        assert!(second.cached);
        assert!(second.content.is_none());
        assert_eq!(first.hash, second.hash);
    }

    #[test]
    fn hash_file_detects_content_change_via_size() {
        let dir = tempfile::tempdir().unwrap();
        let store = BlobStore::new(dir.path().join("blobs"));
        let file_path = dir.path().join("a.txt");
        std::fs::write(&file_path, b"v1").unwrap();

        let mut cache = std::collections::HashMap::new();
        let first = hash_file(&store, &mut cache, "a.txt", &file_path).unwrap();

        std::fs::write(&file_path, b"v2-longer-content").unwrap();
        let second = hash_file(&store, &mut cache, "a.txt", &file_path).unwrap();
        assert!(!second.cached);
        assert_ne!(first.hash, second.hash);
    }
}
