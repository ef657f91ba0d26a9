// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! hearth-storage: the Blob Store (C2), tree files, terminal stream cache
//! persistence (C5), and the relational-store boundary (`Db`).

pub mod blob;
pub mod db;
pub mod error;
pub mod terminal_cache;
pub mod tree;

pub use blob::{hash_content, hash_file, BlobStore, CacheEntry, HashedFile};
pub use db::{Db, InMemoryDb, SettingsMap};
pub use error::StorageError;
pub use terminal_cache::{CachedStream, TerminalCacheStore};
pub use tree::{TreeMap, TreeStore};
