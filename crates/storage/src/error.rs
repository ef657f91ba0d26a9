// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use hearth_core::{ErrorCode, WireError};

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("blob {0} not found")]
    BlobNotFound(String),
    #[error("tree {0} not found")]
    TreeNotFound(String),
    #[error("entity not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
}

impl From<StorageError> for WireError {
    fn from(err: StorageError) -> Self {
        let code = match &err {
            StorageError::Io(_) => ErrorCode::IoError,
            StorageError::Serde(_) => ErrorCode::ValidationError,
            StorageError::BlobNotFound(_) | StorageError::TreeNotFound(_) | StorageError::NotFound(_) => {
                ErrorCode::NotFound
            }
            StorageError::Conflict(_) => ErrorCode::Conflict,
        };
        WireError::new(code, err.to_string())
    }
}
