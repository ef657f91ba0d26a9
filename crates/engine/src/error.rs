// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use hearth_core::{ErrorCode, WireError};

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Storage(#[from] hearth_storage::StorageError),
    #[error("pty spawn failed: {0}")]
    PtySpawn(String),
    #[error("no pty session with id {0}")]
    PtyNotFound(String),
    #[error("no browser tab manager for project")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("operation timed out")]
    Timeout,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<EngineError> for WireError {
    fn from(err: EngineError) -> Self {
        let message = err.to_string();
        match err {
            EngineError::Storage(storage_err) => storage_err.into(),
            EngineError::PtySpawn(_) | EngineError::Io(_) => WireError::new(ErrorCode::IoError, message),
            EngineError::PtyNotFound(_) | EngineError::NotFound(_) => {
                WireError::new(ErrorCode::NotFound, message)
            }
            EngineError::Conflict(_) => WireError::new(ErrorCode::Conflict, message),
            EngineError::Timeout => WireError::new(ErrorCode::Timeout, message),
        }
    }
}
