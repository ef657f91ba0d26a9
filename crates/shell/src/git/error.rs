// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use hearth_core::{ErrorCode, WireError};

#[derive(Debug, thiserror::Error)]
pub enum GitError {
    #[error("failed to spawn git: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("git exited with status {status}: {stderr}")]
    Failed { status: i32, stderr: String },
    #[error("git command timed out after {0:?}")]
    Timeout(std::time::Duration),
    #[error("failed to parse git output: {0}")]
    Parse(String),
}

impl From<GitError> for WireError {
    fn from(err: GitError) -> Self {
        let code = match &err {
            GitError::Spawn(_) => ErrorCode::IoError,
            GitError::Failed { .. } => ErrorCode::Conflict,
            GitError::Timeout(_) => ErrorCode::Timeout,
            GitError::Parse(_) => ErrorCode::Internal,
        };
        WireError::new(code, err.to_string())
    }
}
