// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use hearth_core::{ErrorCode, WireError};

#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    #[error("no tab with id {0}")]
    TabNotFound(String),
    #[error("no browser session for project {0}")]
    ProjectNotFound(String),
    #[error("dialog {0} not found")]
    DialogNotFound(String),
    #[error("mcp control is held by another tab")]
    ControlHeld,
    #[error("no project available for this tool call")]
    NoProjectAvailable,
    #[error("browser engine error: {0}")]
    Engine(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<AdapterError> for WireError {
    fn from(err: AdapterError) -> Self {
        let message = err.to_string();
        match err {
            AdapterError::TabNotFound(_) | AdapterError::ProjectNotFound(_) | AdapterError::DialogNotFound(_) => {
                WireError::new(ErrorCode::NotFound, message)
            }
            AdapterError::ControlHeld => WireError::new(ErrorCode::Conflict, message),
            AdapterError::NoProjectAvailable => WireError::new(ErrorCode::ValidationError, message),
            AdapterError::Engine(_) => WireError::new(ErrorCode::Internal, message),
            AdapterError::Io(_) => WireError::new(ErrorCode::IoError, message),
        }
    }
}
