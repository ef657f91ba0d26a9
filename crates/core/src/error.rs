// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wire-facing error taxonomy.
//!
//! Every crate in this workspace defines its own `thiserror` error enum at
//! its boundary. The router maps any such error to [`ErrorCode`] via a
//! single `From` conversion — never by matching on string content.

use serde::{Deserialize, Serialize};

/// The closed set of error codes surfaced on the wire as `{code, message}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Payload failed the channel schema.
    ValidationError,
    /// Router could not dispatch the channel name.
    UnknownChannel,
    /// Referenced entity absent (session, tab, snapshot, blob).
    NotFound,
    /// State precondition failed (tunnel already active, file exists, ...).
    Conflict,
    /// Filesystem/subprocess/network failure with non-actionable detail.
    IoError,
    /// Operation exceeded its timeout.
    Timeout,
    /// OS-level EPERM/EACCES.
    Permission,
    /// Everything else.
    Internal,
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorCode::ValidationError => "VALIDATION_ERROR",
            ErrorCode::UnknownChannel => "UNKNOWN_CHANNEL",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::Conflict => "CONFLICT",
            ErrorCode::IoError => "IO_ERROR",
            ErrorCode::Timeout => "TIMEOUT",
            ErrorCode::Permission => "PERMISSION",
            ErrorCode::Internal => "INTERNAL",
        };
        write!(f, "{s}")
    }
}

/// The wire representation of a failed request: `{code, message}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireError {
    pub code: ErrorCode,
    pub message: String,
}

impl WireError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self { code, message: message.into() }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ValidationError, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Conflict, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Internal, message)
    }
}

impl std::fmt::Display for WireError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for WireError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_code_serializes_screaming_snake_case() {
        let json = serde_json::to_string(&ErrorCode::UnknownChannel).unwrap();
        assert_eq!(json, "\"UNKNOWN_CHANNEL\"");
    }

    #[test]
    fn wire_error_round_trips() {
        let err = WireError::not_found("session abc missing");
        let json = serde_json::to_string(&err).unwrap();
        let back: WireError = serde_json::from_str(&json).unwrap();
        assert_eq!(err, back);
    }

    #[test]
    fn display_includes_code_and_message() {
        let err = WireError::conflict("tunnel already active");
        assert_eq!(err.to_string(), "CONFLICT: tunnel already active");
    }
}
