// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The wire frame format carried by the single WebSocket connection (§4.6).

use hearth_core::WireError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Discriminates the three frame shapes that can cross the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameType {
    /// Client → server call awaiting exactly one `Res` with the same `id`.
    Req,
    /// Server → client reply to a `Req`.
    Res,
    /// Fire-and-forget, either direction; no reply expected.
    Event,
}

/// `{id?, type, channel, payload, error?}`.
///
/// `id` is present on `Req`/`Res` frames (used to match replies) and absent
/// on `Event` frames.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Frame {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub frame_type: FrameType,
    pub channel: String,
    #[serde(default)]
    pub payload: Value,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<WireError>,
}

impl Frame {
    pub fn request(id: impl Into<String>, channel: impl Into<String>, payload: Value) -> Self {
        Self { id: Some(id.into()), frame_type: FrameType::Req, channel: channel.into(), payload, error: None }
    }

    pub fn response_ok(id: impl Into<String>, channel: impl Into<String>, payload: Value) -> Self {
        Self { id: Some(id.into()), frame_type: FrameType::Res, channel: channel.into(), payload, error: None }
    }

    pub fn response_err(id: impl Into<String>, channel: impl Into<String>, error: WireError) -> Self {
        Self { id: Some(id.into()), frame_type: FrameType::Res, channel: channel.into(), payload: Value::Null, error: Some(error) }
    }

    pub fn event(channel: impl Into<String>, payload: Value) -> Self {
        Self { id: None, frame_type: FrameType::Event, channel: channel.into(), payload, error: None }
    }

    pub fn is_request(&self) -> bool {
        self.frame_type == FrameType::Req
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hearth_core::ErrorCode;

    #[test]
    fn request_round_trips_through_json() {
        let frame = Frame::request("1", "files:read-file", serde_json::json!({"path": "a.txt"}));
        let json = frame.to_json().unwrap();
        let back = Frame::from_json(&json).unwrap();
        assert_eq!(back.id.as_deref(), Some("1"));
        assert_eq!(back.channel, "files:read-file");
        assert!(back.is_request());
    }

    #[test]
    fn event_has_no_id() {
        let frame = Frame::event("terminal:output", serde_json::json!({"chunk": "ls\n"}));
        let json = frame.to_json().unwrap();
        assert!(!json.contains("\"id\""));
    }

    #[test]
    fn response_err_round_trips_error_code() {
        let frame = Frame::response_err("9", "terminal:input", WireError::not_found("no such session"));
        let json = frame.to_json().unwrap();
        let back = Frame::from_json(&json).unwrap();
        assert_eq!(back.error.unwrap().code, ErrorCode::NotFound);
    }

    #[test]
    fn missing_payload_defaults_to_null() {
        let back: Frame = serde_json::from_str(r#"{"type":"event","channel":"ping"}"#).unwrap();
        assert_eq!(back.payload, Value::Null);
    }
}
