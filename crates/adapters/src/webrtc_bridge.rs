// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! WebRTC/WebCodecs Bridge (§4.9, C9).
//!
//! Two concerns, deliberately separated: a hand-rolled, fully pure and
//! unit-testable chunk framing codec (this module's lower half), and the
//! peer connection / DataChannel plumbing built on the `webrtc` crate
//! (the upper half). The bridge produces encoded chunks from the headless
//! browser's capture surface — a collaborator reached through
//! [`FrameSource`] — and buffers only the currently in-flight frame; the
//! decoder and renderer live on the client.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use webrtc::api::media_engine::MediaEngine;
use webrtc::api::APIBuilder;
use webrtc::data_channel::data_channel_message::DataChannelMessage;
use webrtc::data_channel::RTCDataChannel;
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;

use crate::error::AdapterError;

/// Discriminator byte at the front of every framed chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkKind {
    Video,
    Audio,
}

impl ChunkKind {
    fn tag(self) -> u8 {
        match self {
            ChunkKind::Video => 0,
            ChunkKind::Audio => 1,
        }
    }

    fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(ChunkKind::Video),
            1 => Some(ChunkKind::Audio),
            _ => None,
        }
    }
}

/// One encoded media chunk, ready to hand to the data channel or just
/// decoded from the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedChunk {
    pub kind: ChunkKind,
    pub timestamp_us: u64,
    pub keyframe: bool,
    pub data: Vec<u8>,
}

/// Video frame: `[type:1][ts:u64 LE][keyframe:1][size:u32 LE][data:size]`.
/// Audio frame: `[type:1][ts:u64 LE][size:u32 LE][data:size]` (no keyframe byte).
pub fn encode_chunk(chunk: &EncodedChunk) -> Vec<u8> {
    let mut buf = Vec::with_capacity(1 + 8 + 1 + 4 + chunk.data.len());
    buf.push(chunk.kind.tag());
    buf.extend_from_slice(&chunk.timestamp_us.to_le_bytes());
    if chunk.kind == ChunkKind::Video {
        buf.push(chunk.keyframe as u8);
    }
    buf.extend_from_slice(&(chunk.data.len() as u32).to_le_bytes());
    buf.extend_from_slice(&chunk.data);
    buf
}

#[derive(Debug, thiserror::Error)]
pub enum FrameDecodeError {
    #[error("frame too short: needed at least {needed} bytes, got {got}")]
    TooShort { needed: usize, got: usize },
    #[error("unknown chunk type discriminator {0}")]
    UnknownType(u8),
    #[error("declared payload size {declared} exceeds remaining {remaining} bytes")]
    SizeMismatch { declared: usize, remaining: usize },
}

pub fn decode_chunk(bytes: &[u8]) -> Result<EncodedChunk, FrameDecodeError> {
    if bytes.is_empty() {
        return Err(FrameDecodeError::TooShort { needed: 1, got: 0 });
    }
    let kind = ChunkKind::from_tag(bytes[0]).ok_or(FrameDecodeError::UnknownType(bytes[0]))?;
    let header_len = if kind == ChunkKind::Video { 1 + 8 + 1 + 4 } else { 1 + 8 + 4 };
    if bytes.len() < header_len {
        return Err(FrameDecodeError::TooShort { needed: header_len, got: bytes.len() });
    }

    let mut offset = 1;
    let timestamp_us = u64::from_le_bytes(bytes[offset..offset + 8].try_into().expect("slice is exactly 8 bytes"));
    offset += 8;

    let keyframe = if kind == ChunkKind::Video {
        let flag = bytes[offset] != 0;
        offset += 1;
        flag
    } else {
        false
    };

    let size = u32::from_le_bytes(bytes[offset..offset + 4].try_into().expect("slice is exactly 4 bytes")) as usize;
    offset += 4;

    let remaining = bytes.len() - offset;
    if size > remaining {
        return Err(FrameDecodeError::SizeMismatch { declared: size, remaining });
    }

    Ok(EncodedChunk { kind, timestamp_us, keyframe, data: bytes[offset..offset + size].to_vec() })
}

/// Collaborator boundary to the headless browser's media capture surface.
#[async_trait::async_trait]
pub trait FrameSource: Send + Sync {
    async fn next_chunk(&self) -> Option<EncodedChunk>;
}

/// Signalling payloads exchanged over the main WebSocket (§4.9).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamOffer {
    pub sdp: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamAnswer {
    pub sdp: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamIceCandidate {
    pub candidate: String,
    pub sdp_mid: Option<String>,
    pub sdp_mline_index: Option<u16>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamConnectionState {
    New,
    Connecting,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

impl From<RTCPeerConnectionState> for StreamConnectionState {
    fn from(state: RTCPeerConnectionState) -> Self {
        match state {
            RTCPeerConnectionState::New => StreamConnectionState::New,
            RTCPeerConnectionState::Connecting => StreamConnectionState::Connecting,
            RTCPeerConnectionState::Connected => StreamConnectionState::Connected,
            RTCPeerConnectionState::Disconnected => StreamConnectionState::Disconnected,
            RTCPeerConnectionState::Failed => StreamConnectionState::Failed,
            RTCPeerConnectionState::Closed => StreamConnectionState::Closed,
            RTCPeerConnectionState::Unspecified => StreamConnectionState::New,
        }
    }
}

/// One peer connection plus its single media DataChannel, for one browser
/// tab's preview stream.
pub struct StreamSession {
    peer: Arc<RTCPeerConnection>,
    channel: Arc<RTCDataChannel>,
}

impl StreamSession {
    /// Builds a fresh peer connection with one ordered, reliable
    /// DataChannel ("media"), and returns the local offer to send to the
    /// client via `preview:browser-stream-start`/`-offer`.
    pub async fn new_with_offer() -> Result<(Self, StreamOffer), AdapterError> {
        let mut media_engine = MediaEngine::default();
        media_engine.register_default_codecs().map_err(|e| AdapterError::Engine(e.to_string()))?;
        let api = APIBuilder::new().with_media_engine(media_engine).build();

        let peer = api
            .new_peer_connection(RTCConfiguration::default())
            .await
            .map_err(|e| AdapterError::Engine(e.to_string()))?;
        let peer = Arc::new(peer);

        let channel = peer.create_data_channel("media", None).await.map_err(|e| AdapterError::Engine(e.to_string()))?;

        let offer = peer.create_offer(None).await.map_err(|e| AdapterError::Engine(e.to_string()))?;
        peer.set_local_description(offer.clone()).await.map_err(|e| AdapterError::Engine(e.to_string()))?;

        Ok((Self { peer, channel }, StreamOffer { sdp: offer.sdp }))
    }

    /// Applies the client's SDP answer to `preview:browser-stream-answer`.
    pub async fn accept_answer(&self, answer: StreamAnswer) -> Result<(), AdapterError> {
        let description = RTCSessionDescription::answer(answer.sdp).map_err(|e| AdapterError::Engine(e.to_string()))?;
        self.peer.set_remote_description(description).await.map_err(|e| AdapterError::Engine(e.to_string()))
    }

    /// Adds an ICE candidate received via `preview:browser-stream-ice`.
    pub async fn add_ice_candidate(&self, candidate: StreamIceCandidate) -> Result<(), AdapterError> {
        let init = RTCIceCandidateInit {
            candidate: candidate.candidate,
            sdp_mid: candidate.sdp_mid,
            sdp_mline_index: candidate.sdp_mline_index,
            username_fragment: None,
        };
        self.peer.add_ice_candidate(init).await.map_err(|e| AdapterError::Engine(e.to_string()))
    }

    /// Registers the callback used to forward locally-gathered ICE
    /// candidates out over `preview:browser-stream-ice`.
    pub fn on_ice_candidate<F>(&self, mut emit: F)
    where
        F: FnMut(RTCIceCandidate) + Send + 'static,
    {
        self.peer.on_ice_candidate(Box::new(move |candidate| {
            if let Some(candidate) = candidate {
                emit(candidate);
            }
            Box::pin(async {})
        }));
    }

    /// Registers the callback used to forward connection state changes out
    /// over `preview:browser-stream-state`.
    pub fn on_state_change<F>(&self, mut emit: F)
    where
        F: FnMut(StreamConnectionState) + Send + 'static,
    {
        self.peer.on_peer_connection_state_change(Box::new(move |state| {
            emit(state.into());
            Box::pin(async {})
        }));
    }

    /// Registers a handler invoked whenever the remote end writes to the
    /// media channel (used only for protocol acks; media is one-way).
    pub fn on_message<F>(&self, mut handler: F)
    where
        F: FnMut(DataChannelMessage) + Send + 'static,
    {
        self.channel.on_message(Box::new(move |msg| {
            handler(msg);
            Box::pin(async {})
        }));
    }

    /// Sends one already-framed chunk over the media channel. The bridge
    /// buffers only this in-flight frame — no internal queue.
    pub async fn send_chunk(&self, chunk: &EncodedChunk) -> Result<(), AdapterError> {
        let framed = encode_chunk(chunk);
        self.channel.send(&framed.into()).await.map_err(|e| AdapterError::Engine(e.to_string()))?;
        Ok(())
    }

    pub async fn close(&self) -> Result<(), AdapterError> {
        self.peer.close().await.map_err(|e| AdapterError::Engine(e.to_string()))
    }

    /// Drains `source` and forwards each chunk until it returns `None` or
    /// the channel errors.
    pub async fn pump(&self, source: Arc<dyn FrameSource>) -> Result<(), AdapterError> {
        while let Some(chunk) = source.next_chunk().await {
            self.send_chunk(&chunk).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn video_chunk_round_trips_through_the_wire_format() {
        let chunk = EncodedChunk { kind: ChunkKind::Video, timestamp_us: 123_456, keyframe: true, data: vec![1, 2, 3, 4] };
        let framed = encode_chunk(&chunk);
        assert_eq!(decode_chunk(&framed).unwrap(), chunk);
    }

    #[test]
    fn audio_chunk_has_no_keyframe_byte() {
        let chunk = EncodedChunk { kind: ChunkKind::Audio, timestamp_us: 7, keyframe: false, data: vec![9, 9] };
        let framed = encode_chunk(&chunk);
        // type(1) + ts(8) + size(4) + data(2), no keyframe byte
        assert_eq!(framed.len(), 1 + 8 + 4 + 2);
        assert_eq!(decode_chunk(&framed).unwrap(), chunk);
    }

    #[test]
    fn decode_rejects_unknown_discriminator() {
        let bytes = vec![9, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0];
        assert!(matches!(decode_chunk(&bytes), Err(FrameDecodeError::UnknownType(9))));
    }

    #[test]
    fn decode_rejects_truncated_header() {
        let bytes = vec![0, 1, 2, 3];
        assert!(matches!(decode_chunk(&bytes), Err(FrameDecodeError::TooShort { .. })));
    }

    #[test]
    fn decode_rejects_size_exceeding_remaining_bytes() {
        let mut bytes = vec![1u8]; // audio
        bytes.extend_from_slice(&0u64.to_le_bytes());
        bytes.extend_from_slice(&100u32.to_le_bytes()); // declares 100 bytes of payload
        bytes.extend_from_slice(&[1, 2, 3]); // only 3 actually present
        assert!(matches!(decode_chunk(&bytes), Err(FrameDecodeError::SizeMismatch { declared: 100, remaining: 3 })));
    }

    #[test]
    fn multiple_chunks_can_be_parsed_back_to_back_from_a_stream_buffer() {
        let a = EncodedChunk { kind: ChunkKind::Video, timestamp_us: 1, keyframe: true, data: vec![1] };
        let b = EncodedChunk { kind: ChunkKind::Audio, timestamp_us: 2, keyframe: false, data: vec![2, 2] };
        let mut buf = encode_chunk(&a);
        buf.extend(encode_chunk(&b));

        let first = decode_chunk(&buf).unwrap();
        assert_eq!(first, a);
        let consumed = 1 + 8 + 1 + 4 + a.data.len();
        let second = decode_chunk(&buf[consumed..]).unwrap();
        assert_eq!(second, b);
    }
}
