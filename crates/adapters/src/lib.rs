// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! hearth-adapters: the Browser Tab Manager (C8), WebRTC/WebCodecs Bridge
//! (C9), and MCP Dispatcher (C10) — everything that drives or is driven
//! by the headless browser.

pub mod browser;
pub mod error;
pub mod mcp;
pub mod webrtc_bridge;

pub use browser::{BrowserAction, BrowserEngine, BrowserTabManager, DomAnalysis, UnavailableBrowserEngine};
pub use error::AdapterError;
pub use mcp::{McpContext, McpDispatcher, ToolContent};
pub use webrtc_bridge::{ChunkKind, EncodedChunk, FrameSource, StreamSession};

#[cfg(any(test, feature = "test-support"))]
pub use browser::FakeBrowserEngine;
