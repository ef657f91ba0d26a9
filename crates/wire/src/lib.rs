// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! hearth-wire: the WebSocket frame format, channel registry, and
//! broadcast-scoping contract shared by every sub-router.

pub mod broadcast;
pub mod dispatch;
pub mod frame;

pub use broadcast::{Broadcaster, RecordingBroadcaster};
pub use dispatch::{ChannelRegistry, HandlerFuture};
pub use frame::{Frame, FrameType};
