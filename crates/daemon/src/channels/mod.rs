// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-subsystem channel handlers, merged into one [`ChannelRegistry`]
//! (§4.6, C6).

pub mod browser;
pub mod git;
pub mod mcp;
pub mod snapshot;
pub mod terminal;
pub mod tunnel;

use std::sync::Arc;

use hearth_wire::ChannelRegistry;

use crate::state::AppState;

/// Builds the root channel registry the router dispatches every incoming
/// frame through.
pub fn build(state: Arc<AppState>) -> ChannelRegistry {
    let mut registry = ChannelRegistry::new();
    terminal::register(&mut registry, state.clone());
    browser::register(&mut registry, state.clone());
    snapshot::register(&mut registry, state.clone());
    tunnel::register(&mut registry, state.clone());
    git::register(&mut registry, state.clone());
    mcp::register(&mut registry, state);
    registry
}
