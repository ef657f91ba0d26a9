// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `tunnel:*` channels over the Tunnel Manager (§4.7, C7). Progress events
//! are fanned out to the project room as they arrive rather than polled.

use std::sync::Arc;

use hearth_core::WireError;
use hearth_engine::TunnelKey;
use hearth_wire::ChannelRegistry;
use serde::{Deserialize, Serialize};

use crate::state::AppState;

#[derive(Serialize)]
struct StartResult {
    url: String,
}

pub fn register(registry: &mut ChannelRegistry, state: Arc<AppState>) {
    let s = state.clone();
    registry.on("tunnel:start", move |key: TunnelKey| {
        let s = s.clone();
        async move {
            let url = s.tunnels.start(key).await.map_err(WireError::from)?;
            Ok(StartResult { url })
        }
    });

    let s = state.clone();
    registry.on("tunnel:stop", move |key: TunnelKey| {
        let s = s.clone();
        async move { s.tunnels.stop(key).map_err(WireError::from) }
    });

    #[derive(Deserialize)]
    struct Empty {}
    let s = state.clone();
    registry.on("tunnel:stop-all", move |_: Empty| {
        let s = s.clone();
        async move {
            s.tunnels.stop_all();
            Ok::<(), WireError>(())
        }
    });
}

/// Spawns the background task that forwards [`TunnelManager`](hearth_engine::TunnelManager)
/// progress onto each tunnel's project room. Call once at startup.
pub fn spawn_progress_forwarder(state: Arc<AppState>) {
    let mut progress = state.tunnels.subscribe();
    tokio::spawn(async move {
        while let Ok(update) = progress.recv().await {
            state.connections.emit_project(
                update.key.project_id,
                "tunnel:progress",
                serde_json::json!({ "port": update.key.port, "stage": update.stage, "url": update.url }),
            );
        }
    });
}
