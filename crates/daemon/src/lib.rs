// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! hearth-daemon: the router (C6) and every subsystem singleton it
//! dispatches to — PTY sessions, the snapshot engine, the browser tab
//! manager, the tunnel manager, the git service, and the MCP dispatcher.
//! `app` (the `hearth-cli` binary) is a thin bootstrap over [`run`].

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod channels;
pub mod lifecycle;
pub mod listener;
pub mod registry;
pub mod sink;
pub mod state;

pub use lifecycle::{Config, LifecycleError};
pub use state::AppState;

use std::sync::Arc;

use hearth_engine::TunnelBinary;

/// Brings the daemon fully up and runs until Ctrl+C, then shuts down
/// gracefully.
pub async fn run(config: Config, tunnel_binary: Arc<dyn TunnelBinary>) -> Result<(), LifecycleError> {
    let lifecycle::StartupResult { state, listener } = lifecycle::startup(&config, tunnel_binary).await?;
    let channels = Arc::new(channels::build(state.clone()));

    tokio::select! {
        _ = listener::run(listener, state.clone(), channels) => {}
        _ = tokio::signal::ctrl_c() => {}
    }

    lifecycle::shutdown(&state);
    Ok(())
}
