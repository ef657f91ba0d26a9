// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `terminal:*` channels: create/write/resize/kill a PTY session and query
//! missed output on reconnect (§4.4, §4.5).

use std::collections::HashMap;
use std::sync::Arc;

use hearth_core::{ChatSessionId, ProjectId, PtySessionId, PtySize, WireError};
use hearth_wire::ChannelRegistry;
use serde::{Deserialize, Serialize};

use crate::state::AppState;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateParams {
    session_id: ChatSessionId,
    command: String,
    cwd: String,
    project_id: Option<ProjectId>,
    project_path: Option<String>,
    #[serde(default)]
    cols: Option<u16>,
    #[serde(default)]
    rows: Option<u16>,
    #[serde(default)]
    env: HashMap<String, String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateResult {
    pty_session_id: PtySessionId,
    stream_id: hearth_core::StreamId,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct InputParams {
    pty_session_id: PtySessionId,
    data: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResizeParams {
    pty_session_id: PtySessionId,
    cols: u16,
    rows: u16,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct KillParams {
    pty_session_id: PtySessionId,
    #[serde(default)]
    force: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct MissedOutputParams {
    stream_id: hearth_core::StreamId,
    session_id: ChatSessionId,
    #[serde(default)]
    from_index: u64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MissedOutputResult {
    chunks: Vec<String>,
}

pub fn register(registry: &mut ChannelRegistry, state: Arc<AppState>) {
    let create_state = state.clone();
    registry.on("terminal:create", move |params: CreateParams| {
        let state = create_state.clone();
        async move {
            let size = PtySize { cols: params.cols.unwrap_or(80), rows: params.rows.unwrap_or(24) };
            let pty_session_id = state
                .pty
                .create(None, params.cwd.clone(), params.project_id, size, params.env)
                .map_err(WireError::from)?;

            let stream_id = state.streams.start(
                params.session_id,
                params.command,
                params.project_id,
                params.project_path,
                Some(params.cwd),
                Some(pty_session_id),
            );
            state.stream_by_pty.lock().insert(pty_session_id, stream_id);

            Ok(CreateResult { pty_session_id, stream_id })
        }
    });

    let input_state = state.clone();
    registry.on("terminal:input", move |params: InputParams| {
        let state = input_state.clone();
        async move { state.pty.write(params.pty_session_id, &params.data).map_err(WireError::from) }
    });

    let resize_state = state.clone();
    registry.on("terminal:resize", move |params: ResizeParams| {
        let state = resize_state.clone();
        async move {
            let size = PtySize { cols: params.cols, rows: params.rows };
            state.pty.resize(params.pty_session_id, size).map_err(WireError::from)
        }
    });

    let kill_state = state.clone();
    registry.on("terminal:kill", move |params: KillParams| {
        let state = kill_state.clone();
        async move { state.pty.kill(params.pty_session_id, params.force).await.map_err(WireError::from) }
    });

    let missed_state = state.clone();
    registry.on("terminal:missed-output", move |params: MissedOutputParams| {
        let state = missed_state.clone();
        async move {
            let chunks = state
                .streams
                .missed_output(params.stream_id, params.session_id, params.from_index)
                .map_err(WireError::from)?;
            Ok(MissedOutputResult { chunks })
        }
    });
}
