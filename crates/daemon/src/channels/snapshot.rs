// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `snapshot:*` channels over the Snapshot Engine (§4.3, C3).

use std::path::PathBuf;
use std::sync::Arc;

use hearth_core::{ChatSessionId, MessageId, ProjectId, Snapshot, WireError};
use hearth_wire::ChannelRegistry;
use serde::Deserialize;

use crate::state::AppState;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CaptureParams {
    project_path: PathBuf,
    project_id: ProjectId,
    session_id: ChatSessionId,
    message_id: MessageId,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RestoreParams {
    project_path: PathBuf,
    snapshot: Snapshot,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RestoreToCheckpointParams {
    project_path: PathBuf,
    session_id: ChatSessionId,
    checkpoint_message_id: MessageId,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TimelineParams {
    session_id: ChatSessionId,
}

pub fn register(registry: &mut ChannelRegistry, state: Arc<AppState>) {
    let s = state.clone();
    registry.on("snapshot:capture", move |params: CaptureParams| {
        let s = s.clone();
        async move {
            s.capture_snapshot(&params.project_path, params.project_id, params.session_id, params.message_id)
                .map_err(WireError::from)
        }
    });

    let s = state.clone();
    registry.on("snapshot:restore", move |params: RestoreParams| {
        let s = s.clone();
        async move { s.snapshots.restore(&params.project_path, &params.snapshot).map_err(WireError::from) }
    });

    let s = state.clone();
    registry.on("snapshot:restore-to-checkpoint", move |params: RestoreToCheckpointParams| {
        let s = s.clone();
        async move {
            let outcome = s
                .snapshots
                .restore_to_checkpoint(&params.project_path, params.session_id, params.checkpoint_message_id)
                .map_err(WireError::from)?;
            s.connections.emit_chat_session(
                params.session_id,
                "chat:messages-changed",
                serde_json::json!({ "headMessageId": outcome.head_message_id }),
            );
            Ok(outcome)
        }
    });

    let s = state.clone();
    registry.on("snapshot:timeline", move |params: TimelineParams| {
        let s = s.clone();
        async move { s.snapshots.timeline(params.session_id).map_err(WireError::from) }
    });
}
