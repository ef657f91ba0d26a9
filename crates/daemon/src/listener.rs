// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! WebSocket transport (§4.6 "Transport"). One accepted TCP connection
//! upgrades to one WebSocket, served by one logical task: `tokio::select!`
//! races inbound frame handling against the connection's own outbound
//! queue, so a vanished client's in-flight handler never leaks.

use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use hearth_core::{ChatSessionId, ProjectId};
use hearth_wire::{ChannelRegistry, Frame};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use crate::state::AppState;

/// Accepts connections off `listener` forever, spawning one task per
/// connection. Returns only if the listener itself errors out.
pub async fn run(listener: TcpListener, state: Arc<AppState>, channels: Arc<ChannelRegistry>) {
    loop {
        let (stream, peer_addr) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(err) => {
                warn!("accept failed: {err}");
                continue;
            }
        };
        let state = state.clone();
        let channels = channels.clone();
        let task = tokio::spawn(async move { handle_connection(stream, state, channels).await });
        tokio::spawn(async move {
            match task.await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => debug!(%peer_addr, "connection ended: {err}"),
                Err(join_err) => warn!(%peer_addr, "connection task panicked: {join_err}"),
            }
        });
    }
}

async fn handle_connection(
    stream: TcpStream,
    state: Arc<AppState>,
    channels: Arc<ChannelRegistry>,
) -> Result<(), tokio_tungstenite::tungstenite::Error> {
    let ws = tokio_tungstenite::accept_async(stream).await?;
    let (mut write, mut read) = ws.split();

    let (handle, mut outbound) = state.connections.register();
    info!(connection = ?handle.id, "connection established");

    loop {
        tokio::select! {
            outgoing = outbound.recv() => {
                match outgoing {
                    Some(message) => {
                        if write.send(message).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
            incoming = read.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        handle_frame(&text, &channels, &handle).await;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(err)) => {
                        debug!("read error: {err}");
                        break;
                    }
                }
            }
        }
    }

    state.connections.unregister(handle.id);
    Ok(())
}

/// Parses and dispatches one client frame. Request/response frames get an
/// answering `res`; event frames are handled but never replied to.
async fn handle_frame(
    text: &str,
    channels: &Arc<ChannelRegistry>,
    handle: &Arc<crate::registry::ConnectionHandle>,
) {
    let frame = match Frame::from_json(text) {
        Ok(frame) => frame,
        Err(err) => {
            debug!("dropping unparseable frame: {err}");
            return;
        }
    };

    adopt_room_hints(&frame.payload, handle);

    if !frame.is_request() {
        let _ = channels.dispatch(&frame.channel, frame.payload).await;
        return;
    }

    let Some(id) = frame.id.clone() else { return };
    let reply = match channels.dispatch(&frame.channel, frame.payload).await {
        Ok(result) => Frame::response_ok(id, frame.channel, result),
        Err(err) => Frame::response_err(id, frame.channel, err),
    };
    handle.send(&reply);
}

/// Mirrors §4.6's "project_id set at connect or first project-scoped
/// call": any request payload carrying a `projectId`/`sessionId` field
/// joins this connection to the matching broadcast room.
fn adopt_room_hints(payload: &serde_json::Value, handle: &Arc<crate::registry::ConnectionHandle>) {
    if let Some(project_id) = payload.get("projectId").and_then(|v| serde_json::from_value::<ProjectId>(v.clone()).ok()) {
        handle.set_project(project_id);
    }
    if let Some(session_id) = payload.get("sessionId").and_then(|v| serde_json::from_value::<ChatSessionId>(v.clone()).ok()) {
        handle.set_chat_session(session_id);
    }
}
