// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `mcp:*` channels over the MCP Dispatcher (§4.10, C10). These mirror the
//! dispatcher's in-process transport — the stdio transport
//! ([`McpDispatcher::serve_stdio`]) is for an external MCP client spawning
//! the daemon as a subprocess and isn't reachable over the router.

use std::sync::Arc;

use hearth_adapters::McpContext;
use hearth_core::{ProjectId, WireError};
use hearth_wire::ChannelRegistry;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::state::AppState;

#[derive(Serialize)]
struct ToolNamesResult {
    names: Vec<&'static str>,
}

#[derive(Deserialize)]
struct ToolSchemaParams {
    name: String,
}

#[derive(Serialize)]
struct ToolSchemaResult {
    description: &'static str,
    schema: schemars::schema::RootSchema,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CallParams {
    name: String,
    #[serde(default)]
    args: Value,
    #[serde(default)]
    project_id: Option<ProjectId>,
}

pub fn register(registry: &mut ChannelRegistry, state: Arc<AppState>) {
    #[derive(Deserialize)]
    struct Empty {}
    let s = state.clone();
    registry.on("mcp:tool-names", move |_: Empty| {
        let s = s.clone();
        async move { Ok::<_, WireError>(ToolNamesResult { names: s.mcp.tool_names() }) }
    });

    let s = state.clone();
    registry.on("mcp:tool-schema", move |p: ToolSchemaParams| {
        let s = s.clone();
        async move {
            let (description, schema) = s
                .mcp
                .tool_schema(&p.name)
                .ok_or_else(|| WireError::not_found(format!("unknown mcp tool {:?}", p.name)))?;
            Ok::<_, WireError>(ToolSchemaResult { description, schema: schema.clone() })
        }
    });

    let s = state.clone();
    registry.on("mcp:call", move |p: CallParams| {
        let s = s.clone();
        async move {
            let ctx = McpContext { project_id: p.project_id };
            s.mcp.call(&p.name, p.args, ctx).await.map_err(WireError::from)
        }
    });
}
