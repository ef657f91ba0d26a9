// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Channel registry: each dotted channel name (`files:read-file`,
//! `terminal:input`, ...) maps to a payload schema and a handler (§4.6).
//! Every sub-router (PTY, snapshot, browser, MCP) builds one of these and
//! the daemon crate merges them into the root dispatch table.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

use hearth_core::{ErrorCode, WireError};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

pub type HandlerFuture = Pin<Box<dyn Future<Output = Result<Value, WireError>> + Send>>;
type HandlerFn = Box<dyn Fn(Value) -> HandlerFuture + Send + Sync>;

/// A name → handler table for one subsystem's channels.
///
/// Handlers are boxed, type-erased closures; typed registration via
/// [`ChannelRegistry::on`] deserializes the payload for you and turns a
/// deserialization failure into `VALIDATION_ERROR`, matching §4.6's
/// "payload schema validated on entry" contract.
#[derive(Default)]
pub struct ChannelRegistry {
    handlers: HashMap<String, HandlerFn>,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a typed handler. `P` is the payload schema; `R` the
    /// result schema. Both travel as JSON Schema-describable types in the
    /// adapter layer that authors tool/channel definitions.
    pub fn on<P, R, F, Fut>(&mut self, channel: impl Into<String>, handler: F)
    where
        P: DeserializeOwned + Send + 'static,
        R: Serialize + Send + 'static,
        F: Fn(P) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, WireError>> + Send + 'static,
    {
        let boxed: HandlerFn = Box::new(move |payload: Value| {
            let parsed = serde_json::from_value::<P>(payload);
            let fut = match parsed {
                Ok(p) => Some(handler(p)),
                Err(_) => None,
            };
            Box::pin(async move {
                match fut {
                    Some(fut) => {
                        let result = fut.await?;
                        serde_json::to_value(result)
                            .map_err(|e| WireError::internal(format!("failed to serialize result: {e}")))
                    }
                    None => Err(WireError::validation("payload failed channel schema")),
                }
            })
        });
        self.handlers.insert(channel.into(), boxed);
    }

    /// Merges another registry's channels into this one. Used to build the
    /// root router as the merge of every subsystem's sub-router (§4.6).
    pub fn merge(&mut self, other: ChannelRegistry) {
        self.handlers.extend(other.handlers);
    }

    pub fn contains(&self, channel: &str) -> bool {
        self.handlers.contains_key(channel)
    }

    /// Dispatches a payload to `channel`. Returns `UNKNOWN_CHANNEL` if no
    /// handler is registered.
    pub async fn dispatch(&self, channel: &str, payload: Value) -> Result<Value, WireError> {
        match self.handlers.get(channel) {
            Some(handler) => handler(payload).await,
            None => Err(WireError::new(ErrorCode::UnknownChannel, format!("no handler for {channel}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Deserialize)]
    struct Ping {
        n: u32,
    }

    #[derive(Serialize)]
    struct Pong {
        n: u32,
    }

    #[tokio::test]
    async fn dispatch_routes_to_registered_handler() {
        let mut registry = ChannelRegistry::new();
        registry.on("test:ping", |p: Ping| async move { Ok(Pong { n: p.n + 1 }) });

        let result = registry.dispatch("test:ping", serde_json::json!({"n": 1})).await.unwrap();
        assert_eq!(result, serde_json::json!({"n": 2}));
    }

    #[tokio::test]
    async fn dispatch_unknown_channel_returns_typed_error() {
        let registry = ChannelRegistry::new();
        let err = registry.dispatch("nope:nope", Value::Null).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::UnknownChannel);
    }

    #[tokio::test]
    async fn dispatch_bad_payload_returns_validation_error() {
        let mut registry = ChannelRegistry::new();
        registry.on("test:ping", |p: Ping| async move { Ok(Pong { n: p.n }) });

        let err = registry.dispatch("test:ping", serde_json::json!({"n": "not-a-number"})).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);
    }

    #[tokio::test]
    async fn merge_combines_two_registries() {
        let mut a = ChannelRegistry::new();
        a.on("a:ping", |p: Ping| async move { Ok(Pong { n: p.n }) });
        let mut b = ChannelRegistry::new();
        b.on("b:ping", |p: Ping| async move { Ok(Pong { n: p.n }) });

        a.merge(b);
        assert!(a.contains("a:ping"));
        assert!(a.contains("b:ping"));
    }
}
