// SPDX-License-Identifier: MIT

//! Server-exposed method handlers registered into `fleetd_protocol::MethodTable`.

use async_trait::async_trait;
use fleetd_core::{AgentId, AgentStatus, Clock};
use fleetd_protocol::{AgentHeartbeat, AgentShutdownNotice, MethodHandler, RpcError};
use fleetd_storage::AgentRepository;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// Latest resource sample reported by each connected agent. Populated by
/// `agent.heartbeat` and left for a metrics plane to read; this crate never
/// reads it back.
#[derive(Clone, Default)]
pub struct HeartbeatCache {
    samples: Arc<Mutex<HashMap<String, AgentHeartbeat>>>,
}

impl HeartbeatCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn latest(&self, agent_id: &str) -> Option<AgentHeartbeat> {
        self.samples.lock().get(agent_id).cloned()
    }

    fn store(&self, agent_id: &str, heartbeat: AgentHeartbeat) {
        self.samples.lock().insert(agent_id.to_string(), heartbeat);
    }
}

/// Handles `agent.heartbeat`. A notification: `last_seen` is refreshed by
/// the receive loop for every inbound frame regardless of method, so this
/// handler's only job is stashing the resource sample.
pub struct HeartbeatHandler {
    cache: HeartbeatCache,
}

impl HeartbeatHandler {
    pub fn new(cache: HeartbeatCache) -> Self {
        Self { cache }
    }
}

#[async_trait]
impl MethodHandler for HeartbeatHandler {
    async fn call(&self, agent_id: &str, params: Option<Value>) -> Result<Value, RpcError> {
        let params = params.ok_or_else(|| RpcError::invalid_request("missing heartbeat params"))?;
        let heartbeat: AgentHeartbeat = serde_json::from_value(params)
            .map_err(|e| RpcError::invalid_request(&e.to_string()))?;
        self.cache.store(agent_id, heartbeat);
        Ok(Value::Null)
    }
}

/// Handles `agent.ping`: a liveness probe the agent may call at will.
pub struct PingHandler {
    version: String,
}

impl PingHandler {
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
        }
    }
}

#[async_trait]
impl MethodHandler for PingHandler {
    async fn call(&self, agent_id: &str, _params: Option<Value>) -> Result<Value, RpcError> {
        Ok(json!({
            "status": "ok",
            "version": self.version,
            "agent_id": agent_id,
        }))
    }
}

/// Handles `agent.shutdown`: an agent-initiated graceful disconnect notice.
/// Marks the agent `DISCONNECTED` immediately rather than waiting for the
/// transport to notice the close.
pub struct ShutdownHandler<C: Clock> {
    storage: AgentRepository,
    clock: C,
}

impl<C: Clock> ShutdownHandler<C> {
    pub fn new(storage: AgentRepository, clock: C) -> Self {
        Self { storage, clock }
    }
}

#[async_trait]
impl<C: Clock> MethodHandler for ShutdownHandler<C> {
    async fn call(&self, agent_id: &str, params: Option<Value>) -> Result<Value, RpcError> {
        let notice: AgentShutdownNotice = match params {
            Some(params) => serde_json::from_value(params)
                .map_err(|e| RpcError::invalid_request(&e.to_string()))?,
            None => AgentShutdownNotice {
                reason: "user_request".to_string(),
                restart: false,
            },
        };

        let id = AgentId::new(agent_id.to_string());
        self.storage
            .set_status(&id, AgentStatus::Disconnected, self.clock.now())
            .await
            .map_err(|_| RpcError::internal())?;

        tracing::info!(%agent_id, reason = %notice.reason, restart = notice.restart, "agent reported shutdown");
        Ok(Value::Null)
    }
}

#[cfg(test)]
#[path = "methods_tests.rs"]
mod tests;
