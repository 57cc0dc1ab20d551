// SPDX-License-Identifier: MIT

//! The agent registry (C3): process-wide map from a connected agent to its
//! live connection handle, plus the per-agent table of outbound calls
//! awaiting a response.

use crate::error::OutboundCallError;
use fleetd_core::AgentId;
use fleetd_protocol::RpcResponse;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

/// One in-flight outbound call: a single-shot completion slot with a
/// deadline. At most one `complete` ever reaches the receiver.
struct PendingCall {
    completion: oneshot::Sender<Result<Value, OutboundCallError>>,
}

/// Application-level reason carried on the WebSocket close frame the
/// server sends the peer (§6's `rate_limited`/`auth_failed`/`auth_timeout`/
/// `server_shutdown` codes). Private-use range 4000-4999.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    AuthFailed,
    AuthTimeout,
    ServerShutdown,
}

impl CloseReason {
    pub fn code_and_text(self) -> (u16, &'static str) {
        match self {
            CloseReason::AuthFailed => (4002, "auth_failed"),
            CloseReason::AuthTimeout => (4003, "auth_timeout"),
            CloseReason::ServerShutdown => (4004, "server_shutdown"),
        }
    }
}

/// A message queued for the connection's writer task: either a frame to
/// forward as-is, or a request to close the socket with an application
/// reason.
pub enum OutboundMessage {
    Frame(String),
    Close(CloseReason),
}

/// A live agent connection, as seen by the registry.
pub struct ConnectionHandle {
    pub agent_id: AgentId,
    outbound: mpsc::UnboundedSender<OutboundMessage>,
    next_request_id: AtomicU64,
    pending: Mutex<HashMap<u64, PendingCall>>,
}

impl ConnectionHandle {
    pub fn new(agent_id: AgentId, outbound: mpsc::UnboundedSender<OutboundMessage>) -> Self {
        Self {
            agent_id,
            outbound,
            next_request_id: AtomicU64::new(1),
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Issue an outbound JSON-RPC call and await its response, or time out.
    pub async fn call(
        &self,
        method: &str,
        params: Option<Value>,
        timeout: Duration,
    ) -> Result<Value, OutboundCallError> {
        let request_id = self.next_request_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(request_id, PendingCall { completion: tx });

        let request = fleetd_protocol::RpcRequest::call(request_id as i64, method, params);
        let encoded = match serde_json::to_string(&request) {
            Ok(encoded) => encoded,
            Err(_) => {
                self.pending.lock().remove(&request_id);
                return Err(OutboundCallError::ConnectionClosed);
            }
        };

        if self.outbound.send(OutboundMessage::Frame(encoded)).is_err() {
            self.pending.lock().remove(&request_id);
            return Err(OutboundCallError::ConnectionClosed);
        }

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(OutboundCallError::ConnectionClosed),
            Err(_) => {
                // Deadline elapsed: release the slot so a late response is dropped.
                self.pending.lock().remove(&request_id);
                Err(OutboundCallError::Timeout(timeout))
            }
        }
    }

    /// Complete a pending call from an inbound response frame. Unmatched
    /// ids are logged and dropped by the caller.
    pub fn complete(&self, response: RpcResponse) -> bool {
        let Some(id) = response.id.as_ref().and_then(Value::as_u64) else {
            return false;
        };
        let Some(pending) = self.pending.lock().remove(&id) else {
            return false;
        };
        let result = match response.error {
            Some(error) => Err(OutboundCallError::Remote {
                code: error.code,
                message: error.message,
            }),
            None => Ok(response.result.unwrap_or(Value::Null)),
        };
        let _ = pending.completion.send(result);
        true
    }

    /// Send a fire-and-forget frame (e.g. a response to an inbound call, or
    /// a notification) without expecting a correlated reply.
    pub fn send_raw(&self, frame: String) -> Result<(), OutboundCallError> {
        self.outbound
            .send(OutboundMessage::Frame(frame))
            .map_err(|_| OutboundCallError::ConnectionClosed)
    }

    /// Ask the writer task to close the socket with an application-level
    /// close reason. Best-effort: a connection already gone silently drops
    /// the request.
    pub fn close(&self, reason: CloseReason) {
        let _ = self.outbound.send(OutboundMessage::Close(reason));
    }

    /// Fail every pending call on this connection. Called when the
    /// connection closes so no slot leaks past its owning transport.
    pub fn fail_all_pending(&self) {
        let pending: Vec<_> = self.pending.lock().drain().collect();
        for (_, call) in pending {
            let _ = call.completion.send(Err(OutboundCallError::ConnectionClosed));
        }
    }
}

/// Process-wide map of currently connected agents.
#[derive(Default, Clone)]
pub struct AgentRegistry {
    connections: Arc<Mutex<HashMap<AgentId, Arc<ConnectionHandle>>>>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a newly authenticated connection. If another connection for
    /// the same agent already exists, it is replaced — the newer connection
    /// wins and the old handle's pending calls are failed out.
    pub fn register(&self, handle: Arc<ConnectionHandle>) {
        let previous = self
            .connections
            .lock()
            .insert(handle.agent_id.clone(), handle);
        if let Some(previous) = previous {
            previous.fail_all_pending();
        }
    }

    /// Remove a connection, but only if `handle` is still the one on file —
    /// avoids a stale close racing out a newer reconnection.
    pub fn unregister(&self, agent_id: &AgentId, handle: &Arc<ConnectionHandle>) {
        let mut connections = self.connections.lock();
        if let Some(current) = connections.get(agent_id) {
            if Arc::ptr_eq(current, handle) {
                connections.remove(agent_id);
            }
        }
    }

    pub fn is_connected(&self, agent_id: &AgentId) -> bool {
        self.connections.lock().contains_key(agent_id)
    }

    pub fn get(&self, agent_id: &AgentId) -> Option<Arc<ConnectionHandle>> {
        self.connections.lock().get(agent_id).cloned()
    }

    /// Best-effort write to every currently connected agent.
    pub fn broadcast(&self, frame: String) {
        for handle in self.connections.lock().values() {
            let _ = handle.send_raw(frame.clone());
        }
    }

    /// Close every live connection with `reason`. Used during shutdown so
    /// pending outbound calls complete with a transport error rather than
    /// being left dangling when the process exits.
    pub fn close_all(&self, reason: CloseReason) {
        for handle in self.connections.lock().values() {
            handle.close(reason);
        }
    }

    /// Convenience wrapper: send a request to a connected agent by id.
    pub async fn send_request(
        &self,
        agent_id: &AgentId,
        method: &str,
        params: Option<Value>,
        timeout: Duration,
    ) -> Result<Value, OutboundCallError> {
        let handle = self
            .get(agent_id)
            .ok_or_else(|| OutboundCallError::NotConnected(agent_id.to_string()))?;
        handle.call(method, params, timeout).await
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
