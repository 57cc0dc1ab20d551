// SPDX-License-Identifier: MIT

//! Explicit registry of JSON-RPC methods an agent is allowed to invoke on
//! the server, replacing name-reflection dispatch with a data table.

use crate::rpc::{RpcError, RpcResponse};
use async_trait::async_trait;
use fleetd_core::Permission;
use serde_json::Value;
use std::collections::HashMap;

/// One inbound call, already stripped of its JSON-RPC envelope.
pub struct MethodCall {
    pub method: String,
    pub params: Option<Value>,
    /// `None` for notifications.
    pub id: Option<Value>,
}

/// A single server-exposed method.
#[async_trait]
pub trait MethodHandler: Send + Sync {
    async fn call(&self, agent_id: &str, params: Option<Value>) -> Result<Value, RpcError>;
}

struct RegisteredMethod {
    permission: Permission,
    handler: Box<dyn MethodHandler>,
}

/// The method table consulted by the dispatcher for every incoming request.
#[derive(Default)]
pub struct MethodTable {
    methods: HashMap<String, RegisteredMethod>,
}

impl MethodTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        name: impl Into<String>,
        permission: Permission,
        handler: Box<dyn MethodHandler>,
    ) {
        self.methods.insert(
            name.into(),
            RegisteredMethod { permission, handler },
        );
    }

    /// Dispatch one call against the table, applying permission gating
    /// before invoking the handler. `allowed` is the permission set granted
    /// to the calling connection.
    pub async fn dispatch(
        &self,
        agent_id: &str,
        call: MethodCall,
        allowed: &fleetd_core::PermissionSet,
    ) -> Option<RpcResponse> {
        let Some(id) = call.id.clone() else {
            // Notification: run the handler if found, but never respond.
            if let Some(registered) = self.methods.get(&call.method) {
                if allowed.allows(registered.permission) {
                    let _ = registered.handler.call(agent_id, call.params).await;
                }
            }
            return None;
        };

        let Some(registered) = self.methods.get(&call.method) else {
            return Some(RpcResponse::failure(
                Some(id),
                RpcError::method_not_found(&call.method),
            ));
        };

        if !allowed.allows(registered.permission) {
            return Some(RpcResponse::failure(
                Some(id),
                RpcError::permission_denied(&call.method),
            ));
        }

        match registered.handler.call(agent_id, call.params).await {
            Ok(result) => Some(RpcResponse::success(id, result)),
            Err(_) => Some(RpcResponse::failure(Some(id), RpcError::internal())),
        }
    }
}

#[cfg(test)]
#[path = "methods_tests.rs"]
mod tests;
