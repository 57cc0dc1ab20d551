// SPDX-License-Identifier: MIT

//! JSON-RPC 2.0 envelope types exchanged on an established agent connection.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Reserved JSON-RPC error codes this crate emits.
pub mod error_code {
    pub const PARSE_ERROR: i64 = -32700;
    pub const INVALID_REQUEST: i64 = -32600;
    pub const METHOD_NOT_FOUND: i64 = -32601;
    pub const INTERNAL_ERROR: i64 = -32603;
    pub const PERMISSION_DENIED: i64 = -32001;
}

fn jsonrpc_version() -> String {
    "2.0".to_string()
}

/// An inbound or outbound JSON-RPC call. Absence of `id` marks a notification,
/// which never receives a response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RpcRequest {
    #[serde(rename = "jsonrpc", default = "jsonrpc_version")]
    pub jsonrpc: String,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
}

impl RpcRequest {
    pub fn call(id: impl Into<Value>, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: jsonrpc_version(),
            method: method.into(),
            params,
            id: Some(id.into()),
        }
    }

    pub fn notification(method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: jsonrpc_version(),
            method: method.into(),
            params,
            id: None,
        }
    }

    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}

/// Structured error payload of an error response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl RpcError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    pub fn method_not_found(method: &str) -> Self {
        Self::new(
            error_code::METHOD_NOT_FOUND,
            format!("method not found: {method}"),
        )
    }

    pub fn permission_denied(method: &str) -> Self {
        Self::new(
            error_code::PERMISSION_DENIED,
            format!("permission denied for method: {method}"),
        )
    }

    pub fn internal() -> Self {
        Self::new(error_code::INTERNAL_ERROR, "internal server error")
    }

    pub fn invalid_request(reason: &str) -> Self {
        Self::new(error_code::INVALID_REQUEST, reason.to_string())
    }
}

/// A JSON-RPC response: exactly one of `result`/`error` is populated, per spec.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RpcResponse {
    #[serde(rename = "jsonrpc", default = "jsonrpc_version")]
    pub jsonrpc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
    pub id: Option<Value>,
}

impl RpcResponse {
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: jsonrpc_version(),
            result: Some(result),
            error: None,
            id: Some(id),
        }
    }

    pub fn failure(id: Option<Value>, error: RpcError) -> Self {
        Self {
            jsonrpc: jsonrpc_version(),
            result: None,
            error: Some(error),
            id,
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// A single wire frame, disambiguated by shape rather than a `type` tag —
/// JSON-RPC responses carry `result`/`error`, requests and notifications
/// carry `method`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Frame {
    Request(RpcRequest),
    Response(RpcResponse),
}

#[cfg(test)]
#[path = "rpc_tests.rs"]
mod tests;

#[cfg(test)]
#[path = "rpc_property_tests.rs"]
mod property_tests;
