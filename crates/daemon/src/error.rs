// SPDX-License-Identifier: MIT

use thiserror::Error;

/// Errors raised while servicing a single connection. The receive loop
/// treats every variant as "log and continue" except [`ConnectionError::Closed`],
/// which ends the connection.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("frame parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("transport error: {0}")]
    Transport(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("handshake failed: {0}")]
    HandshakeFailed(String),

    #[error("rate limited")]
    RateLimited,

    #[error("connection closed")]
    Closed,

    #[error("too many consecutive errors")]
    TooManyConsecutiveErrors,
}

/// Errors surfaced from an outbound RPC call into an agent.
#[derive(Debug, Error, Clone)]
pub enum OutboundCallError {
    #[error("agent not connected: {0}")]
    NotConnected(String),

    #[error("call timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("agent returned an error: {code} {message}")]
    Remote { code: i64, message: String },

    #[error("connection closed before a response arrived")]
    ConnectionClosed,
}

/// Errors from the token rotation engine's per-candidate handling.
#[derive(Debug, Error)]
pub enum RotationError {
    #[error("agent not found: {0}")]
    AgentNotFound(String),

    #[error("agent not connected: {0}")]
    AgentNotConnected(String),

    #[error("failed to initiate rotation")]
    InitFailed(#[source] fleetd_storage::StorageError),

    #[error("failed to deliver rotate_token call: {0}")]
    SendFailed(#[source] OutboundCallError),
}

/// Top-level daemon error, used by the binary entrypoint.
#[derive(Debug, Error)]
pub enum DaemonError {
    #[error(transparent)]
    Storage(#[from] fleetd_storage::StorageError),

    #[error(transparent)]
    Core(#[from] fleetd_core::CoreError),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}
