// SPDX-License-Identifier: MIT

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! fleetd-protocol: the wire contract between the server and an agent
//! daemon — handshake frames and JSON-RPC 2.0 envelopes over a persistent
//! duplex connection.

pub mod handshake;
pub mod methods;
pub mod rpc;
pub mod telemetry;

pub use handshake::{Authenticated, ClientHello, HandshakeError, Registered};
pub use methods::{MethodCall, MethodHandler, MethodTable};
pub use rpc::{error_code, Frame, RpcError, RpcRequest, RpcResponse};
pub use telemetry::{AgentHeartbeat, AgentShutdownNotice, AgentVersionInfo, RotateTokenParams};
