// SPDX-License-Identifier: MIT

//! The first frame exchanged on a new connection, before any JSON-RPC
//! traffic is accepted.

use fleetd_core::AgentConfig;
use serde::{Deserialize, Serialize};

/// First frame sent by a connecting agent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum ClientHello {
    /// Redeem a one-time registration code for a brand new token.
    #[serde(rename = "register")]
    Register { code: String, version: String },

    /// Reconnect using a previously issued (or mid-rotation pending) token.
    #[serde(rename = "authenticate")]
    Authenticate { token: String, version: String },
}

/// Server's reply to a successful `register` handshake.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename = "registered")]
pub struct Registered {
    pub agent_id: String,
    pub token: String,
    pub config: AgentConfig,
}

/// Server's reply to a successful `authenticate` handshake.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename = "authenticated")]
pub struct Authenticated {
    pub agent_id: String,
    pub config: AgentConfig,
}

/// Server's reply to a failed handshake, sent immediately before closing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename = "error")]
pub struct HandshakeError {
    pub error: String,
}

impl HandshakeError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            error: reason.into(),
        }
    }
}

#[cfg(test)]
#[path = "handshake_tests.rs"]
mod tests;
