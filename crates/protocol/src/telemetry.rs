// SPDX-License-Identifier: MIT

//! Payload shapes for the handful of non-handshake methods that carry
//! structured data in both directions.

use serde::{Deserialize, Serialize};

/// Body of an `agent.heartbeat` notification.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentHeartbeat {
    pub agent_id: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu_percent: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_percent: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uptime_seconds: Option<u64>,
}

/// Params of an `agent.update` call, carried through from an external
/// version catalog collaborator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentVersionInfo {
    pub current_version: String,
    pub latest_version: String,
    pub update_available: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_url: Option<String>,
}

/// Params of an `agent.rotate_token` call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RotateTokenParams {
    pub new_token: String,
    pub grace_period_seconds: u64,
}

/// Params of an agent-initiated `agent.shutdown` notice.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentShutdownNotice {
    #[serde(default = "default_shutdown_reason")]
    pub reason: String,
    #[serde(default)]
    pub restart: bool,
}

fn default_shutdown_reason() -> String {
    "user_request".to_string()
}

#[cfg(test)]
#[path = "telemetry_tests.rs"]
mod tests;
