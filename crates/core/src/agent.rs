// SPDX-License-Identifier: MIT

//! Agent record and its per-agent configuration.

use crate::error::CoreError;
use crate::ids::{AgentId, ServerId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a registered agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AgentStatus {
    /// Registered but never successfully authenticated.
    Pending,
    /// Has a live connection right now.
    Connected,
    /// No live connection; either never connected or lost one.
    Disconnected,
    /// Mid self-update; expected to drop and re-establish its connection.
    Updating,
}

crate::simple_display! {
    AgentStatus {
        Pending => "PENDING",
        Connected => "CONNECTED",
        Disconnected => "DISCONNECTED",
        Updating => "UPDATING",
    }
}

impl std::str::FromStr for AgentStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(Self::Pending),
            "CONNECTED" => Ok(Self::Connected),
            "DISCONNECTED" => Ok(Self::Disconnected),
            "UPDATING" => Ok(Self::Updating),
            other => Err(CoreError::InvalidStatus(other.to_string())),
        }
    }
}

/// Per-agent tunables, handed to the agent at registration/authentication
/// time and echoed back on every handshake response.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    pub metrics_interval_seconds: u32,
    pub health_interval_seconds: u32,
    pub reconnect_timeout_seconds: u32,
    pub heartbeat_interval_seconds: u32,
    pub heartbeat_timeout_seconds: u32,
    pub auto_update: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            metrics_interval_seconds: 30,
            health_interval_seconds: 60,
            reconnect_timeout_seconds: 30,
            heartbeat_interval_seconds: 30,
            heartbeat_timeout_seconds: 90,
            auto_update: true,
        }
    }
}

impl AgentConfig {
    /// Validate every field against the bounds the agent daemon is
    /// contractually allowed to rely on.
    pub fn validate(&self) -> Result<(), CoreError> {
        check_range(
            "metrics_interval_seconds",
            self.metrics_interval_seconds,
            5,
            300,
        )?;
        check_range(
            "health_interval_seconds",
            self.health_interval_seconds,
            10,
            600,
        )?;
        check_range(
            "reconnect_timeout_seconds",
            self.reconnect_timeout_seconds,
            5,
            120,
        )?;
        check_range(
            "heartbeat_interval_seconds",
            self.heartbeat_interval_seconds,
            10,
            120,
        )?;
        check_range(
            "heartbeat_timeout_seconds",
            self.heartbeat_timeout_seconds,
            30,
            300,
        )?;
        Ok(())
    }
}

fn check_range(field: &'static str, value: u32, min: u32, max: u32) -> Result<(), CoreError> {
    if value < min || value > max {
        return Err(CoreError::ConfigOutOfRange {
            field,
            value: value as i64,
            min: min as i64,
            max: max as i64,
        });
    }
    Ok(())
}

/// A registered remote agent daemon.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub id: AgentId,
    pub server_id: ServerId,
    pub status: AgentStatus,
    pub token_hash: String,
    pub pending_token_hash: Option<String>,
    pub token_issued_at: Option<DateTime<Utc>>,
    pub token_expires_at: Option<DateTime<Utc>>,
    pub version: Option<String>,
    pub last_seen: Option<DateTime<Utc>>,
    pub registered_at: DateTime<Utc>,
    pub config: AgentConfig,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Agent {
    /// Whether this agent is in the middle of a token rotation.
    pub fn is_rotating(&self) -> bool {
        self.pending_token_hash.is_some()
    }

    /// A computed freshness flag for API consumers: connected but silent for
    /// longer than its own heartbeat timeout says it should ever go.
    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        if self.status != AgentStatus::Connected {
            return false;
        }
        match self.last_seen {
            Some(last_seen) => {
                let timeout = chrono::Duration::seconds(self.config.heartbeat_timeout_seconds as i64);
                now - last_seen > timeout
            }
            None => true,
        }
    }
}

#[cfg(test)]
#[path = "agent_tests.rs"]
mod tests;
