// SPDX-License-Identifier: MIT

//! Types returned and consumed by the command router.

use serde::{Deserialize, Serialize};

/// Which execution path actually produced a `CommandResult`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommandMethod {
    /// Routed to the agent over its JSON-RPC connection.
    Agent,
    /// Fell back to the side-channel executor (e.g. SSH).
    Ssh,
    /// Neither path was attempted or available.
    None,
}

crate::simple_display! {
    CommandMethod {
        Agent => "agent",
        Ssh => "ssh",
        None => "none",
    }
}

/// Caller-selected routing policy for a single command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Policy {
    /// Use the agent if connected, otherwise fall back.
    #[default]
    PreferAgent,
    /// Use the agent only; fail rather than fall back.
    ForceAgent,
    /// Skip the agent entirely and use the fallback path.
    ForceFallback,
}

/// Uniform result of routing one command, regardless of which path ran it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandResult {
    pub success: bool,
    pub output: String,
    pub error: Option<String>,
    pub exit_code: Option<i32>,
    pub method: CommandMethod,
    pub execution_time_ms: f64,
}

impl CommandResult {
    pub fn failure(method: CommandMethod, error: impl Into<String>, elapsed_ms: f64) -> Self {
        Self {
            success: false,
            output: String::new(),
            error: Some(error.into()),
            exit_code: None,
            method,
            execution_time_ms: elapsed_ms,
        }
    }
}

#[cfg(test)]
#[path = "command_tests.rs"]
mod tests;
