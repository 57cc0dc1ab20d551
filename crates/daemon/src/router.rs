// SPDX-License-Identifier: MIT

//! Command router (C6): the single public facade the rest of the server
//! uses to run a command against a managed host, agent-first with an
//! optional side-channel fallback.

use crate::registry::AgentRegistry;
use async_trait::async_trait;
use fleetd_core::{CommandMethod, CommandResult, Policy, ServerId};
use fleetd_storage::AgentRepository;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A side channel for running a command when no agent connection is
/// available (or usable). The only production implementation is SSH;
/// tests supply a stub.
#[async_trait]
pub trait FallbackExecutor: Send + Sync {
    async fn execute(
        &self,
        server_id: &ServerId,
        command: &str,
        timeout: Duration,
    ) -> Result<String, String>;
}

/// The public command-execution facade. The only place that decides
/// agent-vs-fallback; everything downstream sees a [`CommandResult`].
pub struct CommandRouter {
    storage: AgentRepository,
    registry: AgentRegistry,
    fallback: Arc<dyn FallbackExecutor>,
}

impl CommandRouter {
    pub fn new(
        storage: AgentRepository,
        registry: AgentRegistry,
        fallback: Arc<dyn FallbackExecutor>,
    ) -> Self {
        Self {
            storage,
            registry,
            fallback,
        }
    }

    /// Run one command against `server_id`, honoring `policy`. Never raises
    /// — every path, including total failure, produces a `CommandResult`.
    pub async fn execute(
        &self,
        server_id: &ServerId,
        method: &str,
        params: Option<Value>,
        timeout: Duration,
        policy: Policy,
    ) -> CommandResult {
        let start = Instant::now();
        let result = self.execute_inner(server_id, method, params, timeout, policy).await;
        let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
        finish(result, elapsed_ms)
    }

    async fn execute_inner(
        &self,
        server_id: &ServerId,
        method: &str,
        params: Option<Value>,
        timeout: Duration,
        policy: Policy,
    ) -> Result<CommandResult, (CommandMethod, String)> {
        if policy != Policy::ForceFallback {
            match self.try_agent_path(server_id, method, params.clone(), timeout).await {
                AgentAttempt::Succeeded(result) => return Ok(result),
                AgentAttempt::Unavailable(reason) if policy == Policy::ForceAgent => {
                    return Err((CommandMethod::None, reason));
                }
                AgentAttempt::Failed(reason) if policy == Policy::ForceAgent => {
                    return Err((CommandMethod::Agent, reason));
                }
                AgentAttempt::Unavailable(_) | AgentAttempt::Failed(_) => {
                    // Fall through to the fallback path below.
                }
            }
        }

        // force_agent can never reach here — every branch above returns.
        let command = method_to_command(method, &params);
        match self.fallback.execute(server_id, &command, timeout).await {
            Ok(output) => Ok(CommandResult {
                success: true,
                output,
                error: None,
                exit_code: Some(0),
                method: CommandMethod::Ssh,
                execution_time_ms: 0.0,
            }),
            Err(reason) => Err((CommandMethod::Ssh, reason)),
        }
    }

    async fn try_agent_path(
        &self,
        server_id: &ServerId,
        method: &str,
        params: Option<Value>,
        timeout: Duration,
    ) -> AgentAttempt {
        let agent = match self.storage.find_by_server_id(server_id).await {
            Ok(Some(agent)) => agent,
            Ok(None) => return AgentAttempt::Unavailable("no agent registered for server".into()),
            Err(e) => return AgentAttempt::Unavailable(e.to_string()),
        };

        if !self.registry.is_connected(&agent.id) {
            return AgentAttempt::Unavailable(format!("agent {} not connected", agent.id));
        }

        match self
            .registry
            .send_request(&agent.id, method, params, timeout)
            .await
        {
            Ok(value) => AgentAttempt::Succeeded(normalize_agent_response(value)),
            Err(e) => AgentAttempt::Failed(e.to_string()),
        }
    }
}

enum AgentAttempt {
    Succeeded(CommandResult),
    Unavailable(String),
    Failed(String),
}

fn normalize_agent_response(value: Value) -> CommandResult {
    CommandResult {
        success: value
            .get("success")
            .and_then(Value::as_bool)
            .unwrap_or(true),
        output: value
            .get("output")
            .or_else(|| value.get("stdout"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        error: value
            .get("error")
            .or_else(|| value.get("stderr"))
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string),
        exit_code: value
            .get("exit_code")
            .and_then(Value::as_i64)
            .map(|c| c as i32),
        method: CommandMethod::Agent,
        execution_time_ms: 0.0,
    }
}

fn method_to_command(method: &str, params: &Option<Value>) -> String {
    match params.as_ref().and_then(|p| p.get("command")).and_then(Value::as_str) {
        Some(command) => command.to_string(),
        None => method.to_string(),
    }
}

fn finish(result: Result<CommandResult, (CommandMethod, String)>, elapsed_ms: f64) -> CommandResult {
    match result {
        Ok(mut result) => {
            result.execution_time_ms = elapsed_ms;
            result
        }
        Err((method, reason)) => CommandResult::failure(method, reason, elapsed_ms),
    }
}

#[cfg(test)]
#[path = "router_tests.rs"]
mod tests;
