// SPDX-License-Identifier: MIT

//! SSH-backed [`FallbackExecutor`]: the side channel the command router
//! falls back to when no agent connection is available or usable. Shells
//! out to the system `ssh` binary rather than embedding a client, so host
//! keys and credentials are whatever the invoking user's `~/.ssh/config`
//! already resolves.

use crate::router::FallbackExecutor;
use async_trait::async_trait;
use fleetd_core::ServerId;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::warn;

/// Runs `ssh <server_id> <command>`, treating `server_id` as a host alias
/// resolvable through the local SSH client configuration.
pub struct SshFallback {
    ssh_binary: String,
    extra_args: Vec<String>,
}

impl SshFallback {
    pub fn new() -> Self {
        Self {
            ssh_binary: "ssh".to_string(),
            extra_args: vec!["-o".to_string(), "BatchMode=yes".to_string()],
        }
    }
}

impl Default for SshFallback {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FallbackExecutor for SshFallback {
    async fn execute(
        &self,
        server_id: &ServerId,
        command: &str,
        timeout: Duration,
    ) -> Result<String, String> {
        let mut cmd = Command::new(&self.ssh_binary);
        cmd.args(&self.extra_args)
            .arg(server_id.as_str())
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = cmd
            .spawn()
            .map_err(|e| format!("failed to spawn ssh: {e}"))?;

        let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return Err(format!("ssh process error: {e}")),
            Err(_) => return Err(format!("ssh command timed out after {timeout:?}")),
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!(%server_id, status = ?output.status, "ssh fallback exited non-zero");
            return Err(stderr.trim().to_string());
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

#[cfg(test)]
#[path = "ssh_tests.rs"]
mod tests;
