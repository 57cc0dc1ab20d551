// SPDX-License-Identifier: MIT

//! Startup reconciliation and the periodic staleness sweep (C4).
//!
//! On startup every agent left `CONNECTED` from a previous process lifetime
//! is reset to `DISCONNECTED` — a lost connection never survives a daemon
//! restart. Afterward a background task periodically finds agents that
//! claim to be connected but have gone quiet past their own heartbeat
//! timeout, and marks them disconnected too.

use crate::registry::AgentRegistry;
use fleetd_core::Clock;
use fleetd_storage::{AgentRepository, StorageError};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Reset every agent left `CONNECTED` by a prior process lifetime. Must run
/// before the listener starts accepting connections.
pub async fn reconcile_on_startup<C: Clock>(
    storage: &AgentRepository,
    clock: &C,
) -> Result<u64, StorageError> {
    let reset = storage.reset_stale_connected(clock.now()).await?;
    if reset > 0 {
        info!(reset, "reset stale CONNECTED agents at startup");
    }
    Ok(reset)
}

/// Spawn the periodic staleness sweep. Agents reporting `CONNECTED` but
/// silent past their own heartbeat timeout are marked `DISCONNECTED` and
/// dropped from the registry, so a genuinely dead connection can't wedge an
/// agent in a phantom-connected state forever.
pub fn spawn_staleness_sweep<C: Clock>(
    storage: AgentRepository,
    registry: AgentRegistry,
    clock: C,
    interval: Duration,
    shutdown: CancellationToken,
) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => return,
                _ = ticker.tick() => {}
            }
            sweep_once(&storage, &registry, &clock).await;
        }
    });
}

async fn sweep_once<C: Clock>(storage: &AgentRepository, registry: &AgentRegistry, clock: &C) {
    let now = clock.now();
    let connected = match storage.list_connected().await {
        Ok(agents) => agents,
        Err(e) => {
            warn!("staleness sweep: failed to list connected agents: {e}");
            return;
        }
    };

    for agent in connected {
        if !agent.is_stale(now) {
            continue;
        }
        warn!(agent_id = %agent.id, "agent stale past heartbeat timeout, marking disconnected");
        if let Some(handle) = registry.get(&agent.id) {
            handle.fail_all_pending();
            registry.unregister(&agent.id, &handle);
        }
        if let Err(e) = storage
            .set_status(&agent.id, fleetd_core::AgentStatus::Disconnected, now)
            .await
        {
            warn!(agent_id = %agent.id, "failed to mark stale agent disconnected: {e}");
        }
    }
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
