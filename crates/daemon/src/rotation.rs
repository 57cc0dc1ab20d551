// SPDX-License-Identifier: MIT

//! Token rotation engine (C5): periodically finds agents whose token is
//! nearing expiry and walks them through the rotate/promote handshake.
//!
//! One candidate's rotation never blocks another's — each is driven
//! independently and a failure on one is logged and skipped.

use crate::error::RotationError;
use crate::registry::AgentRegistry;
use fleetd_core::{generate_token, hash_token, AgentId, Clock};
use fleetd_protocol::RotateTokenParams;
use fleetd_storage::AgentRepository;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Tunables the rotation sweep needs, independent of [`crate::config::Tuning`]
/// so the sweep logic can be unit tested without pulling in `clap`.
#[derive(Debug, Clone, Copy)]
pub struct RotationTuning {
    pub check_interval: Duration,
    pub advance_window: chrono::Duration,
    pub grace_period: chrono::Duration,
    pub token_validity: chrono::Duration,
    pub call_timeout: Duration,
}

/// Spawn the periodic rotation sweep.
pub fn spawn_rotation_sweep<C: Clock>(
    storage: AgentRepository,
    registry: AgentRegistry,
    clock: C,
    tuning: RotationTuning,
    shutdown: CancellationToken,
) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(tuning.check_interval);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => return,
                _ = ticker.tick() => {}
            }
            sweep_once(&storage, &registry, &clock, &tuning).await;
        }
    });
}

async fn sweep_once<C: Clock>(
    storage: &AgentRepository,
    registry: &AgentRegistry,
    clock: &C,
    tuning: &RotationTuning,
) {
    let now = clock.now();
    let candidates = match storage
        .list_rotation_candidates(now, tuning.advance_window)
        .await
    {
        Ok(candidates) => candidates,
        Err(e) => {
            warn!("rotation sweep: failed to list candidates: {e}");
            return;
        }
    };

    for agent_id in candidates.into_iter().map(|a| a.id) {
        // Offline agents are skipped outright, not merely deferred: there is
        // no connection to deliver `agent.rotate_token` over, and initiating
        // a rotation server-side would leave `pending_token_hash` set with
        // nobody to promote it.
        if !registry.is_connected(&agent_id) {
            continue;
        }
        match rotate_one(storage, registry, &agent_id, now, tuning).await {
            Ok(()) => info!(%agent_id, "token rotation initiated"),
            Err(e) => warn!(%agent_id, "token rotation failed: {e}"),
        }
    }
}

async fn rotate_one(
    storage: &AgentRepository,
    registry: &AgentRegistry,
    agent_id: &AgentId,
    now: chrono::DateTime<chrono::Utc>,
    tuning: &RotationTuning,
) -> Result<(), RotationError> {
    let new_token = generate_token();
    let new_hash = hash_token(&new_token);

    let won = storage
        .begin_rotation(agent_id, &new_hash)
        .await
        .map_err(RotationError::InitFailed)?;
    if !won {
        // Another sweep (or an earlier pass) already has a rotation in
        // flight for this agent; nothing to do.
        return Ok(());
    }

    let params = RotateTokenParams {
        new_token,
        grace_period_seconds: tuning.grace_period.num_seconds().max(0) as u64,
    };
    let params_json = serde_json::to_value(&params).unwrap_or(Value::Null);

    let send_result = registry
        .send_request(
            agent_id,
            "agent.rotate_token",
            Some(params_json),
            tuning.call_timeout,
        )
        .await;

    match send_result {
        Ok(_) => {
            schedule_promotion(storage.clone(), agent_id.clone(), now, *tuning);
            Ok(())
        }
        Err(e) => {
            let _ = storage.cancel_rotation(agent_id).await;
            Err(RotationError::SendFailed(e))
        }
    }
}

/// The agent accepts the new token immediately but the server must keep
/// honoring the old one for `grace_period` in case in-flight frames still
/// carry it; promotion happens once that window elapses.
fn schedule_promotion(
    storage: AgentRepository,
    agent_id: AgentId,
    rotated_at: chrono::DateTime<chrono::Utc>,
    tuning: RotationTuning,
) {
    let grace = tuning
        .grace_period
        .to_std()
        .unwrap_or(Duration::from_secs(300));
    let new_expires_at = rotated_at + tuning.token_validity;
    tokio::spawn(async move {
        tokio::time::sleep(grace).await;
        let now = rotated_at + chrono::Duration::from_std(grace).unwrap_or_default();
        if let Err(e) = storage
            .promote_pending_token(&agent_id, new_expires_at, now)
            .await
        {
            warn!(%agent_id, "failed to promote pending token: {e}");
        }
    });
}

#[cfg(test)]
#[path = "rotation_tests.rs"]
mod tests;
