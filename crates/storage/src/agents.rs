// SPDX-License-Identifier: MIT

//! Persistence for the two tables this core owns: `agents` and
//! `agent_registration_codes`.

use crate::error::StorageError;
use chrono::{DateTime, Utc};
use fleetd_core::{Agent, AgentConfig, AgentId, AgentStatus, RegistrationCode, RegistrationCodeId, ServerId};
use sqlx::SqlitePool;
use std::str::FromStr;

#[derive(Debug, sqlx::FromRow)]
struct AgentRow {
    id: String,
    server_id: String,
    status: String,
    token_hash: String,
    pending_token_hash: Option<String>,
    token_issued_at: Option<String>,
    token_expires_at: Option<String>,
    version: Option<String>,
    last_seen: Option<String>,
    registered_at: String,
    config: String,
    created_at: String,
    updated_at: String,
}

impl TryFrom<AgentRow> for Agent {
    type Error = StorageError;

    fn try_from(row: AgentRow) -> Result<Self, Self::Error> {
        Ok(Agent {
            id: AgentId::new(row.id),
            server_id: ServerId::new(row.server_id),
            status: AgentStatus::from_str(&row.status).map_err(|e| StorageError::CorruptRow(e.to_string()))?,
            token_hash: row.token_hash,
            pending_token_hash: row.pending_token_hash,
            token_issued_at: parse_ts_opt(row.token_issued_at)?,
            token_expires_at: parse_ts_opt(row.token_expires_at)?,
            version: row.version,
            last_seen: parse_ts_opt(row.last_seen)?,
            registered_at: parse_ts(&row.registered_at)?,
            config: serde_json::from_str(&row.config)
                .map_err(|e| StorageError::CorruptRow(format!("config: {e}")))?,
            created_at: parse_ts(&row.created_at)?,
            updated_at: parse_ts(&row.updated_at)?,
        })
    }
}

fn parse_ts(s: &str) -> Result<DateTime<Utc>, StorageError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StorageError::CorruptRow(format!("timestamp `{s}`: {e}")))
}

fn parse_ts_opt(s: Option<String>) -> Result<Option<DateTime<Utc>>, StorageError> {
    s.map(|s| parse_ts(&s)).transpose()
}

/// Repository over the `agents` and `agent_registration_codes` tables.
#[derive(Clone)]
pub struct AgentRepository {
    pool: SqlitePool,
}

impl AgentRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a brand new agent record, `PENDING` with no token yet.
    pub async fn create_agent(
        &self,
        server_id: &ServerId,
        config: AgentConfig,
        now: DateTime<Utc>,
    ) -> Result<Agent, StorageError> {
        let id = AgentId::new(uuid::Uuid::new_v4().to_string());
        let config_json = serde_json::to_string(&config)
            .map_err(|e| StorageError::CorruptRow(format!("config: {e}")))?;
        let now_str = now.to_rfc3339();
        sqlx::query(
            "INSERT INTO agents
                (id, server_id, status, token_hash, pending_token_hash, registered_at, config, created_at, updated_at)
             VALUES (?, ?, 'PENDING', '', NULL, ?, ?, ?, ?)",
        )
        .bind(id.as_str())
        .bind(server_id.as_str())
        .bind(&now_str)
        .bind(&config_json)
        .bind(&now_str)
        .bind(&now_str)
        .execute(&self.pool)
        .await?;

        Ok(Agent {
            id,
            server_id: server_id.clone(),
            status: AgentStatus::Pending,
            token_hash: String::new(),
            pending_token_hash: None,
            token_issued_at: None,
            token_expires_at: None,
            version: None,
            last_seen: None,
            registered_at: now,
            config,
            created_at: now,
            updated_at: now,
        })
    }

    pub async fn create_registration_code(
        &self,
        agent_id: &AgentId,
        code: &str,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<RegistrationCode, StorageError> {
        let id = RegistrationCodeId::new(uuid::Uuid::new_v4().to_string());
        sqlx::query(
            "INSERT INTO agent_registration_codes (id, agent_id, code, expires_at, used, created_at)
             VALUES (?, ?, ?, ?, 0, ?)",
        )
        .bind(id.as_str())
        .bind(agent_id.as_str())
        .bind(code)
        .bind(expires_at.to_rfc3339())
        .bind(now.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(RegistrationCode {
            id,
            agent_id: agent_id.clone(),
            code: code.to_string(),
            expires_at,
            used: false,
            created_at: now,
        })
    }

    pub async fn find_registration_code(
        &self,
        code: &str,
    ) -> Result<Option<RegistrationCode>, StorageError> {
        #[derive(sqlx::FromRow)]
        struct Row {
            id: String,
            agent_id: String,
            code: String,
            expires_at: String,
            used: i64,
            created_at: String,
        }

        let row: Option<Row> = sqlx::query_as(
            "SELECT id, agent_id, code, expires_at, used, created_at
             FROM agent_registration_codes WHERE code = ?",
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| {
            Ok(RegistrationCode {
                id: RegistrationCodeId::new(row.id),
                agent_id: AgentId::new(row.agent_id),
                code: row.code,
                expires_at: parse_ts(&row.expires_at)?,
                used: row.used != 0,
                created_at: parse_ts(&row.created_at)?,
            })
        })
        .transpose()
    }

    /// Mark a code used, but only if it is not already used. Returns whether
    /// this call is the one that claimed it — callers must treat `false` as
    /// "someone else already redeemed this code."
    pub async fn claim_registration_code(
        &self,
        id: &RegistrationCodeId,
    ) -> Result<bool, StorageError> {
        let result = sqlx::query(
            "UPDATE agent_registration_codes SET used = 1 WHERE id = ? AND used = 0",
        )
        .bind(id.as_str())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    pub async fn find_by_id(&self, id: &AgentId) -> Result<Option<Agent>, StorageError> {
        let row: Option<AgentRow> = sqlx::query_as("SELECT * FROM agents WHERE id = ?")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?;
        row.map(Agent::try_from).transpose()
    }

    pub async fn find_by_server_id(&self, server_id: &ServerId) -> Result<Option<Agent>, StorageError> {
        let row: Option<AgentRow> = sqlx::query_as("SELECT * FROM agents WHERE server_id = ?")
            .bind(server_id.as_str())
            .fetch_optional(&self.pool)
            .await?;
        row.map(Agent::try_from).transpose()
    }

    /// Find an agent by either its current or pending token hash — the
    /// latter lets a reconnecting agent authenticate mid-rotation.
    pub async fn find_by_token_hash(&self, token_hash: &str) -> Result<Option<Agent>, StorageError> {
        let row: Option<AgentRow> = sqlx::query_as(
            "SELECT * FROM agents WHERE token_hash = ? OR pending_token_hash = ?",
        )
        .bind(token_hash)
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Agent::try_from).transpose()
    }

    /// Complete a registration handshake: bind the freshly minted token,
    /// mark connected, and set the initial expiry.
    #[allow(clippy::too_many_arguments)]
    pub async fn complete_registration(
        &self,
        agent_id: &AgentId,
        token_hash: &str,
        version: &str,
        token_expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        sqlx::query(
            "UPDATE agents
             SET token_hash = ?, pending_token_hash = NULL, status = 'CONNECTED',
                 version = ?, last_seen = ?, token_issued_at = ?, token_expires_at = ?,
                 updated_at = ?
             WHERE id = ?",
        )
        .bind(token_hash)
        .bind(version)
        .bind(now.to_rfc3339())
        .bind(now.to_rfc3339())
        .bind(token_expires_at.to_rfc3339())
        .bind(now.to_rfc3339())
        .bind(agent_id.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Mark an agent connected on a bare `authenticate` handshake (no token
    /// change).
    pub async fn mark_authenticated(
        &self,
        agent_id: &AgentId,
        version: &str,
        now: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        sqlx::query(
            "UPDATE agents SET status = 'CONNECTED', version = ?, last_seen = ?, updated_at = ?
             WHERE id = ?",
        )
        .bind(version)
        .bind(now.to_rfc3339())
        .bind(now.to_rfc3339())
        .bind(agent_id.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn touch_last_seen(&self, agent_id: &AgentId, now: DateTime<Utc>) -> Result<(), StorageError> {
        sqlx::query("UPDATE agents SET last_seen = ?, updated_at = ? WHERE id = ?")
            .bind(now.to_rfc3339())
            .bind(now.to_rfc3339())
            .bind(agent_id.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn set_status(
        &self,
        agent_id: &AgentId,
        status: AgentStatus,
        now: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        sqlx::query("UPDATE agents SET status = ?, updated_at = ? WHERE id = ?")
            .bind(status.to_string())
            .bind(now.to_rfc3339())
            .bind(agent_id.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Reset every `CONNECTED` agent to `DISCONNECTED`. Called once at
    /// startup, before accepting any connection. Returns how many were reset.
    pub async fn reset_stale_connected(&self, now: DateTime<Utc>) -> Result<u64, StorageError> {
        let result = sqlx::query(
            "UPDATE agents SET status = 'DISCONNECTED', updated_at = ? WHERE status = 'CONNECTED'",
        )
        .bind(now.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn list_connected(&self) -> Result<Vec<Agent>, StorageError> {
        let rows: Vec<AgentRow> = sqlx::query_as("SELECT * FROM agents WHERE status = 'CONNECTED'")
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(Agent::try_from).collect()
    }

    /// Agents connected with no rotation in flight whose token expires
    /// within `advance_window` of `now`.
    pub async fn list_rotation_candidates(
        &self,
        now: DateTime<Utc>,
        advance_window: chrono::Duration,
    ) -> Result<Vec<Agent>, StorageError> {
        let cutoff = (now + advance_window).to_rfc3339();
        let rows: Vec<AgentRow> = sqlx::query_as(
            "SELECT * FROM agents
             WHERE status = 'CONNECTED' AND pending_token_hash IS NULL
               AND token_expires_at IS NOT NULL AND token_expires_at <= ?",
        )
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Agent::try_from).collect()
    }

    /// Set `pending_token_hash` only if it is currently null. Returns
    /// whether this call won the race — the caller must skip delivering
    /// `agent.rotate_token` when it did not.
    pub async fn begin_rotation(
        &self,
        agent_id: &AgentId,
        pending_token_hash: &str,
    ) -> Result<bool, StorageError> {
        let result = sqlx::query(
            "UPDATE agents SET pending_token_hash = ? WHERE id = ? AND pending_token_hash IS NULL",
        )
        .bind(pending_token_hash)
        .bind(agent_id.as_str())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Promote `pending_token_hash` into `token_hash` once the grace period
    /// has elapsed.
    pub async fn promote_pending_token(
        &self,
        agent_id: &AgentId,
        new_expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        sqlx::query(
            "UPDATE agents
             SET token_hash = COALESCE(pending_token_hash, token_hash),
                 pending_token_hash = NULL,
                 token_issued_at = ?,
                 token_expires_at = ?,
                 updated_at = ?
             WHERE id = ?",
        )
        .bind(now.to_rfc3339())
        .bind(new_expires_at.to_rfc3339())
        .bind(now.to_rfc3339())
        .bind(agent_id.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Abandon an in-flight rotation, leaving the current token untouched.
    pub async fn cancel_rotation(&self, agent_id: &AgentId) -> Result<(), StorageError> {
        sqlx::query("UPDATE agents SET pending_token_hash = NULL WHERE id = ?")
            .bind(agent_id.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "agents_tests.rs"]
mod tests;
