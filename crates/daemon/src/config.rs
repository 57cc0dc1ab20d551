// SPDX-License-Identifier: MIT

//! Process configuration: CLI flags (via `clap`) layered over environment
//! variables, all with the defaults from the Configuration table.

use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Parser)]
#[command(name = "fleetd", version, about = "Agent control plane daemon")]
pub struct Cli {
    /// Path to the SQLite database file.
    #[arg(long, env = "FLEETD_DB_PATH", default_value = "fleetd.sqlite3")]
    pub db_path: PathBuf,

    /// Address to bind the WebSocket listener to.
    #[arg(long, env = "FLEETD_BIND_ADDR", default_value = "0.0.0.0:7443")]
    pub bind_addr: String,

    /// Log filter directive passed to `tracing_subscriber::EnvFilter`.
    #[arg(long, env = "FLEETD_LOG", default_value = "info")]
    pub log_filter: String,

    #[command(flatten)]
    pub tuning: Tuning,
}

/// The tunables from the Configuration table, each independently
/// overridable via its own `FLEETD_*` environment variable.
#[derive(Debug, Clone, Copy, Parser)]
pub struct Tuning {
    #[arg(long, env = "FLEETD_HEARTBEAT_INTERVAL_SECONDS", default_value_t = 30)]
    pub heartbeat_interval_seconds: u64,

    #[arg(long, env = "FLEETD_HEARTBEAT_TIMEOUT_SECONDS", default_value_t = 90)]
    pub heartbeat_timeout_seconds: u64,

    #[arg(long, env = "FLEETD_RATE_LIMIT_MAX_ATTEMPTS", default_value_t = 5)]
    pub rate_limit_max_attempts: u32,

    #[arg(long, env = "FLEETD_RATE_LIMIT_WINDOW_SECONDS", default_value_t = 60)]
    pub rate_limit_window_seconds: u64,

    #[arg(long, env = "FLEETD_RATE_LIMIT_BASE_BLOCK_SECONDS", default_value_t = 30)]
    pub rate_limit_base_block_seconds: u64,

    #[arg(long, env = "FLEETD_RATE_LIMIT_MAX_BLOCK_SECONDS", default_value_t = 3600)]
    pub rate_limit_max_block_seconds: u64,

    #[arg(long, env = "FLEETD_MAX_CONSECUTIVE_ERRORS", default_value_t = 5)]
    pub max_consecutive_errors: u32,

    #[arg(long, env = "FLEETD_ROTATION_CHECK_INTERVAL_SECONDS", default_value_t = 3600)]
    pub rotation_check_interval_seconds: u64,

    #[arg(long, env = "FLEETD_ROTATION_ADVANCE_WINDOW_SECONDS", default_value_t = 86400)]
    pub rotation_advance_window_seconds: u64,

    #[arg(long, env = "FLEETD_ROTATION_GRACE_PERIOD_SECONDS", default_value_t = 300)]
    pub rotation_grace_period_seconds: u64,

    /// Validity period of a freshly issued token, i.e. how far out
    /// `token_expires_at` is set on registration or promotion.
    #[arg(long, env = "FLEETD_TOKEN_VALIDITY_SECONDS", default_value_t = 30 * 24 * 3600)]
    pub token_validity_seconds: u64,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            heartbeat_interval_seconds: 30,
            heartbeat_timeout_seconds: 90,
            rate_limit_max_attempts: 5,
            rate_limit_window_seconds: 60,
            rate_limit_base_block_seconds: 30,
            rate_limit_max_block_seconds: 3600,
            max_consecutive_errors: 5,
            rotation_check_interval_seconds: 3600,
            rotation_advance_window_seconds: 86400,
            rotation_grace_period_seconds: 300,
            token_validity_seconds: 30 * 24 * 3600,
        }
    }
}

impl Tuning {
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_seconds)
    }

    pub fn heartbeat_timeout(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.heartbeat_timeout_seconds as i64)
    }

    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_secs(self.rate_limit_window_seconds)
    }

    pub fn rate_limit_base_block(&self) -> Duration {
        Duration::from_secs(self.rate_limit_base_block_seconds)
    }

    pub fn rate_limit_max_block(&self) -> Duration {
        Duration::from_secs(self.rate_limit_max_block_seconds)
    }

    pub fn rotation_check_interval(&self) -> Duration {
        Duration::from_secs(self.rotation_check_interval_seconds)
    }

    pub fn rotation_advance_window(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.rotation_advance_window_seconds as i64)
    }

    pub fn rotation_grace_period(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.rotation_grace_period_seconds as i64)
    }

    pub fn token_validity(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.token_validity_seconds as i64)
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
