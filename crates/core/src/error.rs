// SPDX-License-Identifier: MIT

//! Error taxonomy shared by every layer of the core.

use thiserror::Error;

/// Errors that originate from domain-level validation, independent of any
/// transport or storage concern.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("agent config field `{field}` out of range: {value} not in [{min}, {max}]")]
    ConfigOutOfRange {
        field: &'static str,
        value: i64,
        min: i64,
        max: i64,
    },

    #[error("registration code already used")]
    RegistrationCodeUsed,

    #[error("registration code expired")]
    RegistrationCodeExpired,

    #[error("agent not found: {0}")]
    AgentNotFound(String),

    #[error("agent not connected: {0}")]
    AgentNotConnected(String),

    #[error("unrecognized agent status: {0}")]
    InvalidStatus(String),
}
