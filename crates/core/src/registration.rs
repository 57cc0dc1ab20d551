// SPDX-License-Identifier: MIT

//! Single-use enrollment tickets.

use crate::error::CoreError;
use crate::ids::{AgentId, RegistrationCodeId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrationCode {
    pub id: RegistrationCodeId,
    pub agent_id: AgentId,
    pub code: String,
    pub expires_at: DateTime<Utc>,
    pub used: bool,
    pub created_at: DateTime<Utc>,
}

impl RegistrationCode {
    /// Check whether this code may still be redeemed, without mutating it.
    pub fn check_redeemable(&self, now: DateTime<Utc>) -> Result<(), CoreError> {
        if self.used {
            return Err(CoreError::RegistrationCodeUsed);
        }
        if self.expires_at <= now {
            return Err(CoreError::RegistrationCodeExpired);
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "registration_tests.rs"]
mod tests;
