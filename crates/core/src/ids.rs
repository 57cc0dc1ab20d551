// SPDX-License-Identifier: MIT

//! Identifier newtypes for the agent control plane.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl PartialEq<str> for $name {
            fn eq(&self, other: &str) -> bool {
                self.0 == other
            }
        }

        impl PartialEq<&str> for $name {
            fn eq(&self, other: &&str) -> bool {
                self.0 == *other
            }
        }

        impl Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }
    };
}

/// Identifies a registered agent, independent of the host it runs on.
id_newtype!(AgentId);

/// Identifies the managed host a single agent is bound to. 1:1 with `AgentId`.
id_newtype!(ServerId);

/// Identifies a single-use enrollment ticket.
id_newtype!(RegistrationCodeId);

/// Correlates an outbound JSON-RPC request with its eventual response, scoped
/// to one agent connection.
id_newtype!(RequestId);

#[cfg(test)]
#[path = "ids_tests.rs"]
mod tests;
