// SPDX-License-Identifier: MIT

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! fleetd-storage: the SQLite-backed persistence layer for the two tables
//! the agent control plane owns outright.

pub mod agents;
pub mod db;
pub mod error;

pub use agents::AgentRepository;
pub use db::{connect, connect_in_memory};
pub use error::StorageError;
