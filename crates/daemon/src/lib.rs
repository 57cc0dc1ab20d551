// SPDX-License-Identifier: MIT

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! fleetd-daemon: the control-plane server — WebSocket listener, agent
//! registry, lifecycle and token-rotation sweeps, and the command router
//! that sits in front of the agent/SSH execution paths.

pub mod config;
pub mod error;
pub mod lifecycle;
pub mod listener;
pub mod methods;
pub mod rate_limit;
pub mod registry;
pub mod rotation;
pub mod router;
pub mod service;
pub mod ssh;

pub use config::{Cli, Tuning};
pub use error::DaemonError;
pub use registry::{AgentRegistry, CloseReason, OutboundMessage};
pub use router::{CommandRouter, FallbackExecutor};
pub use service::Service;
pub use ssh::SshFallback;
