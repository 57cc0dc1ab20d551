// SPDX-License-Identifier: MIT

//! Wires C1-C6 together into one running daemon. Everything here is built
//! from dependency-injected components rather than process-wide globals, so
//! a test can stand up the same graph against an in-memory database.

use crate::config::Tuning;
use crate::error::DaemonError;
use crate::lifecycle::{reconcile_on_startup, spawn_staleness_sweep};
use crate::listener::{ListenCtx, Listener};
use crate::rate_limit::{ConnectionRateLimiter, RateLimitConfig};
use crate::registry::AgentRegistry;
use crate::router::{CommandRouter, FallbackExecutor};
use crate::rotation::{spawn_rotation_sweep, RotationTuning};
use fleetd_core::{Clock, SystemClock};
use fleetd_protocol::MethodTable;
use fleetd_storage::AgentRepository;
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// A fully wired daemon, ready to run its listener and background tasks.
pub struct Service<C: Clock = SystemClock> {
    listener: Listener<C>,
    storage: AgentRepository,
    registry: AgentRegistry,
    rate_limiter: Arc<ConnectionRateLimiter>,
    clock: C,
    tuning: Tuning,
    shutdown: CancellationToken,
    pub router: Arc<CommandRouter>,
}

impl<C: Clock> Service<C> {
    /// Assemble every component against an already-open database pool.
    /// Runs startup reconciliation before returning.
    pub async fn build(
        pool: SqlitePool,
        bind_addr: &str,
        tuning: Tuning,
        clock: C,
        methods: MethodTable,
        fallback: Arc<dyn FallbackExecutor>,
        shutdown: CancellationToken,
    ) -> Result<Self, DaemonError> {
        let storage = AgentRepository::new(pool);
        let registry = AgentRegistry::new();

        reconcile_on_startup(&storage, &clock).await?;

        let rate_limiter = Arc::new(ConnectionRateLimiter::new(RateLimitConfig {
            max_attempts: tuning.rate_limit_max_attempts,
            window: tuning.rate_limit_window(),
            base_block: tuning.rate_limit_base_block(),
            max_block: tuning.rate_limit_max_block(),
        }));

        let listen_ctx = Arc::new(ListenCtx {
            storage: storage.clone(),
            registry: registry.clone(),
            methods: Arc::new(methods),
            rate_limiter: rate_limiter.clone(),
            clock: clock.clone(),
            token_validity: tuning.token_validity(),
            max_consecutive_errors: tuning.max_consecutive_errors,
        });

        let listener = Listener::bind(bind_addr, listen_ctx)
            .await
            .map_err(|source| DaemonError::Bind {
                addr: bind_addr.to_string(),
                source,
            })?;

        let router = Arc::new(CommandRouter::new(storage.clone(), registry.clone(), fallback));

        Ok(Self {
            listener,
            storage,
            registry,
            rate_limiter,
            clock,
            tuning,
            shutdown,
            router,
        })
    }

    /// The address the listener is actually bound to, useful when `build`
    /// was given a `:0` port.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.listener.local_addr()
    }

    /// Run the listener and every background task until `shutdown` fires.
    pub async fn run(self) {
        spawn_staleness_sweep(
            self.storage.clone(),
            self.registry.clone(),
            self.clock.clone(),
            self.tuning.heartbeat_timeout(),
            self.shutdown.clone(),
        );

        spawn_rotation_sweep(
            self.storage.clone(),
            self.registry.clone(),
            self.clock.clone(),
            RotationTuning {
                check_interval: self.tuning.rotation_check_interval(),
                advance_window: self.tuning.rotation_advance_window(),
                grace_period: self.tuning.rotation_grace_period(),
                token_validity: self.tuning.token_validity(),
                call_timeout: Duration::from_secs(30),
            },
            self.shutdown.clone(),
        );

        let rate_limiter_cleanup = self.rate_limiter.clone();
        let cleanup_clock = self.clock.clone();
        let cleanup_interval = self.tuning.rate_limit_window();
        let cleanup_shutdown = self.shutdown.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(cleanup_interval);
            loop {
                tokio::select! {
                    _ = cleanup_shutdown.cancelled() => return,
                    _ = ticker.tick() => {}
                }
                rate_limiter_cleanup.cleanup_expired(cleanup_clock.now());
            }
        });

        info!("fleetd daemon ready");
        self.listener.run(self.shutdown).await;
    }
}

#[cfg(test)]
#[path = "service_tests.rs"]
mod tests;
