// SPDX-License-Identifier: MIT

//! `fleetd` — the agent control plane daemon binary.

use clap::Parser;
use fleetd_core::{Permission, SystemClock};
use fleetd_daemon::config::Cli;
use fleetd_daemon::error::DaemonError;
use fleetd_daemon::methods::{HeartbeatCache, HeartbeatHandler, PingHandler, ShutdownHandler};
use fleetd_daemon::{Service, SshFallback};
use fleetd_protocol::MethodTable;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(cli.log_filter.as_str())
        .compact()
        .init();

    if let Err(e) = run(cli).await {
        error!("fleetd exited with an error: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), DaemonError> {
    info!(version = env!("CARGO_PKG_VERSION"), "fleetd starting");

    let pool = fleetd_storage::connect(&cli.db_path).await?;
    let storage = fleetd_storage::AgentRepository::new(pool.clone());

    let mut methods = MethodTable::new();
    methods.register(
        "agent.heartbeat",
        Permission::Read,
        Box::new(HeartbeatHandler::new(HeartbeatCache::new())),
    );
    methods.register(
        "agent.ping",
        Permission::Read,
        Box::new(PingHandler::new(env!("CARGO_PKG_VERSION"))),
    );
    methods.register(
        "agent.shutdown",
        Permission::Write,
        Box::new(ShutdownHandler::new(storage, SystemClock)),
    );

    let shutdown = CancellationToken::new();

    let service = Service::build(
        pool,
        &cli.bind_addr,
        cli.tuning,
        SystemClock,
        methods,
        Arc::new(SshFallback::new()),
        shutdown.clone(),
    )
    .await?;

    let local_addr = service
        .local_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| cli.bind_addr.clone());
    info!(addr = %local_addr, "listening for agent connections");

    let shutdown_signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("received shutdown signal");
            shutdown_signal.cancel();
        }
    });

    service.run().await;

    info!("fleetd stopped");
    Ok(())
}
