use super::*;
use chrono::TimeZone;
use fleetd_core::{AgentConfig, AgentStatus, FakeClock, ServerId};

fn fixed_now() -> chrono::DateTime<chrono::Utc> {
    chrono::Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()
}

#[tokio::test]
async fn reconcile_on_startup_resets_connected_agents() {
    let pool = fleetd_storage::connect_in_memory().await.unwrap();
    let storage = AgentRepository::new(pool);
    let now = fixed_now();

    let agent = storage
        .create_agent(&ServerId::new("host-1"), AgentConfig::default(), now)
        .await
        .unwrap();
    storage.mark_authenticated(&agent.id, "1.0.0", now).await.unwrap();

    let clock = FakeClock::new(now);
    let reset = reconcile_on_startup(&storage, &clock).await.unwrap();
    assert_eq!(reset, 1);

    let reloaded = storage.find_by_id(&agent.id).await.unwrap().unwrap();
    assert_eq!(reloaded.status, AgentStatus::Disconnected);
}

#[tokio::test]
async fn reconcile_on_startup_is_a_noop_with_nothing_connected() {
    let pool = fleetd_storage::connect_in_memory().await.unwrap();
    let storage = AgentRepository::new(pool);
    let clock = FakeClock::new(fixed_now());
    let reset = reconcile_on_startup(&storage, &clock).await.unwrap();
    assert_eq!(reset, 0);
}

#[tokio::test]
async fn staleness_sweep_disconnects_an_agent_past_its_heartbeat_timeout() {
    let pool = fleetd_storage::connect_in_memory().await.unwrap();
    let storage = AgentRepository::new(pool);
    let registry = AgentRegistry::new();
    let now = fixed_now();

    let config = AgentConfig {
        heartbeat_timeout_seconds: 90,
        ..AgentConfig::default()
    };
    let agent = storage
        .create_agent(&ServerId::new("host-2"), config, now)
        .await
        .unwrap();
    storage.mark_authenticated(&agent.id, "1.0.0", now).await.unwrap();

    let clock = FakeClock::new(now);
    clock.advance(chrono::Duration::seconds(200));
    sweep_once(&storage, &registry, &clock).await;

    let reloaded = storage.find_by_id(&agent.id).await.unwrap().unwrap();
    assert_eq!(reloaded.status, AgentStatus::Disconnected);
}

#[tokio::test]
async fn staleness_sweep_leaves_a_fresh_heartbeat_alone() {
    let pool = fleetd_storage::connect_in_memory().await.unwrap();
    let storage = AgentRepository::new(pool);
    let registry = AgentRegistry::new();
    let now = fixed_now();

    let config = AgentConfig {
        heartbeat_timeout_seconds: 90,
        ..AgentConfig::default()
    };
    let agent = storage
        .create_agent(&ServerId::new("host-3"), config, now)
        .await
        .unwrap();
    storage.mark_authenticated(&agent.id, "1.0.0", now).await.unwrap();

    let clock = FakeClock::new(now);
    clock.advance(chrono::Duration::seconds(10));
    sweep_once(&storage, &registry, &clock).await;

    let reloaded = storage.find_by_id(&agent.id).await.unwrap().unwrap();
    assert_eq!(reloaded.status, AgentStatus::Connected);
}
