use super::*;
use chrono::TimeZone;
use fleetd_core::{AgentConfig, FakeClock, ServerId};
use serde_json::json;

fn fixed_now() -> chrono::DateTime<chrono::Utc> {
    chrono::Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()
}

#[tokio::test]
async fn a_heartbeat_notification_stashes_the_resource_sample() {
    let cache = HeartbeatCache::new();
    let handler = HeartbeatHandler::new(cache.clone());

    let params = json!({
        "agent_id": "agent-1",
        "timestamp": fixed_now(),
        "cpu_percent": 12.5,
        "memory_percent": 40.0,
        "uptime_seconds": 3600,
    });

    let result = handler.call("agent-1", Some(params)).await;
    assert!(result.is_ok());

    let stashed = cache.latest("agent-1").expect("sample stashed");
    assert_eq!(stashed.cpu_percent, Some(12.5));
    assert_eq!(stashed.uptime_seconds, Some(3600));
}

#[tokio::test]
async fn missing_params_is_an_invalid_request() {
    let handler = HeartbeatHandler::new(HeartbeatCache::new());
    let result = handler.call("agent-1", None).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn malformed_params_is_an_invalid_request() {
    let handler = HeartbeatHandler::new(HeartbeatCache::new());
    let result = handler.call("agent-1", Some(json!({"nonsense": true}))).await;
    assert!(result.is_err());
}

#[test]
fn latest_is_none_before_any_heartbeat_arrives() {
    let cache = HeartbeatCache::new();
    assert!(cache.latest("never-seen").is_none());
}

#[tokio::test]
async fn ping_reports_status_version_and_agent_id() {
    let handler = PingHandler::new("9.9.9");
    let result = handler.call("agent-7", None).await.unwrap();
    assert_eq!(result["status"], "ok");
    assert_eq!(result["version"], "9.9.9");
    assert_eq!(result["agent_id"], "agent-7");
}

#[tokio::test]
async fn shutdown_notice_marks_the_agent_disconnected_immediately() {
    let pool = fleetd_storage::connect_in_memory().await.unwrap();
    let storage = AgentRepository::new(pool);
    let now = fixed_now();
    let agent = storage
        .create_agent(&ServerId::new("s1"), AgentConfig::default(), now)
        .await
        .unwrap();
    storage
        .set_status(&agent.id, AgentStatus::Connected, now)
        .await
        .unwrap();

    let handler = ShutdownHandler::new(storage.clone(), FakeClock::new(now));
    let result = handler
        .call(agent.id.as_str(), Some(json!({"reason": "operator_request", "restart": true})))
        .await;
    assert!(result.is_ok());

    let reloaded = storage.find_by_id(&agent.id).await.unwrap().unwrap();
    assert_eq!(reloaded.status, AgentStatus::Disconnected);
}

#[tokio::test]
async fn shutdown_notice_defaults_reason_when_params_absent() {
    let pool = fleetd_storage::connect_in_memory().await.unwrap();
    let storage = AgentRepository::new(pool);
    let now = fixed_now();
    let agent = storage
        .create_agent(&ServerId::new("s2"), AgentConfig::default(), now)
        .await
        .unwrap();

    let handler = ShutdownHandler::new(storage.clone(), FakeClock::new(now));
    assert!(handler.call(agent.id.as_str(), None).await.is_ok());

    let reloaded = storage.find_by_id(&agent.id).await.unwrap().unwrap();
    assert_eq!(reloaded.status, AgentStatus::Disconnected);
}
