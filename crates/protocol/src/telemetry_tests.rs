use super::*;
use serde_json::json;

#[test]
fn heartbeat_without_optional_samples_round_trips() {
    let value = json!({"agent_id": "a1", "timestamp": "2026-01-01T00:00:00Z"});
    let heartbeat: AgentHeartbeat = serde_json::from_value(value).unwrap();
    assert_eq!(heartbeat.agent_id, "a1");
    assert!(heartbeat.cpu_percent.is_none());
}

#[test]
fn shutdown_notice_defaults_reason_and_restart() {
    let notice: AgentShutdownNotice = serde_json::from_value(json!({})).unwrap();
    assert_eq!(notice.reason, "user_request");
    assert!(!notice.restart);
}

#[test]
fn rotate_token_params_round_trip() {
    let params = RotateTokenParams {
        new_token: "new-token".to_string(),
        grace_period_seconds: 300,
    };
    let encoded = serde_json::to_string(&params).unwrap();
    let decoded: RotateTokenParams = serde_json::from_str(&encoded).unwrap();
    assert_eq!(params, decoded);
}
