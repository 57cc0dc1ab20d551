use super::*;
use chrono::TimeZone;

fn sample_agent(status: AgentStatus, last_seen: Option<DateTime<Utc>>) -> Agent {
    let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
    Agent {
        id: AgentId::new("a1"),
        server_id: ServerId::new("s1"),
        status,
        token_hash: "hash".to_string(),
        pending_token_hash: None,
        token_issued_at: Some(now),
        token_expires_at: Some(now + chrono::Duration::days(30)),
        version: Some("1.0.0".to_string()),
        last_seen,
        registered_at: now,
        config: AgentConfig::default(),
        created_at: now,
        updated_at: now,
    }
}

#[test]
fn default_config_is_valid() {
    assert!(AgentConfig::default().validate().is_ok());
}

#[test]
fn config_rejects_out_of_range_heartbeat_interval() {
    let mut config = AgentConfig::default();
    config.heartbeat_interval_seconds = 5;
    let err = config.validate().unwrap_err();
    assert!(matches!(err, CoreError::ConfigOutOfRange { field, .. } if field == "heartbeat_interval_seconds"));
}

#[test]
fn not_stale_when_disconnected() {
    let agent = sample_agent(AgentStatus::Disconnected, None);
    assert!(!agent.is_stale(Utc::now()));
}

#[test]
fn stale_when_connected_past_heartbeat_timeout() {
    let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
    let agent = sample_agent(AgentStatus::Connected, Some(now));
    let later = now + chrono::Duration::seconds(91);
    assert!(agent.is_stale(later));
}

#[test]
fn not_stale_within_heartbeat_timeout() {
    let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
    let agent = sample_agent(AgentStatus::Connected, Some(now));
    let later = now + chrono::Duration::seconds(10);
    assert!(!agent.is_stale(later));
}

#[test]
fn is_rotating_reflects_pending_token() {
    let mut agent = sample_agent(AgentStatus::Connected, Some(Utc::now()));
    assert!(!agent.is_rotating());
    agent.pending_token_hash = Some("new-hash".to_string());
    assert!(agent.is_rotating());
}

#[test]
fn status_display_matches_persisted_strings() {
    assert_eq!(AgentStatus::Pending.to_string(), "PENDING");
    assert_eq!(AgentStatus::Connected.to_string(), "CONNECTED");
    assert_eq!(AgentStatus::Disconnected.to_string(), "DISCONNECTED");
    assert_eq!(AgentStatus::Updating.to_string(), "UPDATING");
}

#[test]
fn status_from_str_round_trips_with_display() {
    use std::str::FromStr;
    for status in [
        AgentStatus::Pending,
        AgentStatus::Connected,
        AgentStatus::Disconnected,
        AgentStatus::Updating,
    ] {
        let parsed = AgentStatus::from_str(&status.to_string()).unwrap();
        assert_eq!(parsed, status);
    }
}

#[test]
fn status_from_str_rejects_unknown_value() {
    use std::str::FromStr;
    assert!(matches!(
        AgentStatus::from_str("SLEEPING"),
        Err(CoreError::InvalidStatus(_))
    ));
}
