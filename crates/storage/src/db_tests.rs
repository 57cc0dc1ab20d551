use super::*;
use crate::agents::AgentRepository;
use chrono::TimeZone;
use fleetd_core::{AgentConfig, ServerId};

fn fixed_now() -> chrono::DateTime<chrono::Utc> {
    chrono::Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()
}

#[tokio::test]
async fn connect_creates_the_database_file_and_applies_migrations() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fleetd.sqlite3");
    assert!(!path.exists());

    let pool = connect(&path).await.unwrap();
    assert!(path.exists());

    let storage = AgentRepository::new(pool);
    let agent = storage
        .create_agent(&ServerId::new("host-1"), AgentConfig::default(), fixed_now())
        .await
        .unwrap();
    assert!(storage.find_by_id(&agent.id).await.unwrap().is_some());
}

#[tokio::test]
async fn reconnecting_to_the_same_file_sees_previously_persisted_rows() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fleetd.sqlite3");

    let agent_id = {
        let pool = connect(&path).await.unwrap();
        let storage = AgentRepository::new(pool);
        storage
            .create_agent(&ServerId::new("host-1"), AgentConfig::default(), fixed_now())
            .await
            .unwrap()
            .id
    };

    let pool = connect(&path).await.unwrap();
    let storage = AgentRepository::new(pool);
    assert!(storage.find_by_id(&agent_id).await.unwrap().is_some());
}
