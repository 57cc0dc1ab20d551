use super::*;
use crate::registry::{ConnectionHandle, OutboundMessage};
use chrono::TimeZone;
use fleetd_core::{AgentConfig, ServerId};
use fleetd_protocol::RpcResponse;
use serde_json::json;
use tokio::sync::mpsc;

fn fixed_now() -> chrono::DateTime<chrono::Utc> {
    chrono::Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()
}

struct StubFallback {
    output: Result<String, String>,
}

#[async_trait]
impl FallbackExecutor for StubFallback {
    async fn execute(
        &self,
        _server_id: &ServerId,
        _command: &str,
        _timeout: Duration,
    ) -> Result<String, String> {
        self.output.clone()
    }
}

async fn router_with_fallback(output: Result<String, String>) -> (CommandRouter, AgentRepository, AgentRegistry) {
    let pool = fleetd_storage::connect_in_memory().await.unwrap();
    let storage = AgentRepository::new(pool);
    let registry = AgentRegistry::new();
    let fallback = Arc::new(StubFallback { output });
    let router = CommandRouter::new(storage.clone(), registry.clone(), fallback);
    (router, storage, registry)
}

#[tokio::test]
async fn executes_over_ssh_when_no_agent_is_registered() {
    let (router, _storage, _registry) =
        router_with_fallback(Ok("ssh output".to_string())).await;

    let result = router
        .execute(
            &ServerId::new("server-123"),
            "ls",
            None,
            Duration::from_secs(1),
            Policy::PreferAgent,
        )
        .await;

    assert!(result.success);
    assert_eq!(result.method, CommandMethod::Ssh);
    assert_eq!(result.output, "ssh output");
    assert!(result.execution_time_ms >= 0.0);
}

#[tokio::test]
async fn executes_over_the_agent_when_connected() {
    let (router, storage, registry) = router_with_fallback(Ok("unused".to_string())).await;

    let server_id = ServerId::new("server-123");
    let agent = storage
        .create_agent(&server_id, AgentConfig::default(), fixed_now())
        .await
        .unwrap();

    let (tx, mut rx) = mpsc::unbounded_channel();
    let handle = Arc::new(ConnectionHandle::new(agent.id.clone(), tx));
    registry.register(handle.clone());

    tokio::spawn(async move {
        let OutboundMessage::Frame(sent) = rx.recv().await.expect("request forwarded to agent") else {
            panic!("expected a frame, got a close message");
        };
        let request: fleetd_protocol::RpcRequest = serde_json::from_str(&sent).unwrap();
        handle.complete(RpcResponse::success(
            request.id.unwrap(),
            json!({"success": true, "output": "agent output", "exit_code": 0}),
        ));
    });

    let result = router
        .execute(&server_id, "run_command", None, Duration::from_secs(1), Policy::PreferAgent)
        .await;

    assert!(result.success);
    assert_eq!(result.method, CommandMethod::Agent);
    assert_eq!(result.output, "agent output");
}

#[tokio::test]
async fn force_fallback_skips_a_connected_agent() {
    let (router, storage, registry) = router_with_fallback(Ok("forced ssh".to_string())).await;

    let server_id = ServerId::new("server-123");
    let agent = storage
        .create_agent(&server_id, AgentConfig::default(), fixed_now())
        .await
        .unwrap();
    let (tx, _rx) = mpsc::unbounded_channel();
    registry.register(Arc::new(ConnectionHandle::new(agent.id.clone(), tx)));

    let result = router
        .execute(&server_id, "ls", None, Duration::from_secs(1), Policy::ForceFallback)
        .await;

    assert_eq!(result.method, CommandMethod::Ssh);
    assert_eq!(result.output, "forced ssh");
}

#[tokio::test]
async fn force_agent_fails_without_falling_back_when_unavailable() {
    let (router, _storage, _registry) =
        router_with_fallback(Ok("should not be used".to_string())).await;

    let result = router
        .execute(
            &ServerId::new("server-123"),
            "ls",
            None,
            Duration::from_secs(1),
            Policy::ForceAgent,
        )
        .await;

    assert!(!result.success);
    assert_eq!(result.method, CommandMethod::None);
    assert!(result.error.is_some());
}
