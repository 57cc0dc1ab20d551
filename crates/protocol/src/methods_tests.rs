use super::*;
use fleetd_core::PermissionSet;
use serde_json::json;

struct Echo;

#[async_trait]
impl MethodHandler for Echo {
    async fn call(&self, _agent_id: &str, params: Option<Value>) -> Result<Value, RpcError> {
        Ok(params.unwrap_or(Value::Null))
    }
}

struct AlwaysFails;

#[async_trait]
impl MethodHandler for AlwaysFails {
    async fn call(&self, _agent_id: &str, _params: Option<Value>) -> Result<Value, RpcError> {
        Err(RpcError::internal())
    }
}

#[tokio::test]
async fn unknown_method_returns_method_not_found() {
    let table = MethodTable::new();
    let response = table
        .dispatch(
            "a1",
            MethodCall {
                method: "agent.nope".to_string(),
                params: None,
                id: Some(json!(1)),
            },
            &PermissionSet::all(),
        )
        .await
        .unwrap();
    assert_eq!(response.error.unwrap().code, crate::rpc::error_code::METHOD_NOT_FOUND);
}

#[tokio::test]
async fn permission_denied_when_not_allowed() {
    let mut table = MethodTable::new();
    table.register("agent.ping", Permission::Read, Box::new(Echo));
    let response = table
        .dispatch(
            "a1",
            MethodCall {
                method: "agent.ping".to_string(),
                params: None,
                id: Some(json!(1)),
            },
            &PermissionSet::none(),
        )
        .await
        .unwrap();
    assert_eq!(
        response.error.unwrap().code,
        crate::rpc::error_code::PERMISSION_DENIED
    );
}

#[tokio::test]
async fn successful_call_echoes_params_as_result() {
    let mut table = MethodTable::new();
    table.register("agent.ping", Permission::Read, Box::new(Echo));
    let response = table
        .dispatch(
            "a1",
            MethodCall {
                method: "agent.ping".to_string(),
                params: Some(json!({"version": "1.0"})),
                id: Some(json!(7)),
            },
            &PermissionSet::all(),
        )
        .await
        .unwrap();
    assert_eq!(response.result.unwrap(), json!({"version": "1.0"}));
}

#[tokio::test]
async fn notification_never_produces_a_response_even_on_handler_error() {
    let mut table = MethodTable::new();
    table.register("agent.heartbeat", Permission::Read, Box::new(AlwaysFails));
    let response = table
        .dispatch(
            "a1",
            MethodCall {
                method: "agent.heartbeat".to_string(),
                params: None,
                id: None,
            },
            &PermissionSet::all(),
        )
        .await;
    assert!(response.is_none());
}

#[tokio::test]
async fn handler_error_is_generalized_to_internal_error() {
    let mut table = MethodTable::new();
    table.register("agent.broken", Permission::Read, Box::new(AlwaysFails));
    let response = table
        .dispatch(
            "a1",
            MethodCall {
                method: "agent.broken".to_string(),
                params: None,
                id: Some(json!(3)),
            },
            &PermissionSet::all(),
        )
        .await
        .unwrap();
    assert_eq!(
        response.error.unwrap().code,
        crate::rpc::error_code::INTERNAL_ERROR
    );
}
