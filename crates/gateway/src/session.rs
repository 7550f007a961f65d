//! Per-session dispatch worker.

use std::sync::Arc;

use {
    serde_json::Value,
    tokio::sync::mpsc,
    tracing::{debug, error},
};

use bridgeway_protocol::{ErrorShape, JSONRPC_VERSION, JsonRpcRequest, JsonRpcResponse, error_codes};

use crate::{
    methods::{MethodContext, MethodRegistry},
    state::GatewayState,
};

/// Drain the session inbox one frame at a time and push each reply over the
/// session's stream. Ends when the session is closed.
pub async fn run_session(
    state: Arc<GatewayState>,
    methods: Arc<MethodRegistry>,
    session_id: String,
    client_id: Option<String>,
    mut inbox: mpsc::UnboundedReceiver<Value>,
) {
    debug!(session = %session_id, "dispatch worker started");
    while let Some(frame) = inbox.recv().await {
        let Some(reply) =
            handle_frame(&state, &methods, &session_id, client_id.clone(), frame).await
        else {
            continue;
        };
        let text = match serde_json::to_string(&reply) {
            Ok(text) => text,
            Err(e) => {
                error!(session = %session_id, error = %e, "failed to serialize reply");
                continue;
            },
        };
        if state.sessions.push(&session_id, text).is_err() {
            debug!(session = %session_id, "session closed, reply discarded");
            break;
        }
    }
    debug!(session = %session_id, "dispatch worker stopped");
}

/// Handle one inbound frame. Notifications yield no reply.
pub async fn handle_frame(
    state: &Arc<GatewayState>,
    methods: &MethodRegistry,
    session_id: &str,
    client_id: Option<String>,
    frame: Value,
) -> Option<JsonRpcResponse> {
    let request: JsonRpcRequest = match serde_json::from_value(frame) {
        Ok(request) => request,
        Err(e) => {
            return Some(JsonRpcResponse::err(
                Value::Null,
                ErrorShape::new(error_codes::INVALID_REQUEST, format!("invalid request: {e}")),
            ));
        },
    };

    if request.jsonrpc != JSONRPC_VERSION {
        return Some(JsonRpcResponse::err(
            request.id.unwrap_or(Value::Null),
            ErrorShape::new(error_codes::INVALID_REQUEST, "jsonrpc must be \"2.0\""),
        ));
    }

    let Some(request_id) = request.id else {
        debug!(session = %session_id, method = %request.method, "notification");
        return None;
    };

    Some(
        methods
            .dispatch(MethodContext {
                request_id,
                method: request.method,
                params: request.params.unwrap_or(Value::Null),
                session_id: session_id.to_string(),
                client_id,
                state: Arc::clone(state),
            })
            .await,
    )
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::state::test_support::{test_state, test_state_with_timeout},
        serde_json::json,
    };

    async fn frame(frame: Value) -> Option<JsonRpcResponse> {
        let state = test_state(None, "http://127.0.0.1:9").await;
        handle_frame(&state, &MethodRegistry::new(), "s-1", None, frame).await
    }

    fn reply_json(reply: Option<JsonRpcResponse>) -> Value {
        serde_json::to_value(reply.unwrap()).unwrap()
    }

    #[tokio::test]
    async fn notifications_get_no_reply() {
        assert!(
            frame(json!({"jsonrpc": "2.0", "method": "notifications/initialized"}))
                .await
                .is_none()
        );
    }

    #[tokio::test]
    async fn initialize_reports_protocol_version() {
        let reply = reply_json(
            frame(json!({"jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {}})).await,
        );
        assert_eq!(reply["id"], 1);
        assert_eq!(reply["result"]["protocolVersion"], "2024-11-05");
        assert_eq!(reply["result"]["serverInfo"]["name"], "bridgeway");
    }

    #[tokio::test]
    async fn malformed_frame_is_invalid_request() {
        let reply = reply_json(frame(json!({"id": 3})).await);
        assert_eq!(reply["id"], Value::Null);
        assert_eq!(reply["error"]["code"], error_codes::INVALID_REQUEST);

        let reply = reply_json(frame(json!({"jsonrpc": "1.0", "id": 4, "method": "ping"})).await);
        assert_eq!(reply["id"], 4);
        assert_eq!(reply["error"]["code"], error_codes::INVALID_REQUEST);
    }

    #[tokio::test]
    async fn unknown_method_is_method_not_found() {
        let reply =
            reply_json(frame(json!({"jsonrpc": "2.0", "id": "a", "method": "sampling/create"})).await);
        assert_eq!(reply["id"], "a");
        assert_eq!(reply["error"]["code"], error_codes::METHOD_NOT_FOUND);
    }

    #[tokio::test]
    async fn tools_call_request_errors_are_invalid_params() {
        let reply = reply_json(
            frame(json!({
                "jsonrpc": "2.0",
                "id": 7,
                "method": "tools/call",
                "params": {"name": "nope", "arguments": {}},
            }))
            .await,
        );
        assert_eq!(reply["error"]["code"], error_codes::INVALID_PARAMS);

        let reply = reply_json(
            frame(json!({
                "jsonrpc": "2.0",
                "id": 8,
                "method": "tools/call",
                "params": {"name": "api_call", "arguments": {"principal": "two"}},
            }))
            .await,
        );
        assert_eq!(reply["error"]["code"], error_codes::INVALID_PARAMS);
        assert_eq!(reply["error"]["data"]["data"]["fields"][0]["field"], "principal");
    }

    #[tokio::test]
    async fn transport_failure_is_a_tool_error_result() {
        let reply = reply_json(
            frame(json!({
                "jsonrpc": "2.0",
                "id": 9,
                "method": "tools/call",
                "params": {"name": "api_call", "arguments": {}},
            }))
            .await,
        );
        assert_eq!(reply["result"]["isError"], true);
        let text: Value =
            serde_json::from_str(reply["result"]["content"][0]["text"].as_str().unwrap()).unwrap();
        assert_eq!(text["code"], 500);
    }

    #[tokio::test]
    async fn upstream_timeout_leaves_session_usable() {
        let silent = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let upstream = format!("http://{}/jsonrpc", silent.local_addr().unwrap());
        let state =
            test_state_with_timeout(None, &upstream, std::time::Duration::from_millis(200)).await;
        let opened = state.sessions.open(None);
        let mut outbound = opened.outbound;
        let worker = tokio::spawn(run_session(
            Arc::clone(&state),
            Arc::new(MethodRegistry::new()),
            opened.id.clone(),
            None,
            opened.inbox,
        ));

        state
            .sessions
            .route(
                &opened.id,
                json!({
                    "jsonrpc": "2.0",
                    "id": 1,
                    "method": "tools/call",
                    "params": {"name": "api_call", "arguments": {}},
                }),
            )
            .unwrap();
        let reply: Value = serde_json::from_str(&outbound.recv().await.unwrap()).unwrap();
        assert_eq!(reply["id"], 1);
        assert_eq!(reply["result"]["isError"], true);
        let text: Value =
            serde_json::from_str(reply["result"]["content"][0]["text"].as_str().unwrap()).unwrap();
        assert_eq!(text["code"], 500);
        assert!(state.sessions.is_open(&opened.id));

        state
            .sessions
            .route(&opened.id, json!({"jsonrpc": "2.0", "id": 2, "method": "ping"}))
            .unwrap();
        let reply: Value = serde_json::from_str(&outbound.recv().await.unwrap()).unwrap();
        assert_eq!(reply["id"], 2);
        assert!(reply.get("error").is_none());

        state.sessions.close(&opened.id);
        worker.await.unwrap();
        drop(silent);
    }

    #[tokio::test]
    async fn worker_pushes_replies_in_order() {
        let state = test_state(None, "http://127.0.0.1:9").await;
        let methods = Arc::new(MethodRegistry::new());
        let opened = state.sessions.open(None);
        let mut outbound = opened.outbound;
        let worker = tokio::spawn(run_session(
            Arc::clone(&state),
            methods,
            opened.id.clone(),
            None,
            opened.inbox,
        ));

        for id in 1..=3 {
            state
                .sessions
                .route(&opened.id, json!({"jsonrpc": "2.0", "id": id, "method": "ping"}))
                .unwrap();
        }
        for id in 1..=3 {
            let reply: Value = serde_json::from_str(&outbound.recv().await.unwrap()).unwrap();
            assert_eq!(reply["id"], id);
        }

        state.sessions.close(&opened.id);
        worker.await.unwrap();
    }
}
