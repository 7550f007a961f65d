use std::{collections::HashMap, future::Future, pin::Pin, sync::Arc};

use {
    serde::Deserialize,
    serde_json::{Value, json},
    tracing::{debug, warn},
};

use bridgeway_protocol::{
    ErrorShape, InitializeResult, JsonRpcResponse, PROTOCOL_VERSION, ServerInfo, ToolsCallParams,
    ToolsCallResult, error_codes,
};

use crate::state::GatewayState;

// ── Types ────────────────────────────────────────────────────────────────────

/// Context passed to every method handler.
pub struct MethodContext {
    pub request_id: Value,
    pub method: String,
    pub params: Value,
    pub session_id: String,
    pub client_id: Option<String>,
    pub state: Arc<GatewayState>,
}

/// The result a method handler produces.
pub type MethodResult = Result<Value, ErrorShape>;

/// A boxed async method handler.
pub type HandlerFn =
    Box<dyn Fn(MethodContext) -> Pin<Box<dyn Future<Output = MethodResult> + Send>> + Send + Sync>;

fn invalid_params(message: impl Into<String>) -> ErrorShape {
    ErrorShape::new(error_codes::INVALID_PARAMS, message)
}

fn parse_params<T: for<'de> Deserialize<'de>>(params: Value) -> Result<T, ErrorShape> {
    serde_json::from_value(params).map_err(|e| invalid_params(format!("invalid params: {e}")))
}

// ── Registry ─────────────────────────────────────────────────────────────────

/// Control-protocol methods available on every session.
pub struct MethodRegistry {
    handlers: HashMap<String, HandlerFn>,
}

impl Default for MethodRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MethodRegistry {
    pub fn new() -> Self {
        let mut reg = Self {
            handlers: HashMap::new(),
        };
        reg.register_defaults();
        reg
    }

    pub fn register(&mut self, method: impl Into<String>, handler: HandlerFn) {
        self.handlers.insert(method.into(), handler);
    }

    pub async fn dispatch(&self, ctx: MethodContext) -> JsonRpcResponse {
        let method = ctx.method.clone();
        let request_id = ctx.request_id.clone();
        let session = ctx.session_id.clone();

        let Some(handler) = self.handlers.get(&method) else {
            warn!(method, session = %session, "unknown method");
            return JsonRpcResponse::err(
                request_id,
                ErrorShape::new(
                    error_codes::METHOD_NOT_FOUND,
                    format!("method not found: {method}"),
                ),
            );
        };

        debug!(method, id = %request_id, session = %session, "dispatching method");
        match handler(ctx).await {
            Ok(payload) => JsonRpcResponse::ok(request_id, payload),
            Err(err) => {
                warn!(method, id = %request_id, code = err.code, msg = %err.message, "method error");
                JsonRpcResponse::err(request_id, err)
            },
        }
    }

    pub fn method_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.handlers.keys().cloned().collect();
        names.sort();
        names
    }

    fn register_defaults(&mut self) {
        self.register_lifecycle_methods();
        self.register_tool_methods();
        self.register_resource_methods();
        self.register_prompt_methods();
    }

    // ── Lifecycle ────────────────────────────────────────────────────────

    fn register_lifecycle_methods(&mut self) {
        self.register(
            "initialize",
            Box::new(|ctx| {
                Box::pin(async move {
                    let result = InitializeResult {
                        protocol_version: PROTOCOL_VERSION.into(),
                        capabilities: json!({
                            "tools": { "listChanged": false },
                            "resources": { "subscribe": false, "listChanged": false },
                            "prompts": { "listChanged": false },
                        }),
                        server_info: ServerInfo {
                            name: "bridgeway".into(),
                            version: ctx.state.version.clone(),
                        },
                    };
                    serde_json::to_value(result).map_err(|e| {
                        ErrorShape::new(error_codes::INTERNAL_ERROR, e.to_string())
                    })
                })
            }),
        );

        self.register(
            "ping",
            Box::new(|_ctx| Box::pin(async move { Ok(json!({})) })),
        );
    }

    // ── Tools ────────────────────────────────────────────────────────────

    fn register_tool_methods(&mut self) {
        self.register(
            "tools/list",
            Box::new(|ctx| {
                Box::pin(async move {
                    let tools = ctx.state.catalog.read().await.list_tools();
                    Ok(json!({ "tools": tools }))
                })
            }),
        );

        self.register(
            "tools/call",
            Box::new(|ctx| {
                Box::pin(async move {
                    let params: ToolsCallParams = parse_params(ctx.params)?;
                    let stored = ctx.state.stored_profile(ctx.client_id.as_deref()).await;
                    let result = match ctx
                        .state
                        .bridge
                        .invoke(&params.name, &params.arguments, stored)
                        .await
                    {
                        Ok(result) => ToolsCallResult::text(result.text()),
                        Err(err) if err.is_request_error() => {
                            return Err(invalid_params(err.to_string()).with_data(err.payload()));
                        },
                        Err(err) => ToolsCallResult::error_text(err.payload().to_string()),
                    };
                    serde_json::to_value(result).map_err(|e| {
                        ErrorShape::new(error_codes::INTERNAL_ERROR, e.to_string())
                    })
                })
            }),
        );
    }

    // ── Resources ────────────────────────────────────────────────────────

    fn register_resource_methods(&mut self) {
        self.register(
            "resources/list",
            Box::new(|ctx| {
                Box::pin(async move {
                    let resources = ctx.state.catalog.read().await.list_resources();
                    Ok(json!({ "resources": resources }))
                })
            }),
        );

        self.register(
            "resources/read",
            Box::new(|ctx| {
                Box::pin(async move {
                    #[derive(Deserialize)]
                    struct ReadParams {
                        uri: String,
                    }
                    let params: ReadParams = parse_params(ctx.params)?;
                    let catalog = ctx.state.catalog.read().await;
                    let resource = catalog
                        .resource_by_uri(&params.uri)
                        .ok_or_else(|| invalid_params(format!("unknown resource: {}", params.uri)))?;
                    Ok(json!({
                        "contents": [{
                            "uri": resource.uri,
                            "mimeType": resource.mime_type,
                            "text": resource.content,
                        }]
                    }))
                })
            }),
        );
    }

    // ── Prompts ──────────────────────────────────────────────────────────

    fn register_prompt_methods(&mut self) {
        self.register(
            "prompts/list",
            Box::new(|ctx| {
                Box::pin(async move {
                    let prompts = ctx.state.catalog.read().await.list_prompts();
                    Ok(json!({ "prompts": prompts }))
                })
            }),
        );

        self.register(
            "prompts/get",
            Box::new(|ctx| {
                Box::pin(async move {
                    #[derive(Deserialize)]
                    struct GetParams {
                        name: String,
                        #[serde(default)]
                        arguments: Value,
                    }
                    let params: GetParams = parse_params(ctx.params)?;
                    let catalog = ctx.state.catalog.read().await;
                    let prompt = catalog
                        .prompt(&params.name)
                        .ok_or_else(|| invalid_params(format!("unknown prompt: {}", params.name)))?;
                    let text = prompt
                        .render(&params.arguments)
                        .map_err(|e| invalid_params(e.to_string()).with_data(e.to_json()))?;
                    Ok(json!({
                        "description": prompt.description,
                        "messages": [{
                            "role": "user",
                            "content": { "type": "text", "text": text },
                        }]
                    }))
                })
            }),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registers_control_methods() {
        assert_eq!(MethodRegistry::new().method_names(), vec![
            "initialize",
            "ping",
            "prompts/get",
            "prompts/list",
            "resources/list",
            "resources/read",
            "tools/call",
            "tools/list",
        ]);
    }
}
