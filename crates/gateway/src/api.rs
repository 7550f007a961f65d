//! Admin and direct-invocation HTTP routes under `/api`.

use {
    axum::{
        Json,
        extract::{Path, State, rejection::JsonRejection},
        http::StatusCode,
    },
    bridgeway_bridge::BridgeError,
    bridgeway_catalog::{
        PromptDefinition, PromptRecord, ResourceDefinition, ResourceRecord, ToolDefinition,
        ToolRecord,
    },
    bridgeway_protocol::ToolsCallResult,
    bridgeway_store::StoredConfiguration,
    serde::Deserialize,
    serde_json::{Value, json},
    tracing::info,
};

use crate::{error::ApiError, server::AppState};

// ── Catalog ──────────────────────────────────────────────────────────────────

pub async fn list_tools(State(app): State<AppState>) -> Json<Value> {
    let tools = app.gateway.catalog.read().await.list_tools();
    Json(json!({ "tools": tools }))
}

/// Register a tool and persist it. Duplicate names are rejected.
pub async fn register_tool(
    State(app): State<AppState>,
    body: Result<Json<ToolRecord>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let Json(record) = body?;
    let tool = ToolDefinition::from_record(record)?;
    let mut catalog = app.gateway.catalog.write().await;
    if catalog.lookup(&tool.name).is_some() {
        return Err(ApiError::Conflict(format!(
            "duplicate tool name: {}",
            tool.name
        )));
    }
    app.gateway.store.upsert_tool(&tool.to_record()).await?;
    let descriptor = tool.descriptor();
    catalog.register(tool)?;
    info!(tool = %descriptor.name, "tool registered");
    Ok((StatusCode::CREATED, Json(json!({ "tool": descriptor }))))
}

pub async fn register_resource(
    State(app): State<AppState>,
    body: Result<Json<ResourceRecord>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let Json(record) = body?;
    let resource = ResourceDefinition::from_record(record)?;
    let mut catalog = app.gateway.catalog.write().await;
    if catalog.resource_by_uri(&resource.uri).is_some()
        || catalog.list_resources().iter().any(|r| r.name == resource.name)
    {
        return Err(ApiError::Conflict(format!(
            "duplicate resource: {} ({})",
            resource.name, resource.uri
        )));
    }
    app.gateway.store.upsert_resource(&resource.to_record()).await?;
    let descriptor = resource.descriptor();
    catalog.register_resource(resource)?;
    info!(uri = %descriptor.uri, "resource registered");
    Ok((StatusCode::CREATED, Json(json!({ "resource": descriptor }))))
}

pub async fn register_prompt(
    State(app): State<AppState>,
    body: Result<Json<PromptRecord>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let Json(record) = body?;
    let prompt = PromptDefinition::from_record(record)?;
    let mut catalog = app.gateway.catalog.write().await;
    if catalog.prompt(&prompt.name).is_some() {
        return Err(ApiError::Conflict(format!(
            "duplicate prompt name: {}",
            prompt.name
        )));
    }
    app.gateway.store.upsert_prompt(&prompt.to_record()).await?;
    let descriptor = prompt.descriptor();
    catalog.register_prompt(prompt)?;
    info!(prompt = %descriptor.name, "prompt registered");
    Ok((StatusCode::CREATED, Json(json!({ "prompt": descriptor }))))
}

// ── Configurations ───────────────────────────────────────────────────────────

pub async fn upsert_configuration(
    State(app): State<AppState>,
    body: Result<Json<StoredConfiguration>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(config) = body?;
    if config.client_id.trim().is_empty() {
        return Err(ApiError::bad_request("clientId must not be empty"));
    }
    if !config.config.is_object() {
        return Err(ApiError::bad_request("config must be an object"));
    }
    config
        .profile()
        .map_err(|e| ApiError::bad_request(format!("invalid config: {e}")))?;
    app.gateway.store.upsert_configuration(&config).await?;
    info!(client_id = %config.client_id, "configuration stored");
    Ok(Json(json!({ "ok": true, "clientId": config.client_id })))
}

/// The stored profile for a client, with the credential masked.
pub async fn get_configuration(
    State(app): State<AppState>,
    Path(client_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let profile = app
        .gateway
        .store
        .configuration_for_client(&client_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Configuration not found".into()))?;
    Ok(Json(json!({
        "clientId": client_id,
        "config": profile.redacted(),
    })))
}

// ── Direct invocation ────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessRequest {
    pub tool_name: String,
    #[serde(default)]
    pub arguments: Value,
    #[serde(default)]
    pub client_id: Option<String>,
}

fn status_for(err: &BridgeError) -> StatusCode {
    match err {
        BridgeError::UnknownTool(_) => StatusCode::NOT_FOUND,
        BridgeError::Validation(_) | BridgeError::Resolve(_) => StatusCode::BAD_REQUEST,
        BridgeError::Transport(_) => StatusCode::INTERNAL_SERVER_ERROR,
        BridgeError::Upstream { .. } => StatusCode::BAD_GATEWAY,
    }
}

/// `POST /api/process`: invoke a tool outside of any session.
pub async fn process(
    State(app): State<AppState>,
    body: Result<Json<ProcessRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ToolsCallResult>), ApiError> {
    let Json(request) = body?;
    let stored = app
        .gateway
        .stored_profile(request.client_id.as_deref())
        .await;
    match app
        .gateway
        .bridge
        .invoke(&request.tool_name, &request.arguments, stored)
        .await
    {
        Ok(result) => Ok((StatusCode::OK, Json(ToolsCallResult::text(result.text())))),
        Err(err) => Ok((
            status_for(&err),
            Json(ToolsCallResult::error_text(err.payload().to_string())),
        )),
    }
}
