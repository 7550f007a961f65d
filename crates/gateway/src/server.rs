use std::{net::SocketAddr, sync::Arc, time::Duration};

use {
    anyhow::Context,
    axum::{
        Router,
        extract::State,
        middleware,
        response::{IntoResponse, Json},
        routing::{get, post},
    },
    tokio::sync::RwLock,
    tower_http::{
        cors::{Any, CorsLayer},
        trace::TraceLayer,
    },
    tracing::{info, warn},
};

use {
    bridgeway_bridge::ProtocolBridge,
    bridgeway_catalog::{ToolCatalog, builtin_records},
    bridgeway_config::BridgewayConfig,
    bridgeway_protocol::{MESSAGE_PATH, PROTOCOL_VERSION},
    bridgeway_store::{CatalogStore, SqliteStore},
};

use crate::{api, auth, methods::MethodRegistry, sse, state::GatewayState};

// ── Shared app state ─────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<GatewayState>,
    pub methods: Arc<MethodRegistry>,
}

// ── Server startup ───────────────────────────────────────────────────────────

/// Build the gateway router (shared between production startup and tests).
/// Everything except `/health` sits behind the API-key check.
pub fn build_gateway_app(state: Arc<GatewayState>, methods: Arc<MethodRegistry>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let protected = Router::new()
        .route("/mcp/sse", get(sse::stream_handler))
        .route(MESSAGE_PATH, post(sse::message_handler))
        .route("/api/process", post(api::process))
        .route("/api/tools", get(api::list_tools).post(api::register_tool))
        .route("/api/resources", post(api::register_resource))
        .route("/api/prompts", post(api::register_prompt))
        .route("/api/configurations", post(api::upsert_configuration))
        .route(
            "/api/configurations/{client_id}",
            get(api::get_configuration),
        )
        .route_layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            auth::require_api_key,
        ));

    let app_state = AppState {
        gateway: state,
        methods,
    };

    Router::new()
        .route("/health", get(health_handler))
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(app_state)
}

/// Load the catalog from the store, seeding the built-in entries into an
/// empty store first. Any invalid or duplicate record is fatal.
pub async fn load_catalog(store: &dyn CatalogStore) -> anyhow::Result<ToolCatalog> {
    let mut records = store.load_catalog_records().await?;
    if records.tools.is_empty() {
        let builtins = builtin_records();
        for tool in &builtins.tools {
            store.upsert_tool(tool).await?;
        }
        for resource in &builtins.resources {
            if !records.resources.iter().any(|r| r.uri == resource.uri) {
                store.upsert_resource(resource).await?;
            }
        }
        info!(tools = builtins.tools.len(), "seeded built-in catalog");
        records = store.load_catalog_records().await?;
    }
    ToolCatalog::load(records).context("catalog failed to load")
}

/// Assemble gateway state from config: store, catalog, bridge and auth.
pub async fn prepare_gateway(config: &BridgewayConfig) -> anyhow::Result<Arc<GatewayState>> {
    let store = SqliteStore::connect(&config.database.url)
        .await
        .with_context(|| format!("failed to open store at {}", config.database.url))?;
    let catalog = load_catalog(&store).await?;

    let bridge = ProtocolBridge::new(
        Arc::new(RwLock::new(catalog)),
        config.upstream_defaults(),
        Duration::from_secs(config.upstream.timeout_secs),
    );
    let auth = auth::resolve_auth(config.auth.token.clone());
    Ok(GatewayState::new(bridge, Arc::new(store), auth))
}

/// Start the gateway HTTP + SSE server.
pub async fn start_gateway(config: &BridgewayConfig) -> anyhow::Result<()> {
    let state = prepare_gateway(config).await?;
    let methods = Arc::new(MethodRegistry::new());
    let app = build_gateway_app(Arc::clone(&state), Arc::clone(&methods));

    let addr: SocketAddr = format!("{}:{}", config.server.bind, config.server.port)
        .parse()
        .context("invalid bind address")?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    let defaults = state.bridge.defaults();
    let lines = [
        format!("bridgeway gateway v{}", state.version),
        format!("protocol {PROTOCOL_VERSION}, listening on {addr}"),
        format!(
            "{} tools, {} methods registered",
            state.tool_count().await,
            methods.method_names().len()
        ),
        format!(
            "upstream: {}",
            defaults.address.as_deref().unwrap_or("(not configured)")
        ),
        format!(
            "auth: {}",
            if state.auth.token.is_some() {
                "x-api-key required"
            } else {
                "disabled"
            }
        ),
    ];
    let width = lines.iter().map(|l| l.len()).max().unwrap_or(0) + 4;
    info!("┌{}┐", "─".repeat(width));
    for line in &lines {
        info!("│  {:<w$}│", line, w = width - 2);
    }
    info!("└{}┘", "─".repeat(width));

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(Arc::clone(&state)))
        .await?;
    info!("gateway stopped");
    Ok(())
}

async fn shutdown_signal(state: Arc<GatewayState>) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    let closed = state.sessions.close_all();
    info!(sessions = closed, "shutdown requested");
}

// ── Handlers ─────────────────────────────────────────────────────────────────

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": state.gateway.version,
        "protocol": PROTOCOL_VERSION,
        "connections": state.gateway.sessions.count(),
        "tools": state.gateway.tool_count().await,
    }))
}
