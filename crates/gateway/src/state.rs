use std::sync::Arc;

use {
    bridgeway_bridge::ProtocolBridge,
    bridgeway_catalog::ToolCatalog,
    bridgeway_config::CallProfile,
    bridgeway_store::CatalogStore,
    tokio::sync::RwLock,
    tracing::warn,
};

use crate::{auth::ResolvedAuth, registry::SessionRegistry};

// ── Gateway state ────────────────────────────────────────────────────────────

/// Shared gateway runtime state, wrapped in Arc for use across async tasks.
pub struct GatewayState {
    /// Open SSE sessions, keyed by connection id.
    pub sessions: SessionRegistry,
    /// Tool/resource/prompt catalog, shared with the bridge.
    pub catalog: Arc<RwLock<ToolCatalog>>,
    pub bridge: ProtocolBridge,
    pub store: Arc<dyn CatalogStore>,
    pub auth: ResolvedAuth,
    /// Server version string.
    pub version: String,
}

impl GatewayState {
    pub fn new(bridge: ProtocolBridge, store: Arc<dyn CatalogStore>, auth: ResolvedAuth) -> Arc<Self> {
        Arc::new(Self {
            sessions: SessionRegistry::new(),
            catalog: Arc::clone(bridge.catalog()),
            bridge,
            store,
            auth,
            version: env!("CARGO_PKG_VERSION").to_string(),
        })
    }

    /// Stored profile for `client_id`. A missing row or a store failure
    /// falls back to the defaults tier (`None`).
    pub async fn stored_profile(&self, client_id: Option<&str>) -> Option<CallProfile> {
        let client_id = client_id?;
        match self.store.configuration_for_client(client_id).await {
            Ok(profile) => profile,
            Err(e) => {
                warn!(client_id, error = %e, "stored configuration unavailable, using defaults");
                None
            },
        }
    }

    pub async fn tool_count(&self) -> usize {
        self.catalog.read().await.tool_count()
    }
}
