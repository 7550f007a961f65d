use std::{sync::Arc, time::Duration};

use {
    bridgeway_catalog::{HandlerKind, ToolCatalog},
    bridgeway_config::CallProfile,
    serde_json::Value,
    tokio::sync::RwLock,
    tracing::{info, warn},
};

use crate::{
    envelope::{RawCall, UpstreamEnvelope},
    error::BridgeError,
    resolver::{explicit_profile, resolve},
    transport::{HttpTransport, UpstreamTransport, loggable_address},
};

/// The upstream reply's `result`, unwrapped.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedResult {
    pub value: Value,
}

impl NormalizedResult {
    /// Compact JSON text of the result, as delivered in tool content.
    pub fn text(&self) -> String {
        self.value.to_string()
    }
}

/// Translates tool invocations into upstream `execute_kw` calls.
pub struct ProtocolBridge {
    catalog: Arc<RwLock<ToolCatalog>>,
    transport: Arc<dyn UpstreamTransport>,
    defaults: CallProfile,
    timeout: Duration,
}

impl ProtocolBridge {
    pub fn new(catalog: Arc<RwLock<ToolCatalog>>, defaults: CallProfile, timeout: Duration) -> Self {
        Self::with_transport(catalog, Arc::new(HttpTransport::default()), defaults, timeout)
    }

    pub fn with_transport(
        catalog: Arc<RwLock<ToolCatalog>>,
        transport: Arc<dyn UpstreamTransport>,
        defaults: CallProfile,
        timeout: Duration,
    ) -> Self {
        Self {
            catalog,
            transport,
            defaults,
            timeout,
        }
    }

    pub fn catalog(&self) -> &Arc<RwLock<ToolCatalog>> {
        &self.catalog
    }

    pub fn defaults(&self) -> &CallProfile {
        &self.defaults
    }

    /// Look up, validate, resolve, call upstream once, unwrap the reply.
    pub async fn invoke(
        &self,
        tool_name: &str,
        raw_args: &Value,
        stored: Option<CallProfile>,
    ) -> Result<NormalizedResult, BridgeError> {
        let tool = self
            .catalog
            .read()
            .await
            .lookup(tool_name)
            .cloned()
            .ok_or_else(|| BridgeError::UnknownTool(tool_name.to_string()))?;

        tool.validate(raw_args)?;
        let explicit = explicit_profile(raw_args, tool.handler)?;
        let params = resolve(explicit, stored, &self.defaults)?;

        let envelope = match tool.handler {
            HandlerKind::ExecuteKw => UpstreamEnvelope::execute_kw(&params),
            HandlerKind::RawCall => {
                UpstreamEnvelope::raw_call(&params, RawCall::from_arguments(raw_args)?)
            },
        };

        info!(
            tool = %tool.name,
            handler = tool.handler.as_str(),
            address = %loggable_address(&params.address),
            tenant = %params.tenant,
            service = %envelope.params().service,
            method = %envelope.params().method,
            model = %params.model,
            "upstream call"
        );

        let outcome = tokio::time::timeout(
            self.timeout,
            self.transport.call(&params.address, &envelope),
        )
        .await
        .unwrap_or_else(|_| {
            Err(BridgeError::transport(format!(
                "timed out after {}ms",
                self.timeout.as_millis()
            )))
        });

        match outcome {
            Ok(value) => Ok(NormalizedResult { value }),
            Err(err) => {
                warn!(tool = %tool.name, code = err.code(), error = %err, "upstream call failed");
                Err(err)
            },
        }
    }
}
