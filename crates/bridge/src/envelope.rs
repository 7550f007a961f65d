//! The upstream `execute_kw` JSON-RPC envelope.
//!
//! Positional argument order is fixed by the upstream API:
//! `[tenant, principal, credential, model, method, domain, {"fields": [..]}]`.

use std::fmt;

use {
    bridgeway_catalog::{FieldIssue, ValidationError},
    secrecy::ExposeSecret,
    serde::Serialize,
    serde_json::Value,
};

use crate::resolver::EffectiveCallParameters;

pub const DEFAULT_SERVICE: &str = "object";
pub const DEFAULT_RPC_METHOD: &str = "execute_kw";

/// Index of the credential within `params.args`.
const CREDENTIAL_POSITION: usize = 2;

#[derive(Clone, PartialEq, Serialize)]
pub struct UpstreamEnvelope {
    jsonrpc: &'static str,
    method: &'static str,
    params: EnvelopeParams,
}

#[derive(Clone, PartialEq, Serialize)]
pub struct EnvelopeParams {
    pub service: String,
    pub method: String,
    pub args: Vec<Value>,
}

/// Caller-supplied `service` / `method` / `args` for `raw_call` tools.
#[derive(Debug, Clone, PartialEq)]
pub struct RawCall {
    pub service: String,
    pub method: String,
    pub args: Vec<Value>,
}

impl RawCall {
    pub fn from_arguments(args: &Value) -> Result<Self, ValidationError> {
        let mut issues = Vec::new();
        let mut text = |name: &str, default: &str| match args.get(name) {
            None | Some(Value::Null) => default.to_string(),
            Some(Value::String(s)) => s.clone(),
            Some(_) => {
                issues.push(FieldIssue::wrong_type(name, "string"));
                String::new()
            },
        };
        let service = text("service", DEFAULT_SERVICE);
        let method = text("method", DEFAULT_RPC_METHOD);
        let positional = match args.get("args") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items.clone(),
            Some(_) => {
                issues.push(FieldIssue::wrong_type("args", "array"));
                Vec::new()
            },
        };
        if !issues.is_empty() {
            return Err(ValidationError::new(issues));
        }
        Ok(Self {
            service,
            method,
            args: positional,
        })
    }
}

impl UpstreamEnvelope {
    fn wrap(params: EnvelopeParams) -> Self {
        Self {
            jsonrpc: "2.0",
            method: "call",
            params,
        }
    }

    pub fn execute_kw(call: &EffectiveCallParameters) -> Self {
        Self::wrap(EnvelopeParams {
            service: DEFAULT_SERVICE.into(),
            method: DEFAULT_RPC_METHOD.into(),
            args: vec![
                Value::String(call.tenant.clone()),
                Value::from(call.principal),
                Value::String(call.credential.expose_secret().clone()),
                Value::String(call.model.clone()),
                Value::String(call.method.clone()),
                call.domain.clone(),
                serde_json::json!({ "fields": call.fields }),
            ],
        })
    }

    /// Caller-supplied positional args with the connection triple written
    /// over the first three positions (padding short argument lists).
    pub fn raw_call(call: &EffectiveCallParameters, raw: RawCall) -> Self {
        let mut args = raw.args;
        if args.len() < 3 {
            args.resize(3, Value::Null);
        }
        args[0] = Value::String(call.tenant.clone());
        args[1] = Value::from(call.principal);
        args[CREDENTIAL_POSITION] = Value::String(call.credential.expose_secret().clone());
        Self::wrap(EnvelopeParams {
            service: raw.service,
            method: raw.method,
            args,
        })
    }

    pub fn params(&self) -> &EnvelopeParams {
        &self.params
    }
}

impl fmt::Debug for UpstreamEnvelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let args: Vec<&dyn fmt::Debug> = self
            .params
            .args
            .iter()
            .enumerate()
            .map(|(i, v)| {
                if i == CREDENTIAL_POSITION {
                    &"[REDACTED]" as &dyn fmt::Debug
                } else {
                    v as &dyn fmt::Debug
                }
            })
            .collect();
        f.debug_struct("UpstreamEnvelope")
            .field("service", &self.params.service)
            .field("method", &self.params.method)
            .field("args", &args)
            .finish()
    }
}

impl fmt::Debug for EnvelopeParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnvelopeParams")
            .field("service", &self.service)
            .field("method", &self.method)
            .field("args", &format_args!("[{} args]", self.args.len()))
            .finish()
    }
}
