use {bridgeway_catalog::ValidationError, serde_json::Value};

use crate::resolver::ResolveError;

/// Fixed code reported for failures that never produced an upstream answer.
pub const TRANSPORT_ERROR_CODE: i64 = 500;

#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("unknown tool '{0}'")]
    UnknownTool(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    /// Connect failure, timeout or an unreadable reply.
    #[error("upstream transport failure: {0}")]
    Transport(String),

    /// Error reported by the upstream, passed through verbatim.
    #[error("upstream error {code}: {message}")]
    Upstream {
        code: i64,
        message: String,
        data: Option<Value>,
    },
}

impl BridgeError {
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }

    /// True for errors caused by the request itself rather than the upstream.
    pub fn is_request_error(&self) -> bool {
        matches!(
            self,
            Self::UnknownTool(_) | Self::Validation(_) | Self::Resolve(_)
        )
    }

    pub fn code(&self) -> i64 {
        match self {
            Self::Upstream { code, .. } => *code,
            _ => TRANSPORT_ERROR_CODE,
        }
    }

    /// `{code, message, data}` as returned to clients. Validation and
    /// resolution failures list the offending fields in `data`.
    pub fn payload(&self) -> Value {
        match self {
            Self::Upstream {
                code,
                message,
                data,
            } => serde_json::json!({ "code": code, "message": message, "data": data }),
            Self::Validation(err) => serde_json::json!({
                "code": self.code(),
                "message": self.to_string(),
                "data": err.to_json(),
            }),
            Self::Resolve(err) => serde_json::json!({
                "code": self.code(),
                "message": self.to_string(),
                "data": { "missing": err.fields() },
            }),
            Self::UnknownTool(_) | Self::Transport(_) => serde_json::json!({
                "code": self.code(),
                "message": self.to_string(),
                "data": Value::Null,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use {super::*, bridgeway_catalog::FieldIssue, serde_json::json};

    #[test]
    fn upstream_payload_is_verbatim() {
        let err = BridgeError::Upstream {
            code: 200,
            message: "Odoo Server Error".into(),
            data: Some(json!({"name": "AccessDenied"})),
        };
        assert_eq!(
            err.payload(),
            json!({"code": 200, "message": "Odoo Server Error", "data": {"name": "AccessDenied"}})
        );
        assert!(!err.is_request_error());
    }

    #[test]
    fn transport_uses_fixed_code() {
        let err = BridgeError::transport("connection refused");
        assert_eq!(err.code(), TRANSPORT_ERROR_CODE);
        assert_eq!(err.payload()["code"], 500);
    }

    #[test]
    fn request_errors_list_fields() {
        let err: BridgeError = ValidationError::new(vec![FieldIssue::missing("model")]).into();
        assert!(err.is_request_error());
        assert_eq!(err.payload()["data"]["fields"][0]["field"], "model");

        let err: BridgeError = ResolveError::MissingRequiredField(vec!["address"]).into();
        assert_eq!(err.payload()["data"]["missing"], json!(["address"]));
    }
}
