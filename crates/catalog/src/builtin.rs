//! Entries seeded into an empty store.

use serde_json::json;

use crate::definition::{CatalogRecords, ResourceRecord, ToolRecord};

pub const API_CALL_TOOL: &str = "api_call";

/// A generic `execute_kw` tool whose every parameter is optional and falls
/// back to stored or configured values, plus a usage resource.
pub fn builtin_records() -> CatalogRecords {
    CatalogRecords {
        tools: vec![ToolRecord {
            id: None,
            name: API_CALL_TOOL.into(),
            description: "Call the upstream execute_kw API. Omitted parameters fall back to \
                          the client's stored configuration, then to server defaults."
                .into(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "address": { "type": "string", "description": "Upstream JSON-RPC URL" },
                    "tenant": { "type": "string", "description": "Database name" },
                    "principal": { "type": "integer", "description": "User id" },
                    "credential": { "type": "string", "description": "Password or API key" },
                    "model": { "type": "string", "description": "Model name, e.g. res.partner" },
                    "method": { "type": "string", "description": "Model method, e.g. search_read" },
                    "domain": { "type": "array", "description": "Domain filter" },
                    "fields": {
                        "type": "array",
                        "items": { "type": "string" },
                        "description": "Fields to return"
                    }
                },
                "required": []
            }),
            handler: "execute_kw".into(),
        }],
        resources: vec![ResourceRecord {
            id: None,
            uri: "bridgeway://usage".into(),
            name: "usage".into(),
            description: "How tool calls map onto upstream requests".into(),
            mime_type: Some("text/plain".into()),
            handler: "static".into(),
            content: "Tool arguments override the stored client configuration, which \
                      overrides server defaults. Address, tenant, principal and credential \
                      must resolve from one of the three."
                .into(),
        }],
        prompts: Vec::new(),
    }
}
