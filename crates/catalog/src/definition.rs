//! Catalog entries: persisted record shapes and their validated definitions.

use {
    bridgeway_protocol::{PromptArgument, PromptDescriptor, ResourceDescriptor, ToolDescriptor},
    serde::{Deserialize, Serialize},
    serde_json::Value,
};

use crate::{
    catalog::{EntryKind, LoadError},
    schema::{InputSchema, ValidationError},
};

// ── Handler kinds ────────────────────────────────────────────────────────────

/// How a tool invocation reaches the upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandlerKind {
    /// Build the `execute_kw` envelope from resolved parameters.
    ExecuteKw,
    /// Like `ExecuteKw`, but the tool supplies `args` verbatim and only the
    /// connection triple (tenant, principal, credential) is injected.
    RawCall,
}

impl HandlerKind {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "execute_kw" => Some(Self::ExecuteKw),
            "raw_call" => Some(Self::RawCall),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::ExecuteKw => "execute_kw",
            Self::RawCall => "raw_call",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptKind {
    /// `{{name}}` placeholders substituted from the prompt arguments.
    Template,
}

impl PromptKind {
    pub fn parse(raw: &str) -> Option<Self> {
        (raw == "template").then_some(Self::Template)
    }

    pub fn as_str(self) -> &'static str {
        "template"
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Static,
}

impl ResourceKind {
    pub fn parse(raw: &str) -> Option<Self> {
        (raw == "static").then_some(Self::Static)
    }

    pub fn as_str(self) -> &'static str {
        "static"
    }
}

// ── Records ──────────────────────────────────────────────────────────────────

fn empty_object() -> Value {
    Value::Object(Default::default())
}

/// A tool as persisted and as accepted by the admin API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolRecord {
    /// Stable row id; defaults to the name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "empty_object")]
    pub input_schema: Value,
    pub handler: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceRecord {
    /// Stable row id; defaults to the name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub uri: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default = "default_resource_handler")]
    pub handler: String,
    #[serde(default)]
    pub content: String,
}

fn default_resource_handler() -> String {
    "static".into()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptRecord {
    /// Stable row id; defaults to the name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Argument schema, compiled like a tool input schema.
    #[serde(default = "empty_object")]
    pub arguments: Value,
    #[serde(default = "default_prompt_handler")]
    pub handler: String,
    #[serde(default)]
    pub template: String,
}

fn default_prompt_handler() -> String {
    "template".into()
}

/// Everything the catalog is built from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogRecords {
    #[serde(default)]
    pub tools: Vec<ToolRecord>,
    #[serde(default)]
    pub resources: Vec<ResourceRecord>,
    #[serde(default)]
    pub prompts: Vec<PromptRecord>,
}

impl CatalogRecords {
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty() && self.resources.is_empty() && self.prompts.is_empty()
    }
}

fn require_name(kind: EntryKind, name: &str) -> Result<(), LoadError> {
    if name.trim().is_empty() {
        return Err(LoadError::EmptyName { kind });
    }
    Ok(())
}

fn non_empty(text: &str) -> Option<String> {
    (!text.is_empty()).then(|| text.to_string())
}

// ── Definitions ──────────────────────────────────────────────────────────────

/// A validated, invocable tool.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolDefinition {
    pub id: String,
    pub name: String,
    pub description: String,
    pub input_schema: InputSchema,
    pub handler: HandlerKind,
}

impl ToolDefinition {
    pub fn from_record(record: ToolRecord) -> Result<Self, LoadError> {
        require_name(EntryKind::Tool, &record.name)?;
        let handler =
            HandlerKind::parse(&record.handler).ok_or_else(|| LoadError::UnknownHandler {
                kind: EntryKind::Tool,
                name: record.name.clone(),
                handler: record.handler.clone(),
            })?;
        let input_schema =
            InputSchema::from_json(&record.input_schema).map_err(|reason| {
                LoadError::InvalidSchema {
                    kind: EntryKind::Tool,
                    name: record.name.clone(),
                    reason,
                }
            })?;
        Ok(Self {
            id: record.id.unwrap_or_else(|| record.name.clone()),
            name: record.name,
            description: record.description,
            input_schema,
            handler,
        })
    }

    pub fn to_record(&self) -> ToolRecord {
        ToolRecord {
            id: Some(self.id.clone()),
            name: self.name.clone(),
            description: self.description.clone(),
            input_schema: self.input_schema.to_json(),
            handler: self.handler.as_str().into(),
        }
    }

    pub fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: self.name.clone(),
            description: non_empty(&self.description),
            input_schema: self.input_schema.to_json(),
        }
    }

    pub fn validate(&self, args: &Value) -> Result<(), ValidationError> {
        self.input_schema.validate(args)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResourceDefinition {
    pub id: String,
    pub uri: String,
    pub name: String,
    pub description: String,
    pub mime_type: Option<String>,
    pub kind: ResourceKind,
    pub content: String,
}

impl ResourceDefinition {
    pub fn from_record(record: ResourceRecord) -> Result<Self, LoadError> {
        require_name(EntryKind::Resource, &record.name)?;
        if record.uri.trim().is_empty() {
            return Err(LoadError::InvalidSchema {
                kind: EntryKind::Resource,
                name: record.name,
                reason: "empty uri".into(),
            });
        }
        let kind =
            ResourceKind::parse(&record.handler).ok_or_else(|| LoadError::UnknownHandler {
                kind: EntryKind::Resource,
                name: record.name.clone(),
                handler: record.handler.clone(),
            })?;
        Ok(Self {
            id: record.id.unwrap_or_else(|| record.name.clone()),
            uri: record.uri,
            name: record.name,
            description: record.description,
            mime_type: record.mime_type,
            kind,
            content: record.content,
        })
    }

    pub fn to_record(&self) -> ResourceRecord {
        ResourceRecord {
            id: Some(self.id.clone()),
            uri: self.uri.clone(),
            name: self.name.clone(),
            description: self.description.clone(),
            mime_type: self.mime_type.clone(),
            handler: self.kind.as_str().into(),
            content: self.content.clone(),
        }
    }

    pub fn descriptor(&self) -> ResourceDescriptor {
        ResourceDescriptor {
            uri: self.uri.clone(),
            name: self.name.clone(),
            description: non_empty(&self.description),
            mime_type: self.mime_type.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PromptDefinition {
    pub id: String,
    pub name: String,
    pub description: String,
    pub arguments: InputSchema,
    pub kind: PromptKind,
    pub template: String,
}

impl PromptDefinition {
    pub fn from_record(record: PromptRecord) -> Result<Self, LoadError> {
        require_name(EntryKind::Prompt, &record.name)?;
        let kind = PromptKind::parse(&record.handler).ok_or_else(|| LoadError::UnknownHandler {
            kind: EntryKind::Prompt,
            name: record.name.clone(),
            handler: record.handler.clone(),
        })?;
        let arguments = InputSchema::from_json(&record.arguments).map_err(|reason| {
            LoadError::InvalidSchema {
                kind: EntryKind::Prompt,
                name: record.name.clone(),
                reason,
            }
        })?;
        Ok(Self {
            id: record.id.unwrap_or_else(|| record.name.clone()),
            name: record.name,
            description: record.description,
            arguments,
            kind,
            template: record.template,
        })
    }

    pub fn to_record(&self) -> PromptRecord {
        PromptRecord {
            id: Some(self.id.clone()),
            name: self.name.clone(),
            description: self.description.clone(),
            arguments: self.arguments.to_json(),
            handler: self.kind.as_str().into(),
            template: self.template.clone(),
        }
    }

    pub fn descriptor(&self) -> PromptDescriptor {
        PromptDescriptor {
            name: self.name.clone(),
            description: non_empty(&self.description),
            arguments: self
                .arguments
                .fields()
                .map(|(name, spec)| PromptArgument {
                    name: name.to_string(),
                    description: spec.description.clone(),
                    required: spec.required,
                })
                .collect(),
        }
    }

    /// Validate `args` and substitute every `{{name}}` placeholder in a single
    /// pass over the template. Strings are inserted as-is, other values as
    /// compact JSON; unknown or null placeholders are left untouched.
    pub fn render(&self, args: &Value) -> Result<String, ValidationError> {
        self.arguments.validate(args)?;
        let mut out = String::with_capacity(self.template.len());
        let mut rest = self.template.as_str();
        while let Some(start) = rest.find("{{") {
            out.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            let Some(end) = after.find("}}") else {
                rest = &rest[start..];
                break;
            };
            match args.get(&after[..end]) {
                Some(Value::String(text)) => out.push_str(text),
                Some(Value::Null) | None => out.push_str(&rest[start..start + 2 + end + 2]),
                Some(other) => out.push_str(&other.to_string()),
            }
            rest = &after[end + 2..];
        }
        out.push_str(rest);
        Ok(out)
    }
}
