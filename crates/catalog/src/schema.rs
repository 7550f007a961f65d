//! Input schemas: JSON Schema documents compiled with `jsonschema`, plus the
//! per-field report built from a failed validation.

use std::{collections::BTreeMap, fmt, sync::Arc};

use {
    jsonschema::{Draft, Validator, error::ValidationErrorKind},
    serde::Serialize,
    serde_json::{Map, Value, json},
};

/// Listing view of one declared property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    pub required: bool,
    pub description: Option<String>,
}

/// A compiled object schema for a tool's input or a prompt's arguments.
#[derive(Clone)]
pub struct InputSchema {
    raw: Value,
    fields: BTreeMap<String, FieldSpec>,
    validator: Arc<Validator>,
}

impl fmt::Debug for InputSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InputSchema").field("raw", &self.raw).finish_non_exhaustive()
    }
}

impl PartialEq for InputSchema {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

fn compile(schema: &Value) -> Result<Validator, String> {
    jsonschema::options()
        .with_draft(Draft::Draft202012)
        .build(schema)
        .map_err(|e| format!("invalid schema: {e}"))
}

impl InputSchema {
    /// Compile an object schema. `null` and `{}` accept any object.
    pub fn from_json(value: &Value) -> Result<Self, String> {
        let mut raw = match value {
            Value::Null => Map::new(),
            Value::Object(obj) => obj.clone(),
            _ => return Err("schema must be a JSON object".into()),
        };
        match raw.get("type") {
            None => {
                raw.insert("type".into(), Value::String("object".into()));
            },
            Some(Value::String(ty)) if ty == "object" => {},
            Some(other) => return Err(format!("top-level type must be 'object', got {other}")),
        }
        let raw = Value::Object(raw);
        let validator = compile(&raw)?;
        Ok(Self {
            fields: listed_fields(&raw),
            raw,
            validator: Arc::new(validator),
        })
    }

    /// The schema as advertised in listings.
    pub fn to_json(&self) -> Value {
        self.raw.clone()
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldSpec)> {
        self.fields.iter().map(|(name, spec)| (name.as_str(), spec))
    }

    /// Check `args` against the schema, reporting every offending field once.
    /// A `null` value counts as absent.
    pub fn validate(&self, args: &Value) -> Result<(), ValidationError> {
        let present: Map<String, Value> = match args {
            Value::Null => Map::new(),
            Value::Object(obj) => obj
                .iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            _ => {
                return Err(ValidationError::new(vec![FieldIssue::wrong_type(
                    "arguments",
                    "object",
                )]));
            },
        };
        let instance = Value::Object(present);

        let mut issues: Vec<FieldIssue> = self
            .validator
            .iter_errors(&instance)
            .map(|e| {
                let path = e.instance_path().to_string();
                match (e.kind(), top_level_field(&path)) {
                    (ValidationErrorKind::Required { property }, None) => FieldIssue::missing(
                        property
                            .as_str()
                            .map_or_else(|| property.to_string(), str::to_owned),
                    ),
                    (_, field) => FieldIssue::invalid(
                        field.unwrap_or_else(|| "arguments".into()),
                        path,
                        e.to_string(),
                    ),
                }
            })
            .collect();

        if issues.is_empty() {
            return Ok(());
        }
        issues.sort_by(|a, b| a.field.cmp(&b.field));
        issues.dedup_by(|a, b| a.field == b.field);
        Err(ValidationError::new(issues))
    }
}

fn listed_fields(raw: &Value) -> BTreeMap<String, FieldSpec> {
    let required: Vec<&str> = raw
        .get("required")
        .and_then(Value::as_array)
        .map(|names| names.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();
    raw.get("properties")
        .and_then(Value::as_object)
        .map(|props| {
            props
                .iter()
                .map(|(name, spec)| {
                    (name.clone(), FieldSpec {
                        required: required.contains(&name.as_str()),
                        description: spec
                            .get("description")
                            .and_then(Value::as_str)
                            .map(String::from),
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}

/// First segment of a JSON pointer, unescaped.
fn top_level_field(pointer: &str) -> Option<String> {
    let segment = pointer.strip_prefix('/')?.split('/').next()?;
    Some(segment.replace("~1", "/").replace("~0", "~"))
}

// ── Validation errors ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "problem", rename_all = "snake_case")]
pub enum FieldProblem {
    Missing,
    WrongType { expected: String },
    Invalid { path: String, message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldIssue {
    pub field: String,
    #[serde(flatten)]
    pub problem: FieldProblem,
}

impl FieldIssue {
    pub fn missing(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            problem: FieldProblem::Missing,
        }
    }

    pub fn wrong_type(field: impl Into<String>, expected: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            problem: FieldProblem::WrongType {
                expected: expected.into(),
            },
        }
    }

    pub fn invalid(
        field: impl Into<String>,
        path: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            problem: FieldProblem::Invalid {
                path: path.into(),
                message: message.into(),
            },
        }
    }
}

/// Arguments failed schema validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid arguments: {}", self.field_names().join(", "))]
pub struct ValidationError {
    pub issues: Vec<FieldIssue>,
}

impl ValidationError {
    pub fn new(issues: Vec<FieldIssue>) -> Self {
        Self { issues }
    }

    pub fn field_names(&self) -> Vec<&str> {
        self.issues.iter().map(|i| i.field.as_str()).collect()
    }

    pub fn to_json(&self) -> Value {
        json!({ "fields": self.issues })
    }
}
