//! Tool, resource and prompt catalog with input-schema validation.

pub mod builtin;
pub mod catalog;
pub mod definition;
pub mod schema;

pub use {
    builtin::{API_CALL_TOOL, builtin_records},
    catalog::{EntryKind, LoadError, ToolCatalog},
    definition::{
        CatalogRecords, HandlerKind, PromptDefinition, PromptKind, PromptRecord,
        ResourceDefinition, ResourceKind, ResourceRecord, ToolDefinition, ToolRecord,
    },
    schema::{FieldIssue, FieldProblem, InputSchema, ValidationError},
};
