use std::{collections::BTreeMap, fmt};

use {
    bridgeway_protocol::{PromptDescriptor, ResourceDescriptor, ToolDescriptor},
    tracing::{debug, info},
};

use crate::definition::{
    CatalogRecords, PromptDefinition, ResourceDefinition, ToolDefinition,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Tool,
    Resource,
    Prompt,
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Tool => "tool",
            Self::Resource => "resource",
            Self::Prompt => "prompt",
        })
    }
}

/// A record could not become part of the catalog.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LoadError {
    #[error("duplicate {kind} '{name}'")]
    Duplicate { kind: EntryKind, name: String },
    #[error("{kind} record has an empty name")]
    EmptyName { kind: EntryKind },
    #[error("{kind} '{name}' has unknown handler kind '{handler}'")]
    UnknownHandler {
        kind: EntryKind,
        name: String,
        handler: String,
    },
    #[error("{kind} '{name}' is invalid: {reason}")]
    InvalidSchema {
        kind: EntryKind,
        name: String,
        reason: String,
    },
}

/// Registry of tools, resources and prompts, keyed by unique name.
///
/// Listings are sorted by name. Resources are additionally unique by URI.
#[derive(Debug, Clone, Default)]
pub struct ToolCatalog {
    tools: BTreeMap<String, ToolDefinition>,
    resources: BTreeMap<String, ResourceDefinition>,
    prompts: BTreeMap<String, PromptDefinition>,
}

impl ToolCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a catalog from records, failing on the first invalid or
    /// duplicate entry.
    pub fn load(records: CatalogRecords) -> Result<Self, LoadError> {
        let mut catalog = Self::new();
        for record in records.tools {
            catalog.register(ToolDefinition::from_record(record)?)?;
        }
        for record in records.resources {
            catalog.register_resource(ResourceDefinition::from_record(record)?)?;
        }
        for record in records.prompts {
            catalog.register_prompt(PromptDefinition::from_record(record)?)?;
        }
        info!(
            tools = catalog.tools.len(),
            resources = catalog.resources.len(),
            prompts = catalog.prompts.len(),
            "catalog loaded"
        );
        Ok(catalog)
    }

    pub fn lookup(&self, name: &str) -> Option<&ToolDefinition> {
        self.tools.get(name)
    }

    /// Add a tool. A name already present is rejected, never replaced.
    pub fn register(&mut self, tool: ToolDefinition) -> Result<(), LoadError> {
        if self.tools.contains_key(&tool.name) {
            return Err(LoadError::Duplicate {
                kind: EntryKind::Tool,
                name: tool.name,
            });
        }
        debug!(tool = %tool.name, handler = tool.handler.as_str(), "registered tool");
        self.tools.insert(tool.name.clone(), tool);
        Ok(())
    }

    pub fn register_resource(&mut self, resource: ResourceDefinition) -> Result<(), LoadError> {
        if self.resources.contains_key(&resource.name) {
            return Err(LoadError::Duplicate {
                kind: EntryKind::Resource,
                name: resource.name,
            });
        }
        if self.resource_by_uri(&resource.uri).is_some() {
            return Err(LoadError::Duplicate {
                kind: EntryKind::Resource,
                name: resource.uri,
            });
        }
        debug!(resource = %resource.name, uri = %resource.uri, "registered resource");
        self.resources.insert(resource.name.clone(), resource);
        Ok(())
    }

    pub fn register_prompt(&mut self, prompt: PromptDefinition) -> Result<(), LoadError> {
        if self.prompts.contains_key(&prompt.name) {
            return Err(LoadError::Duplicate {
                kind: EntryKind::Prompt,
                name: prompt.name,
            });
        }
        debug!(prompt = %prompt.name, "registered prompt");
        self.prompts.insert(prompt.name.clone(), prompt);
        Ok(())
    }

    pub fn resource_by_uri(&self, uri: &str) -> Option<&ResourceDefinition> {
        self.resources.values().find(|r| r.uri == uri)
    }

    pub fn prompt(&self, name: &str) -> Option<&PromptDefinition> {
        self.prompts.get(name)
    }

    pub fn tool_count(&self) -> usize {
        self.tools.len()
    }

    pub fn list_tools(&self) -> Vec<ToolDescriptor> {
        self.tools.values().map(ToolDefinition::descriptor).collect()
    }

    pub fn list_resources(&self) -> Vec<ResourceDescriptor> {
        self.resources
            .values()
            .map(ResourceDefinition::descriptor)
            .collect()
    }

    pub fn list_prompts(&self) -> Vec<PromptDescriptor> {
        self.prompts
            .values()
            .map(PromptDefinition::descriptor)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use {super::*, crate::definition::*, serde_json::json};

    fn tool(name: &str, handler: &str) -> ToolRecord {
        ToolRecord {
            id: None,
            name: name.into(),
            description: format!("{name} tool"),
            input_schema: json!({"type": "object", "properties": {}}),
            handler: handler.into(),
        }
    }

    fn resource(name: &str, uri: &str) -> ResourceRecord {
        ResourceRecord {
            id: None,
            uri: uri.into(),
            name: name.into(),
            description: String::new(),
            mime_type: Some("text/plain".into()),
            handler: "static".into(),
            content: "hello".into(),
        }
    }

    #[test]
    fn load_lists_tools_sorted() {
        let catalog = ToolCatalog::load(CatalogRecords {
            tools: vec![tool("zeta", "execute_kw"), tool("alpha", "raw_call")],
            ..CatalogRecords::default()
        })
        .unwrap();
        let names: Vec<_> = catalog.list_tools().into_iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["alpha", "zeta"]);
        assert_eq!(catalog.lookup("zeta").unwrap().handler, HandlerKind::ExecuteKw);
        assert!(catalog.lookup("missing").is_none());
    }

    #[test]
    fn load_fails_fast_on_duplicate() {
        let err = ToolCatalog::load(CatalogRecords {
            tools: vec![tool("a", "execute_kw"), tool("a", "raw_call")],
            ..CatalogRecords::default()
        })
        .unwrap_err();
        assert_eq!(err, LoadError::Duplicate {
            kind: EntryKind::Tool,
            name: "a".into()
        });
    }

    #[test]
    fn load_fails_on_unknown_handler() {
        let err = ToolCatalog::load(CatalogRecords {
            tools: vec![tool("a", "execute_kw"), tool("b", "eval")],
            ..CatalogRecords::default()
        })
        .unwrap_err();
        assert!(err.to_string().contains("unknown handler kind 'eval'"));
    }

    #[test]
    fn register_rejects_existing_name() {
        let mut catalog = ToolCatalog::load(CatalogRecords {
            tools: vec![tool("a", "execute_kw")],
            ..CatalogRecords::default()
        })
        .unwrap();
        let dup = ToolDefinition::from_record(tool("a", "raw_call")).unwrap();
        assert!(catalog.register(dup).is_err());
        assert_eq!(catalog.lookup("a").unwrap().handler, HandlerKind::ExecuteKw);

        catalog
            .register(ToolDefinition::from_record(tool("b", "raw_call")).unwrap())
            .unwrap();
        assert_eq!(catalog.tool_count(), 2);
    }

    #[test]
    fn resources_unique_by_name_and_uri() {
        let mut catalog = ToolCatalog::new();
        catalog
            .register_resource(ResourceDefinition::from_record(resource("a", "doc://a")).unwrap())
            .unwrap();
        assert!(
            catalog
                .register_resource(
                    ResourceDefinition::from_record(resource("b", "doc://a")).unwrap()
                )
                .is_err()
        );
        assert_eq!(catalog.resource_by_uri("doc://a").unwrap().content, "hello");
        assert_eq!(catalog.list_resources().len(), 1);
    }
}
