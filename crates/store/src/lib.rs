//! Persistence for catalog records and per-client configurations.

pub mod sqlite;

use {
    async_trait::async_trait,
    bridgeway_catalog::{CatalogRecords, PromptRecord, ResourceRecord, ToolRecord},
    bridgeway_config::CallProfile,
    serde::{Deserialize, Serialize},
    serde_json::Value,
};

pub use sqlite::SqliteStore;

/// A stored per-client configuration row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredConfiguration {
    /// Row id; defaults to the client id.
    #[serde(default)]
    pub id: Option<String>,
    pub client_id: String,
    /// Partial call profile, kept as JSON.
    pub config: Value,
}

impl StoredConfiguration {
    /// Decode the JSON column into a partial call profile.
    pub fn profile(&self) -> anyhow::Result<CallProfile> {
        Ok(serde_json::from_value(self.config.clone())?)
    }
}

#[async_trait]
pub trait CatalogStore: Send + Sync {
    // ---- catalog ----
    async fn upsert_tool(&self, tool: &ToolRecord) -> anyhow::Result<()>;
    async fn list_tools(&self) -> anyhow::Result<Vec<ToolRecord>>;
    async fn upsert_resource(&self, resource: &ResourceRecord) -> anyhow::Result<()>;
    async fn list_resources(&self) -> anyhow::Result<Vec<ResourceRecord>>;
    async fn upsert_prompt(&self, prompt: &PromptRecord) -> anyhow::Result<()>;
    async fn list_prompts(&self) -> anyhow::Result<Vec<PromptRecord>>;

    /// Every catalog row, ready for `ToolCatalog::load`.
    async fn load_catalog_records(&self) -> anyhow::Result<CatalogRecords> {
        Ok(CatalogRecords {
            tools: self.list_tools().await?,
            resources: self.list_resources().await?,
            prompts: self.list_prompts().await?,
        })
    }

    // ---- configurations ----
    async fn upsert_configuration(&self, config: &StoredConfiguration) -> anyhow::Result<()>;
    async fn get_configuration(
        &self,
        client_id: &str,
    ) -> anyhow::Result<Option<StoredConfiguration>>;

    /// The stored profile for `client_id`, if one exists.
    async fn configuration_for_client(&self, client_id: &str) -> anyhow::Result<Option<CallProfile>> {
        match self.get_configuration(client_id).await? {
            Some(row) => Ok(Some(row.profile()?)),
            None => Ok(None),
        }
    }
}
