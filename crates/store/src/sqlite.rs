use {
    async_trait::async_trait,
    bridgeway_catalog::{PromptRecord, ResourceRecord, ToolRecord},
    serde_json::Value,
    sqlx::{SqlitePool, sqlite::SqlitePoolOptions},
    tracing::{debug, info},
};

use crate::{CatalogStore, StoredConfiguration};

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS tools (
        id           TEXT PRIMARY KEY,
        name         TEXT NOT NULL UNIQUE,
        description  TEXT NOT NULL DEFAULT '',
        input_schema TEXT NOT NULL DEFAULT '{}',
        handler      TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS resources (
        id          TEXT PRIMARY KEY,
        uri         TEXT NOT NULL UNIQUE,
        name        TEXT NOT NULL UNIQUE,
        description TEXT NOT NULL DEFAULT '',
        mime_type   TEXT,
        handler     TEXT NOT NULL,
        content     TEXT NOT NULL DEFAULT ''
    )",
    "CREATE TABLE IF NOT EXISTS prompts (
        id          TEXT PRIMARY KEY,
        name        TEXT NOT NULL UNIQUE,
        description TEXT NOT NULL DEFAULT '',
        arguments   TEXT NOT NULL DEFAULT '{}',
        handler     TEXT NOT NULL,
        template    TEXT NOT NULL DEFAULT ''
    )",
    "CREATE TABLE IF NOT EXISTS configurations (
        id        TEXT PRIMARY KEY,
        client_id TEXT NOT NULL UNIQUE,
        config    TEXT NOT NULL
    )",
];

/// SQLite-backed [`CatalogStore`].
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to `url` and create the tables.
    pub async fn connect(url: &str) -> anyhow::Result<Self> {
        let pool = SqlitePoolOptions::new().max_connections(5).connect(url).await?;
        let store = Self::new(pool);
        store.init().await?;
        info!(url, "store ready");
        Ok(store)
    }

    /// Create tables if they are missing.
    pub async fn init(&self) -> anyhow::Result<()> {
        for stmt in SCHEMA {
            sqlx::query(stmt).execute(&self.pool).await?;
        }
        Ok(())
    }
}

fn row_id(id: &Option<String>, fallback: &str) -> String {
    id.clone().unwrap_or_else(|| fallback.to_string())
}

fn parse_json(raw: &str, column: &str, id: &str) -> anyhow::Result<Value> {
    serde_json::from_str(raw)
        .map_err(|e| anyhow::anyhow!("row '{id}' has invalid JSON in {column}: {e}"))
}

#[async_trait]
impl CatalogStore for SqliteStore {
    async fn upsert_tool(&self, tool: &ToolRecord) -> anyhow::Result<()> {
        let id = row_id(&tool.id, &tool.name);
        sqlx::query(
            "INSERT INTO tools (id, name, description, input_schema, handler)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                description = excluded.description,
                input_schema = excluded.input_schema,
                handler = excluded.handler",
        )
        .bind(&id)
        .bind(&tool.name)
        .bind(&tool.description)
        .bind(tool.input_schema.to_string())
        .bind(&tool.handler)
        .execute(&self.pool)
        .await?;
        debug!(id = %id, name = %tool.name, "tool saved");
        Ok(())
    }

    async fn list_tools(&self) -> anyhow::Result<Vec<ToolRecord>> {
        let rows: Vec<(String, String, String, String, String)> = sqlx::query_as(
            "SELECT id, name, description, input_schema, handler FROM tools ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter()
            .map(|(id, name, description, schema, handler)| -> anyhow::Result<ToolRecord> {
                Ok(ToolRecord {
                    input_schema: parse_json(&schema, "input_schema", &id)?,
                    id: Some(id),
                    name,
                    description,
                    handler,
                })
            })
            .collect()
    }

    async fn upsert_resource(&self, resource: &ResourceRecord) -> anyhow::Result<()> {
        let id = row_id(&resource.id, &resource.name);
        sqlx::query(
            "INSERT INTO resources (id, uri, name, description, mime_type, handler, content)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                uri = excluded.uri,
                name = excluded.name,
                description = excluded.description,
                mime_type = excluded.mime_type,
                handler = excluded.handler,
                content = excluded.content",
        )
        .bind(&id)
        .bind(&resource.uri)
        .bind(&resource.name)
        .bind(&resource.description)
        .bind(&resource.mime_type)
        .bind(&resource.handler)
        .bind(&resource.content)
        .execute(&self.pool)
        .await?;
        debug!(id = %id, uri = %resource.uri, "resource saved");
        Ok(())
    }

    async fn list_resources(&self) -> anyhow::Result<Vec<ResourceRecord>> {
        let rows: Vec<(String, String, String, String, Option<String>, String, String)> =
            sqlx::query_as(
                "SELECT id, uri, name, description, mime_type, handler, content
                 FROM resources ORDER BY name",
            )
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .into_iter()
            .map(
                |(id, uri, name, description, mime_type, handler, content)| ResourceRecord {
                    id: Some(id),
                    uri,
                    name,
                    description,
                    mime_type,
                    handler,
                    content,
                },
            )
            .collect())
    }

    async fn upsert_prompt(&self, prompt: &PromptRecord) -> anyhow::Result<()> {
        let id = row_id(&prompt.id, &prompt.name);
        sqlx::query(
            "INSERT INTO prompts (id, name, description, arguments, handler, template)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                description = excluded.description,
                arguments = excluded.arguments,
                handler = excluded.handler,
                template = excluded.template",
        )
        .bind(&id)
        .bind(&prompt.name)
        .bind(&prompt.description)
        .bind(prompt.arguments.to_string())
        .bind(&prompt.handler)
        .bind(&prompt.template)
        .execute(&self.pool)
        .await?;
        debug!(id = %id, name = %prompt.name, "prompt saved");
        Ok(())
    }

    async fn list_prompts(&self) -> anyhow::Result<Vec<PromptRecord>> {
        let rows: Vec<(String, String, String, String, String, String)> = sqlx::query_as(
            "SELECT id, name, description, arguments, handler, template
             FROM prompts ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter()
            .map(|(id, name, description, arguments, handler, template)| -> anyhow::Result<PromptRecord> {
                Ok(PromptRecord {
                    arguments: parse_json(&arguments, "arguments", &id)?,
                    id: Some(id),
                    name,
                    description,
                    handler,
                    template,
                })
            })
            .collect()
    }

    async fn upsert_configuration(&self, config: &StoredConfiguration) -> anyhow::Result<()> {
        let id = row_id(&config.id, &config.client_id);
        sqlx::query(
            "INSERT INTO configurations (id, client_id, config)
             VALUES (?, ?, ?)
             ON CONFLICT(client_id) DO UPDATE SET
                id = excluded.id,
                config = excluded.config",
        )
        .bind(&id)
        .bind(&config.client_id)
        .bind(config.config.to_string())
        .execute(&self.pool)
        .await?;
        debug!(id = %id, client_id = %config.client_id, "configuration saved");
        Ok(())
    }

    async fn get_configuration(
        &self,
        client_id: &str,
    ) -> anyhow::Result<Option<StoredConfiguration>> {
        let row: Option<(String, String, String)> = sqlx::query_as(
            "SELECT id, client_id, config FROM configurations WHERE client_id = ?",
        )
        .bind(client_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(|(id, client_id, config)| -> anyhow::Result<StoredConfiguration> {
            Ok(StoredConfiguration {
                config: parse_json(&config, "config", &id)?,
                id: Some(id),
                client_id,
            })
        })
        .transpose()
    }
}
