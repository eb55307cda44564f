//! Startup wiring: database directory, store, migrations, handler.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use database::SqliteEntityStore;
use mcp_protocol::{McpServer, McpToolHandler};
use orchestrator_core::workflow::loader::WorkflowConfigLoader;
use tracing::info;

use crate::config::Config;

/// Make sure the directory holding a file-backed database exists.
pub fn ensure_database_directory_from_config(config: &Config) -> Result<()> {
    let url = config.database_url();
    if url.contains(":memory:") {
        return Ok(());
    }
    let path = url.trim_start_matches("sqlite://");
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create database directory {}", parent.display())
            })?;
            info!(directory = %parent.display(), "Created database directory");
        }
    }
    Ok(())
}

/// Connect, migrate, and build the tool handler.
pub async fn initialize_handler(
    config: &Config,
) -> Result<Arc<McpToolHandler<SqliteEntityStore>>> {
    let store = SqliteEntityStore::new(&config.database_url())
        .await
        .context("Failed to connect to database")?;
    store.migrate().await.context("Failed to run migrations")?;

    let loader = Arc::new(WorkflowConfigLoader::new(config.workflow.directory()));
    // Surface configuration problems at startup instead of first use.
    let workflow_config = loader.load();
    info!(
        task_flow_len = workflow_config.tasks.default_flow.len(),
        feature_flow_len = workflow_config.features.default_flow.len(),
        cascade_enabled = workflow_config.auto_cascade.enabled,
        "Workflow configuration active"
    );

    Ok(Arc::new(McpToolHandler::new(Arc::new(store), loader)))
}

/// Build the HTTP server around an initialized handler.
pub async fn initialize_app(config: &Config) -> Result<McpServer<SqliteEntityStore>> {
    let handler = initialize_handler(config).await?;
    Ok(McpServer::new(handler))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_database_needs_no_directory() {
        let mut config = Config::default();
        config.database.url = Some(":memory:".to_string());
        assert!(ensure_database_directory_from_config(&config).is_ok());
    }
}
