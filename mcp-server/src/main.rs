mod config;
mod setup;
mod stdio;
mod telemetry;

use anyhow::{Context, Result};
use clap::Parser;
use config::Config;
use setup::{ensure_database_directory_from_config, initialize_app, initialize_handler};
use stdio::StdioMcpServer;
use telemetry::{init_telemetry, log_config_validation, log_startup_info};
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "task-orchestrator")]
#[command(about = "Task orchestration MCP server")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Serve over stdio (for MCP clients spawning the process) instead of HTTP
    #[arg(long)]
    stdio: bool,

    /// Port to listen on (HTTP mode)
    #[arg(long, default_value = "3000")]
    port: u16,

    /// Configuration file path
    #[arg(short, long, env = "CONFIG_FILE")]
    config: Option<String>,

    /// Database URL override
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// Directory containing workflows.yaml
    #[arg(long, env = "WORKFLOW_DIR")]
    workflow_dir: Option<String>,

    /// Listen address override (default: 127.0.0.1)
    #[arg(long, env = "LISTEN_ADDR")]
    listen_addr: Option<String>,

    /// Log level override
    #[arg(long, env = "LOG_LEVEL")]
    log_level: Option<String>,
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(config_file) => Config::from_file(config_file)?,
        None => Config::from_env()?,
    };

    if let Some(ref database_url) = cli.database_url {
        config.database.url = Some(database_url.clone());
    }
    if let Some(ref workflow_dir) = cli.workflow_dir {
        config.workflow.dir = workflow_dir.clone();
    }
    if let Some(ref listen_addr) = cli.listen_addr {
        config.server.listen_addr = listen_addr.clone();
    }
    config.server.port = cli.port;
    if let Some(ref log_level) = cli.log_level {
        config.logging.level = log_level.clone();
    }

    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;

    init_telemetry(&config.logging).context("Failed to initialize telemetry")?;
    log_config_validation(&config);
    config.validate().context("Invalid configuration")?;

    ensure_database_directory_from_config(&config)?;
    log_startup_info(&config);

    if cli.stdio {
        // STDIO mode: the MCP client owns the process lifecycle.
        let handler = initialize_handler(&config)
            .await
            .context("Failed to initialize application")?;
        StdioMcpServer::new(handler).serve().await?;
        return Ok(());
    }

    let server = initialize_app(&config)
        .await
        .context("Failed to initialize application")?;

    let server_addr = config.server_address();
    info!("Serving HTTP on {server_addr}");

    tokio::select! {
        result = server.serve(&server_addr) => {
            match result {
                Ok(()) => info!("MCP server shut down cleanly"),
                Err(e) => {
                    error!(error = %e, "MCP server error");
                    return Err(anyhow::anyhow!("server failed: {e}"));
                }
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received, stopping server");
        }
    }

    Ok(())
}
