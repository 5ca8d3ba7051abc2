use anyhow::Context as _;
use clap::Parser as _;
use rmcp::{RoleServer, ServiceExt};
use tracing_subscriber::EnvFilter;
use victualia_mcp::cli::{Cli, LogFormat};
use victualia_mcp::registry::ToolRegistry;
use victualia_mcp::server::VictualiaServer;
use victualia_openapi_tools::OpenApiToolSource;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    let config = cli.api_config();
    tracing::info!(spec = %config.spec, base_url = %config.base_url, "Starting Victualia MCP server");

    let source = OpenApiToolSource::new(config);
    let catalog = source.start(cli.startup_timeout()).await;
    let registry = ToolRegistry::new(&source, &catalog);
    tracing::info!(tools = registry.len(), "Registered tools");

    let server = VictualiaServer::new(registry, catalog.info().clone());
    let service = ServiceExt::<RoleServer>::serve(server, rmcp::transport::stdio())
        .await
        .inspect_err(|e| tracing::error!(error = %e, "Failed to start stdio transport"))
        .context("start MCP stdio server")?;
    service.waiting().await.context("MCP stdio server")?;

    tracing::info!("Client disconnected; shutting down");
    Ok(())
}

/// Logs go to stderr; stdout carries the MCP stream.
fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.with_ansi(false).init(),
    }
}
