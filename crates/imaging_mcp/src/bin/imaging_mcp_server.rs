//cargo run --package imaging_mcp --bin imaging_mcp_server
use imaging_mcp::{LogConfig, ServerConfig, ServerLauncher, TransportMode, init_logging};

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    // stdout carries the protocol, so logs go to stderr
    init_logging(&LogConfig::default())?;

    let config = ServerConfig {
        transport: TransportMode::Stdio,
        ..ServerConfig::default()
    };

    let mut launcher = ServerLauncher::new(config);
    if !launcher.start().await {
        return Err(color_eyre::eyre::eyre!("Failed to start MCP server"));
    }

    launcher.wait().await;
    tracing::info!("MCP server shut down");
    Ok(())
}
