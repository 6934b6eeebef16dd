use std::path::PathBuf;

use clap::{Parser, Subcommand};
use cli::{ServeOverrides, resolve_config, run_workflow, tool_listing};
use color_eyre::eyre::{Result, eyre};
use imaging_mcp::{LogConfig, ServerLauncher, TransportMode, init_logging};
use tracing::info;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the MCP server
    Serve {
        /// Path to a TOML or JSON server configuration
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Transport: stdio or http
        #[arg(long)]
        mode: Option<TransportMode>,
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
        /// HTTP endpoint path
        #[arg(long)]
        endpoint: Option<String>,
        /// Do not attach a workflow owner; workflow tools report unavailable
        #[arg(long)]
        headless: bool,
        /// Also write logs to a file in the log directory
        #[arg(long)]
        log_capture: bool,
        #[arg(long)]
        log_dir: Option<PathBuf>,
    },
    /// Execute a saved workflow file without a server
    Run {
        /// Path to the workflow JSON
        #[arg(short, long)]
        workflow: PathBuf,
        /// Directory to write the produced images to
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },
    /// List the available tools
    Tools {
        /// Print the full JSON schemas
        #[arg(long)]
        schema: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { config, mode, host, port, endpoint, headless, log_capture, log_dir } => {
            let overrides = ServeOverrides { mode, host, port, endpoint, headless, log_capture, log_dir };
            serve(config, overrides).await?;
        }
        Commands::Run { workflow, output_dir } => {
            init_logging(&LogConfig::default())?;
            let run = run_workflow(&workflow, output_dir.as_deref()).await?;
            println!("{}\n", run.steps.summary());
            print!("{}", run.result.summary());
        }
        Commands::Tools { schema } => {
            print!("{}", tool_listing(schema)?);
            if schema {
                println!();
            }
        }
    }

    Ok(())
}

async fn serve(config: Option<PathBuf>, overrides: ServeOverrides) -> Result<()> {
    let config = resolve_config(config.as_deref(), &overrides)?;
    init_logging(&config.log)?;
    let mode = config.transport;

    let mut launcher = ServerLauncher::new(config);
    if !launcher.start().await {
        return Err(eyre!("Failed to start MCP server"));
    }

    match mode {
        TransportMode::Stdio => launcher.wait().await,
        TransportMode::Http => {
            tokio::select! {
                _ = launcher.wait() => {}
                _ = tokio::signal::ctrl_c() => info!("Received Ctrl+C, shutting down gracefully"),
            }
            launcher.shutdown().await;
        }
    }

    info!("MCP server shut down");
    Ok(())
}
