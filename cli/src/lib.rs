use std::path::{Path, PathBuf};
use std::sync::Arc;

use imaging_mcp::{
    ExecutionResult, ServerConfig, ServerError, ToolCategory, ToolContext, ToolError, TransportMode, WorkflowHost,
    WorkflowSnapshot, catalog, image_tools, workflow::load_workflow,
};
use thiserror::Error;
use vision::VisionError;

#[derive(Error, Debug)]
pub enum CliError {
    #[error(transparent)]
    Server(#[from] ServerError),
    #[error(transparent)]
    Tool(#[from] ToolError),
    #[error(transparent)]
    Vision(#[from] VisionError),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Command-line settings that take precedence over the config file
#[derive(Debug, Clone, Default)]
pub struct ServeOverrides {
    pub mode: Option<TransportMode>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub endpoint: Option<String>,
    pub headless: bool,
    pub log_capture: bool,
    pub log_dir: Option<PathBuf>,
}

impl ServeOverrides {
    pub fn apply(&self, config: &mut ServerConfig) {
        if let Some(mode) = self.mode {
            config.transport = mode;
        }
        if let Some(host) = &self.host {
            config.http.host = host.clone();
        }
        if let Some(port) = self.port {
            config.http.port = port;
        }
        if let Some(endpoint) = &self.endpoint {
            config.http.endpoint = endpoint.clone();
        }
        if self.headless {
            config.workflow.attach = false;
        }
        if self.log_capture {
            config.log.capture = true;
        }
        if let Some(dir) = &self.log_dir {
            config.log.directory = dir.clone();
        }
    }
}

/// Config file if given, defaults otherwise, then the overrides
pub fn resolve_config(path: Option<&Path>, overrides: &ServeOverrides) -> Result<ServerConfig, CliError> {
    let mut config = match path {
        Some(path) => ServerConfig::from_file(path)?,
        None => ServerConfig::default(),
    };
    overrides.apply(&mut config);
    Ok(config)
}

/// Outcome of a local run: the execution summary plus the final per-step status
pub struct WorkflowRun {
    pub result: ExecutionResult,
    pub steps: WorkflowSnapshot,
}

/// Run a saved workflow locally and optionally write the produced images to `save_dir`
pub async fn run_workflow(path: &Path, save_dir: Option<&Path>) -> Result<WorkflowRun, CliError> {
    let ctx = Arc::new(ToolContext::new());
    let vocabulary = Arc::new(image_tools(&ctx));
    let steps = load_workflow(path, &vocabulary)?;

    let workflow = WorkflowHost::spawn(Arc::clone(&ctx), vocabulary);
    for step in steps {
        workflow.add(&step.name, step.parameters).await?;
    }
    let result = workflow.execute().await?;
    let steps = workflow.status().await?;

    if let Some(dir) = save_dir {
        for (key, image) in &result.images {
            let path = dir.join(format!("{key}.png"));
            vision::io::save(image, &path)?;
            tracing::info!("Saved '{}' to {}", key, path.display());
        }
    }
    Ok(WorkflowRun { result, steps })
}

/// One line per tool, or the full JSON schemas
pub fn tool_listing(with_schema: bool) -> Result<String, CliError> {
    let registry = catalog(&Arc::new(ToolContext::new()), None);
    if with_schema {
        return Ok(serde_json::to_string_pretty(&registry.tools())?);
    }

    let mut listing = String::new();
    for spec in registry.specs() {
        let marker = match spec.category {
            ToolCategory::Image => "",
            ToolCategory::Workflow => " (workflow)",
        };
        listing.push_str(&format!("{}{}: {}\n", spec.name, marker, spec.description));
    }
    Ok(listing)
}
