use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ServerError;
use crate::registry::ToolRegistry;
use crate::workflow::ToolInvocation;

pub const WORKFLOW_VERSION: &str = "1.0";

/// On-disk workflow: `{"version": "1.0", "tools": [{"name", "parameters"}]}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowFile {
    pub version: String,
    pub tools: Vec<ToolInvocation>,
}

impl WorkflowFile {
    pub fn new(tools: Vec<ToolInvocation>) -> Self {
        Self { version: WORKFLOW_VERSION.to_string(), tools }
    }

    /// Reject unknown versions, empty lists and tools outside `vocabulary`
    pub fn validate(&self, vocabulary: &ToolRegistry) -> Result<(), ServerError> {
        if self.version != WORKFLOW_VERSION {
            return Err(ServerError::InvalidWorkflow(format!(
                "unsupported version '{}', expected '{}'",
                self.version, WORKFLOW_VERSION
            )));
        }
        if self.tools.is_empty() {
            return Err(ServerError::InvalidWorkflow("no tools listed".to_string()));
        }
        if let Some(unknown) = self.tools.iter().find(|t| !vocabulary.contains(&t.name)) {
            return Err(ServerError::InvalidWorkflow(format!("unknown tool '{}'", unknown.name)));
        }
        Ok(())
    }
}

pub fn parse_workflow(text: &str, vocabulary: &ToolRegistry) -> Result<Vec<ToolInvocation>, ServerError> {
    let file: WorkflowFile = serde_json::from_str(text)?;
    file.validate(vocabulary)?;
    Ok(file.tools)
}

pub fn load_workflow(path: &Path, vocabulary: &ToolRegistry) -> Result<Vec<ToolInvocation>, ServerError> {
    let text = std::fs::read_to_string(path)?;
    let tools = parse_workflow(&text, vocabulary)?;
    tracing::info!("Loaded {} workflow steps from {}", tools.len(), path.display());
    Ok(tools)
}

pub fn save_workflow(path: &Path, tools: &[ToolInvocation]) -> Result<(), ServerError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(&WorkflowFile::new(tools.to_vec()))?;
    std::fs::write(path, json)?;
    Ok(())
}
