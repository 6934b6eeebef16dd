//! Bridge tools that drive the workflow list through its owner.
//!
//! Without an attached owner (headless deployments) every bridge tool fails
//! with `UI not initialized`.

use rmcp::model::Content;
use schemars::JsonSchema;
use serde::Deserialize;

use crate::args::{Arguments, JsonObject};
use crate::error::ToolError;
use crate::registry::{ToolCategory, ToolOutput, ToolRegistry, ToolSpec};
use crate::tools::image_content;
use crate::workflow::WorkflowHandle;

#[derive(Debug, Deserialize, JsonSchema)]
pub struct AddToWorkflowRequest {
    #[schemars(description = "Name of the image tool to append")]
    #[serde(alias = "tool_name")]
    pub tool: String,
    #[schemars(description = "Arguments for the tool; unspecified ones take the tool's defaults")]
    #[serde(default)]
    pub parameters: JsonObject,
}

#[derive(Debug, Default, Deserialize, JsonSchema)]
pub struct EmptyRequest {}

fn attached(workflow: Option<WorkflowHandle>) -> Result<WorkflowHandle, ToolError> {
    workflow.ok_or(ToolError::UiUnavailable)
}

pub async fn add_to_workflow(workflow: Option<WorkflowHandle>, args: Arguments) -> ToolOutput {
    let workflow = attached(workflow)?;
    let req: AddToWorkflowRequest = args.parse()?;
    let position = workflow.add(&req.tool, Arguments::from(req.parameters)).await?;
    Ok(vec![Content::text(format!(
        "Added '{}' to workflow (position {})",
        req.tool, position
    ))])
}

pub async fn clear_workflow(workflow: Option<WorkflowHandle>, _args: Arguments) -> ToolOutput {
    let removed = attached(workflow)?.clear().await?;
    Ok(vec![Content::text(format!("Cleared workflow ({removed} tools removed)"))])
}

pub async fn get_workflow_status(workflow: Option<WorkflowHandle>, _args: Arguments) -> ToolOutput {
    let snapshot = attached(workflow)?.status().await?;
    Ok(vec![Content::text(snapshot.summary())])
}

pub async fn execute_workflow(workflow: Option<WorkflowHandle>, _args: Arguments) -> ToolOutput {
    let result = attached(workflow)?.execute().await?;
    let mut content = Vec::with_capacity(result.images.len() + 1);
    content.push(Content::text(result.summary()));
    for (_, image) in &result.images {
        content.push(image_content(image)?);
    }
    Ok(content)
}

pub fn register(registry: &mut ToolRegistry, workflow: Option<WorkflowHandle>) {
    use ToolCategory::Workflow;

    let handle = workflow.clone();
    registry.register(
        ToolSpec::new::<AddToWorkflowRequest>(
            "add_to_workflow",
            "Append an image tool with its parameters to the workflow",
            Workflow,
        ),
        move |args| add_to_workflow(handle.clone(), args),
    );
    let handle = workflow.clone();
    registry.register(
        ToolSpec::new::<EmptyRequest>("clear_workflow", "Remove every tool from the workflow", Workflow),
        move |args| clear_workflow(handle.clone(), args),
    );
    let handle = workflow.clone();
    registry.register(
        ToolSpec::new::<EmptyRequest>(
            "get_workflow_status",
            "Report the workflow's tools and the status of each",
            Workflow,
        ),
        move |args| get_workflow_status(handle.clone(), args),
    );
    registry.register(
        ToolSpec::new::<EmptyRequest>(
            "execute_workflow",
            "Run the workflow and return the images produced by its completed tools",
            Workflow,
        ),
        move |args| execute_workflow(workflow.clone(), args),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{ToolContext, catalog};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_headless_bridge_reports_ui_unavailable() {
        let registry = catalog(&Arc::new(ToolContext::new()), None);
        assert_eq!(registry.len(), 14);

        for name in ["add_to_workflow", "clear_workflow", "get_workflow_status", "execute_workflow"] {
            let err = registry.invoke(name, Arguments::new()).await.unwrap_err();
            assert!(matches!(err, ToolError::UiUnavailable), "{name}");
        }
    }
}
