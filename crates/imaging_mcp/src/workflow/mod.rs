//! Workflow list and its execution.
//!
//! The list of pending tool invocations lives inside a single owner task
//! ([`host`]). Transport threads and local callers talk to it through a
//! cloneable [`WorkflowHandle`], which posts commands over a channel and
//! awaits the reply; nothing outside the owner ever touches the list. Runs
//! are delegated to the [`PipelineExecutor`], which reports step progress
//! back to the owner so that the owner stays the only mutator.

pub mod executor;
pub mod host;
pub mod serializer;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::args::Arguments;

pub use executor::{CancelFlag, PipelineExecutor, RunReport, StepEvent, StepFailure, StepOutcome};
pub use host::{ExecutionResult, WorkflowHandle, WorkflowHost};
pub use serializer::{WORKFLOW_VERSION, WorkflowFile, load_workflow, parse_workflow, save_workflow};

/// One pipeline step: a tool name and its arguments
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocation {
    pub name: String,
    #[serde(default)]
    pub parameters: Arguments,
}

impl ToolInvocation {
    pub fn new(name: impl Into<String>, parameters: Arguments) -> Self {
        Self { name: name.into(), parameters }
    }

    /// Cache key this step writes its image under, if any
    pub fn output_key(&self) -> Option<&str> {
        if self.name == "load_image" {
            self.parameters.first_string(&["output_key", "result_key"])
        } else {
            self.parameters.string("output_key")
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum StepStatus {
    #[default]
    Pending,
    Running,
    Completed,
    Error,
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StepStatus::Pending => "Pending",
            StepStatus::Running => "Running",
            StepStatus::Completed => "Completed",
            StepStatus::Error => "Error",
        };
        f.write_str(name)
    }
}

/// A step as held by the owner, with its runtime attributes
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowStep {
    pub invocation: ToolInvocation,
    pub status: StepStatus,
    /// Text summary of the last successful run
    pub result: Option<String>,
    pub error: Option<String>,
}

impl WorkflowStep {
    pub fn new(invocation: ToolInvocation) -> Self {
        Self {
            invocation,
            status: StepStatus::Pending,
            result: None,
            error: None,
        }
    }

    pub fn reset(&mut self) {
        self.status = StepStatus::Pending;
        self.result = None;
        self.error = None;
    }
}

/// Copy of the list handed out by `status`; mutating it changes nothing
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkflowSnapshot {
    pub steps: Vec<WorkflowStep>,
    pub running: bool,
}

impl WorkflowSnapshot {
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn count(&self, status: &StepStatus) -> usize {
        self.steps.iter().filter(|s| &s.status == status).count()
    }

    pub fn summary(&self) -> String {
        if self.steps.is_empty() {
            return "Workflow is empty".to_string();
        }

        let mut text = format!(
            "Workflow: {} tools total\n- Pending: {}\n- Running: {}\n- Completed: {}\n- Error: {}\n\nTools:",
            self.steps.len(),
            self.count(&StepStatus::Pending),
            self.count(&StepStatus::Running),
            self.count(&StepStatus::Completed),
            self.count(&StepStatus::Error),
        );
        for (i, step) in self.steps.iter().enumerate() {
            text.push_str(&format!("\n{}. {} [{}]", i + 1, step.invocation.name, step.status));
        }
        text
    }
}
