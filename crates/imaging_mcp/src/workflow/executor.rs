use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use rmcp::model::Content;
use serde_json::Value;

use crate::registry::ToolRegistry;
use crate::workflow::ToolInvocation;

/// Shared cancellation flag for the run in flight
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Summary text on success, error message on failure
pub type StepOutcome = std::result::Result<String, String>;

#[derive(Debug, Clone, PartialEq)]
pub enum StepEvent {
    Started(usize),
    Finished(usize, StepOutcome),
}

#[derive(Debug, Clone, PartialEq)]
pub struct StepFailure {
    pub index: usize,
    pub tool: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunReport {
    pub total: usize,
    pub completed: usize,
    pub failures: Vec<StepFailure>,
    pub cancelled: bool,
}

impl RunReport {
    pub fn errors(&self) -> usize {
        self.failures.len()
    }
}

/// Runs a list of invocations one after another against a tool registry.
///
/// A failing step is recorded and the run moves on to the next one; later
/// steps that depended on its output fail with their own input errors.
#[derive(Debug, Clone)]
pub struct PipelineExecutor {
    registry: Arc<ToolRegistry>,
}

impl PipelineExecutor {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Execute `steps` in order, reporting progress through `observer`.
    /// The flag is checked before each step starts and again once it finishes;
    /// steps not reached stay pending.
    pub async fn run<F>(&self, steps: Vec<ToolInvocation>, cancel: &CancelFlag, mut observer: F) -> RunReport
    where
        F: FnMut(StepEvent),
    {
        let mut report = RunReport { total: steps.len(), ..RunReport::default() };

        for (index, step) in steps.into_iter().enumerate() {
            if cancel.is_cancelled() {
                tracing::info!("Workflow cancelled before step {}", index + 1);
                report.cancelled = true;
                break;
            }

            observer(StepEvent::Started(index));
            tracing::info!("Running workflow step {}: {}", index + 1, step.name);

            let outcome = match self.registry.invoke(&step.name, step.parameters).await {
                Ok(content) => {
                    report.completed += 1;
                    Ok(first_text(&content).unwrap_or_else(|| format!("{} completed", step.name)))
                }
                Err(err) => {
                    let message = err.to_string();
                    tracing::warn!("Workflow step {} ({}) failed: {}", index + 1, step.name, message);
                    report.failures.push(StepFailure {
                        index,
                        tool: step.name.clone(),
                        message: message.clone(),
                    });
                    Err(message)
                }
            };
            observer(StepEvent::Finished(index, outcome));

            if cancel.is_cancelled() {
                tracing::info!("Workflow cancelled after step {}", index + 1);
                report.cancelled = true;
                break;
            }
        }

        report
    }
}

fn first_text(content: &[Content]) -> Option<String> {
    content.iter().find_map(|item| match serde_json::to_value(item) {
        Ok(Value::Object(map)) if map.get("type").and_then(Value::as_str) == Some("text") => {
            map.get("text").and_then(Value::as_str).map(str::to_string)
        }
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args::Arguments;
    use crate::error::ToolError;
    use crate::registry::{ToolCategory, ToolSpec};
    use schemars::JsonSchema;
    use serde::Deserialize;

    #[derive(Deserialize, JsonSchema)]
    struct NoArgs {}

    fn registry(cancel_on_first: Option<CancelFlag>) -> Arc<ToolRegistry> {
        let mut registry = ToolRegistry::new();
        registry.register_blocking(ToolSpec::new::<NoArgs>("ok", "succeeds", ToolCategory::Image), move |_| {
            if let Some(flag) = &cancel_on_first {
                flag.cancel();
            }
            Ok(vec![Content::text("fine")])
        });
        registry.register_blocking(ToolSpec::new::<NoArgs>("fail", "fails", ToolCategory::Image), |_| {
            Err(ToolError::missing("nothing to do"))
        });
        Arc::new(registry)
    }

    fn step(name: &str) -> ToolInvocation {
        ToolInvocation::new(name, Arguments::new())
    }

    #[tokio::test]
    async fn test_failure_does_not_stop_the_run() {
        let executor = PipelineExecutor::new(registry(None));
        let mut events = Vec::new();
        let report = executor
            .run(vec![step("fail"), step("ok")], &CancelFlag::new(), |e| events.push(e))
            .await;

        assert_eq!(report.total, 2);
        assert_eq!(report.completed, 1);
        assert_eq!(report.errors(), 1);
        assert_eq!(report.failures[0].message, "nothing to do");
        assert!(!report.cancelled);
        assert_eq!(events.last(), Some(&StepEvent::Finished(1, Ok("fine".to_string()))));
    }

    #[tokio::test]
    async fn test_cancel_leaves_remaining_steps_unreached() {
        let flag = CancelFlag::new();
        let executor = PipelineExecutor::new(registry(Some(flag.clone())));
        let mut started = Vec::new();
        let report = executor
            .run(vec![step("ok"), step("ok"), step("ok")], &flag, |e| {
                if let StepEvent::Started(i) = e {
                    started.push(i);
                }
            })
            .await;

        assert!(report.cancelled);
        assert_eq!(report.completed, 1);
        assert_eq!(started, vec![0]);
    }

    #[tokio::test]
    async fn test_cancel_during_last_step_marks_run_cancelled() {
        let flag = CancelFlag::new();
        let executor = PipelineExecutor::new(registry(Some(flag.clone())));
        let mut events = Vec::new();
        let report = executor.run(vec![step("ok")], &flag, |e| events.push(e)).await;

        assert!(report.cancelled);
        assert_eq!(report.completed, 1);
        assert_eq!(events.last(), Some(&StepEvent::Finished(0, Ok("fine".to_string()))));
    }

    #[tokio::test]
    async fn test_unknown_step_is_recorded_as_failure() {
        let executor = PipelineExecutor::new(registry(None));
        let report = executor.run(vec![step("missing")], &CancelFlag::new(), |_| {}).await;
        assert_eq!(report.failures[0].message, "Unknown tool: missing");
    }
}
