use std::sync::Arc;

use image::DynamicImage;
use tokio::sync::{mpsc, oneshot};

use crate::args::{Arguments, JsonObject};
use crate::error::{Result, ToolError};
use crate::registry::ToolRegistry;
use crate::tools::ToolContext;
use crate::workflow::{
    CancelFlag, PipelineExecutor, RunReport, StepEvent, StepStatus, ToolInvocation, WorkflowSnapshot, WorkflowStep,
};

const COMMAND_BUFFER: usize = 32;

/// Outcome of `execute`: the run report and the images the completed steps cached
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub report: RunReport,
    pub images: Vec<(String, Arc<DynamicImage>)>,
}

impl ExecutionResult {
    pub fn summary(&self) -> String {
        let mut text = format!(
            "Workflow execution completed!\n- Total tools: {}\n- Completed: {}\n- Errors: {}\n- Images generated: {}\n",
            self.report.total,
            self.report.completed,
            self.report.errors(),
            self.images.len()
        );
        for failure in &self.report.failures {
            text.push_str(&format!("- {}: {}\n", failure.tool, failure.message));
        }
        if self.report.cancelled {
            text.push_str("- Cancelled\n");
        }
        text
    }
}

enum Command {
    Add {
        tool: String,
        parameters: Arguments,
        reply: oneshot::Sender<Result<usize>>,
    },
    Clear {
        reply: oneshot::Sender<Result<usize>>,
    },
    Status {
        reply: oneshot::Sender<WorkflowSnapshot>,
    },
    Execute {
        reply: oneshot::Sender<Result<ExecutionResult>>,
    },
}

enum HostEvent {
    Step(StepEvent),
    RunFinished(Result<RunReport>),
}

/// Cloneable front door to the workflow owner task
#[derive(Debug, Clone)]
pub struct WorkflowHandle {
    commands: mpsc::Sender<Command>,
    cancel: CancelFlag,
}

impl WorkflowHandle {
    async fn request<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(make(reply))
            .await
            .map_err(|_| ToolError::UiUnavailable)?;
        response.await.map_err(|_| ToolError::UiUnavailable)
    }

    /// Append a step; returns the new list length
    pub async fn add(&self, tool: &str, parameters: Arguments) -> Result<usize> {
        let tool = tool.to_string();
        self.request(|reply| Command::Add { tool, parameters, reply }).await?
    }

    /// Remove every step; returns how many were removed
    pub async fn clear(&self) -> Result<usize> {
        self.request(|reply| Command::Clear { reply }).await?
    }

    pub async fn status(&self) -> Result<WorkflowSnapshot> {
        self.request(|reply| Command::Status { reply }).await
    }

    /// Run the whole list and wait for it to finish
    pub async fn execute(&self) -> Result<ExecutionResult> {
        self.request(|reply| Command::Execute { reply }).await?
    }

    /// Ask the run in flight to stop before its next step
    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}

struct ActiveRun {
    len: usize,
    reply: oneshot::Sender<Result<ExecutionResult>>,
}

/// Owner of the workflow list. Runs as one task; every mutation happens here.
pub struct WorkflowHost {
    steps: Vec<WorkflowStep>,
    ctx: Arc<ToolContext>,
    executor: PipelineExecutor,
    cancel: CancelFlag,
    events: mpsc::UnboundedSender<HostEvent>,
    active: Option<ActiveRun>,
}

impl WorkflowHost {
    /// Start the owner task on the current runtime. `vocabulary` holds the tools
    /// steps may name; `ctx` is where their images are collected from.
    pub fn spawn(ctx: Arc<ToolContext>, vocabulary: Arc<ToolRegistry>) -> WorkflowHandle {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let cancel = CancelFlag::new();

        let host = WorkflowHost {
            steps: Vec::new(),
            ctx,
            executor: PipelineExecutor::new(vocabulary),
            cancel: cancel.clone(),
            events: event_tx,
            active: None,
        };
        tokio::spawn(host.run(command_rx, event_rx));

        WorkflowHandle { commands: command_tx, cancel }
    }

    async fn run(mut self, mut commands: mpsc::Receiver<Command>, mut events: mpsc::UnboundedReceiver<HostEvent>) {
        tracing::debug!("Workflow host started");
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => self.handle(command),
                    None => break,
                },
                Some(event) = events.recv() => self.apply(event),
            }
        }
        tracing::debug!("Workflow host stopped");
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::Add { tool, parameters, reply } => {
                let _ = reply.send(self.add(&tool, parameters));
            }
            Command::Clear { reply } => {
                let result = if self.active.is_some() {
                    Err(ToolError::WorkflowBusy)
                } else {
                    let removed = self.steps.len();
                    self.steps.clear();
                    tracing::info!("Cleared workflow ({} steps)", removed);
                    Ok(removed)
                };
                let _ = reply.send(result);
            }
            Command::Status { reply } => {
                let _ = reply.send(WorkflowSnapshot {
                    steps: self.steps.clone(),
                    running: self.active.is_some(),
                });
            }
            Command::Execute { reply } => {
                if self.active.is_some() {
                    let _ = reply.send(Err(ToolError::WorkflowBusy));
                } else if self.steps.is_empty() {
                    let _ = reply.send(Err(ToolError::EmptyWorkflow));
                } else {
                    self.start_run(reply);
                }
            }
        }
    }

    fn add(&mut self, tool: &str, parameters: Arguments) -> Result<usize> {
        let spec = self
            .executor
            .registry()
            .spec(tool)
            .ok_or_else(|| ToolError::UnknownTool(tool.to_string()))?;

        let mut merged: JsonObject = spec.defaults();
        merged.extend(parameters.into_inner());
        self.steps
            .push(WorkflowStep::new(ToolInvocation::new(tool, Arguments::from(merged))));
        tracing::info!("Added '{}' to workflow at position {}", tool, self.steps.len());
        Ok(self.steps.len())
    }

    fn start_run(&mut self, reply: oneshot::Sender<Result<ExecutionResult>>) {
        for step in &mut self.steps {
            step.reset();
        }
        self.cancel.reset();

        let steps: Vec<ToolInvocation> = self.steps.iter().map(|s| s.invocation.clone()).collect();
        self.active = Some(ActiveRun { len: steps.len(), reply });
        tracing::info!("Executing workflow with {} steps", steps.len());

        let executor = self.executor.clone();
        let cancel = self.cancel.clone();
        let progress = self.events.clone();
        let done = self.events.clone();
        let run = tokio::spawn(async move {
            executor
                .run(steps, &cancel, |event| {
                    let _ = progress.send(HostEvent::Step(event));
                })
                .await
        });
        tokio::spawn(async move {
            let outcome = run.await.map_err(|e| ToolError::Internal(e.to_string()));
            let _ = done.send(HostEvent::RunFinished(outcome));
        });
    }

    fn apply(&mut self, event: HostEvent) {
        match event {
            HostEvent::Step(StepEvent::Started(index)) => {
                if let Some(step) = self.steps.get_mut(index) {
                    step.status = StepStatus::Running;
                }
            }
            HostEvent::Step(StepEvent::Finished(index, outcome)) => {
                if let Some(step) = self.steps.get_mut(index) {
                    match outcome {
                        Ok(summary) => {
                            step.status = StepStatus::Completed;
                            step.result = Some(summary);
                        }
                        Err(message) => {
                            step.status = StepStatus::Error;
                            step.error = Some(message);
                        }
                    }
                }
            }
            HostEvent::RunFinished(outcome) => {
                let Some(active) = self.active.take() else {
                    return;
                };
                let result = outcome.map(|report| ExecutionResult {
                    images: self.collect_images(active.len),
                    report,
                });
                let _ = active.reply.send(result);
            }
        }
    }

    fn collect_images(&self, len: usize) -> Vec<(String, Arc<DynamicImage>)> {
        self.steps
            .iter()
            .take(len)
            .filter(|step| step.status == StepStatus::Completed)
            .filter_map(|step| step.invocation.output_key())
            .filter_map(|key| match self.ctx.images.get(key) {
                Some(image) => Some((key.to_string(), image)),
                None => {
                    tracing::warn!("{}", ToolError::CacheMiss(key.to_string()));
                    None
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{ToolCategory, ToolSpec};
    use crate::tools::image_tools;
    use image::{Rgb, RgbImage};
    use serde_json::json;

    fn host() -> (Arc<ToolContext>, WorkflowHandle) {
        let ctx = Arc::new(ToolContext::new());
        let handle = WorkflowHost::spawn(Arc::clone(&ctx), Arc::new(image_tools(&ctx)));
        (ctx, handle)
    }

    fn args(value: serde_json::Value) -> Arguments {
        Arguments::from_value(value).unwrap()
    }

    #[tokio::test]
    async fn test_add_returns_position_and_status_shows_pending() {
        let (_ctx, handle) = host();
        let position = handle
            .add("resize_image", args(json!({"width": 100, "height": 100})))
            .await
            .unwrap();
        assert_eq!(position, 1);

        let status = handle.status().await.unwrap();
        assert!(status.summary().contains("1. resize_image [Pending]"));
        assert_eq!(status.steps[0].invocation.parameters.get("interpolation"), Some(&json!("LINEAR")));
    }

    #[tokio::test]
    async fn test_add_rejects_tools_outside_vocabulary() {
        let (_ctx, handle) = host();
        let err = handle.add("execute_workflow", Arguments::new()).await.unwrap_err();
        assert!(matches!(err, ToolError::UnknownTool(_)));
    }

    #[tokio::test]
    async fn test_execute_empty_workflow_fails() {
        let (ctx, handle) = host();
        ctx.images
            .put("keep", DynamicImage::ImageRgb8(RgbImage::new(2, 2)))
            .unwrap();
        let err = handle.execute().await.unwrap_err();
        assert!(matches!(err, ToolError::EmptyWorkflow));
        assert_eq!(ctx.images.keys(), vec!["keep".to_string()]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_execute_collects_images_of_completed_steps() {
        let (ctx, handle) = host();
        ctx.images
            .put("src", DynamicImage::ImageRgb8(RgbImage::from_pixel(8, 8, Rgb([200, 10, 10]))))
            .unwrap();

        handle
            .add("color_to_grayscale", args(json!({"input_key": "src", "output_key": "gray"})))
            .await
            .unwrap();
        handle
            .add("resize_image", args(json!({"input_key": "missing", "width": 4, "height": 4, "output_key": "small"})))
            .await
            .unwrap();
        handle
            .add("resize_image", args(json!({"input_key": "gray", "width": 4, "height": 4, "output_key": "small"})))
            .await
            .unwrap();

        let result = handle.execute().await.unwrap();
        assert_eq!(result.report.completed, 2);
        assert_eq!(result.report.errors(), 1);
        let keys: Vec<&str> = result.images.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["gray", "small"]);
        assert!(result.summary().starts_with(
            "Workflow execution completed!\n- Total tools: 3\n- Completed: 2\n- Errors: 1\n- Images generated: 2\n- resize_image: "
        ));

        let status = handle.status().await.unwrap();
        assert_eq!(status.count(&StepStatus::Error), 1);
        assert!(!status.running);
    }

    #[tokio::test]
    async fn test_clear_reports_removed_count() {
        let (_ctx, handle) = host();
        handle.add("display_image", Arguments::new()).await.unwrap();
        handle.add("display_image", Arguments::new()).await.unwrap();
        assert_eq!(handle.clear().await.unwrap(), 2);
        assert!(handle.status().await.unwrap().is_empty());
    }

    #[derive(schemars::JsonSchema)]
    struct NoArgs {}

    /// Host whose only tool blocks until the returned gate is notified
    fn gated_host() -> (WorkflowHandle, Arc<tokio::sync::Notify>) {
        let gate = Arc::new(tokio::sync::Notify::new());
        let mut vocabulary = ToolRegistry::new();
        let release = Arc::clone(&gate);
        vocabulary.register(
            ToolSpec::new::<NoArgs>("gate", "waits for release", ToolCategory::Image),
            move |_| {
                let release = Arc::clone(&release);
                async move {
                    release.notified().await;
                    Ok(vec![rmcp::model::Content::text("released")])
                }
            },
        );
        let handle = WorkflowHost::spawn(Arc::new(ToolContext::new()), Arc::new(vocabulary));
        (handle, gate)
    }

    async fn wait_until_running(handle: &WorkflowHandle) {
        while !handle.status().await.unwrap().running {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_one_run_at_a_time() {
        let (handle, gate) = gated_host();
        handle.add("gate", Arguments::new()).await.unwrap();

        let first = tokio::spawn({
            let handle = handle.clone();
            async move { handle.execute().await }
        });
        wait_until_running(&handle).await;

        assert!(matches!(handle.execute().await, Err(ToolError::WorkflowBusy)));
        assert!(matches!(handle.clear().await, Err(ToolError::WorkflowBusy)));
        assert_eq!(handle.add("gate", Arguments::new()).await.unwrap(), 2);

        gate.notify_one();
        let result = first.await.unwrap().unwrap();
        assert_eq!(result.report.completed, 1);
        assert_eq!(handle.clear().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_cancel_during_last_step_reports_cancelled() {
        let (handle, gate) = gated_host();
        handle.add("gate", Arguments::new()).await.unwrap();

        let run = tokio::spawn({
            let handle = handle.clone();
            async move { handle.execute().await }
        });
        wait_until_running(&handle).await;
        handle.cancel();
        gate.notify_one();

        let result = run.await.unwrap().unwrap();
        assert!(result.report.cancelled);
        assert_eq!(result.report.completed, 1);
        assert!(result.summary().ends_with("- Cancelled\n"));
    }
}
