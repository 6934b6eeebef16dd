use std::net::SocketAddr;
use std::sync::Arc;

use rmcp::model::{Implementation, ServerCapabilities, ServerInfo};
use strum::Display;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::config::{ServerConfig, TransportMode};
use crate::registry::ToolRegistry;
use crate::tools::{ToolContext, catalog, image_tools};
use crate::transport::{http, stdio};
use crate::workflow::{WorkflowHandle, WorkflowHost};

pub const SERVER_NAME: &str = "image-processing-mcp-server";
pub const SERVER_VERSION: &str = "1.0.0";

const INSTRUCTIONS: &str = "Image processing server. Load an image with load_image and an output_key, \
then pass that key as input_key to resize, segment, filter, denoise, blur or detect_contours. \
Tools can also be queued with add_to_workflow and run together with execute_workflow.";

/// Identity and capabilities reported on `initialize`
pub fn server_info() -> ServerInfo {
    ServerInfo {
        instructions: Some(INSTRUCTIONS.into()),
        capabilities: ServerCapabilities::builder().enable_tools().build(),
        server_info: Implementation {
            name: SERVER_NAME.into(),
            version: SERVER_VERSION.into(),
        },
        ..Default::default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum ServerState {
    Stopped,
    Starting,
    Running,
    ShuttingDown,
}

/// Starts and stops one transport over a fresh tool catalog
pub struct ServerLauncher {
    config: ServerConfig,
    ctx: Arc<ToolContext>,
    state: ServerState,
    workflow: Option<WorkflowHandle>,
    registry: Option<Arc<ToolRegistry>>,
    local_addr: Option<SocketAddr>,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<std::io::Result<()>>>,
}

impl ServerLauncher {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            ctx: Arc::new(ToolContext::new()),
            state: ServerState::Stopped,
            workflow: None,
            registry: None,
            local_addr: None,
            shutdown: None,
            task: None,
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn state(&self) -> ServerState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == ServerState::Running
    }

    pub fn context(&self) -> &Arc<ToolContext> {
        &self.ctx
    }

    pub fn workflow(&self) -> Option<&WorkflowHandle> {
        self.workflow.as_ref()
    }

    pub fn registry(&self) -> Option<&Arc<ToolRegistry>> {
        self.registry.as_ref()
    }

    /// Bound HTTP address once running
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Start the configured transport. Returns `false` if already started or
    /// if the HTTP listener cannot bind.
    pub async fn start(&mut self) -> bool {
        if self.state != ServerState::Stopped {
            tracing::warn!("Server start requested while {}", self.state);
            return false;
        }
        self.state = ServerState::Starting;

        let listener = match self.config.transport {
            TransportMode::Http => {
                let address = self.config.http.address();
                match TcpListener::bind(&address).await {
                    Ok(listener) => Some(listener),
                    Err(e) => {
                        tracing::error!("Failed to bind {}: {}", address, e);
                        self.state = ServerState::Stopped;
                        return false;
                    }
                }
            }
            TransportMode::Stdio => None,
        };

        let workflow = self
            .config
            .workflow
            .attach
            .then(|| WorkflowHost::spawn(Arc::clone(&self.ctx), Arc::new(image_tools(&self.ctx))));
        if workflow.is_none() {
            tracing::info!("Running headless; workflow tools are unavailable");
        }
        let registry = Arc::new(catalog(&self.ctx, workflow.clone()));

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let signal = async move {
            let _ = shutdown_rx.await;
        };

        let task = match listener {
            Some(listener) => {
                self.local_addr = listener.local_addr().ok();
                let endpoint = self.config.http.endpoint_path();
                tracing::info!(
                    "Starting {} v{} on http://{}{}",
                    SERVER_NAME,
                    SERVER_VERSION,
                    self.config.http.address(),
                    endpoint
                );
                let app = http::router(Arc::clone(&registry), &endpoint);
                tokio::spawn(http::serve(listener, app, signal))
            }
            None => {
                tracing::info!("Starting {} v{} on stdio", SERVER_NAME, SERVER_VERSION);
                tokio::spawn(stdio::serve(Arc::clone(&registry), signal))
            }
        };

        self.workflow = workflow;
        self.registry = Some(registry);
        self.shutdown = Some(shutdown_tx);
        self.task = Some(task);
        self.state = ServerState::Running;
        true
    }

    /// Wait for the transport to stop on its own (stdio end of input)
    pub async fn wait(&mut self) {
        if let Some(task) = self.task.as_mut() {
            log_exit(task.await);
            self.task = None;
            self.release();
        }
    }

    /// Stop the transport gracefully and release every cached entry
    pub async fn shutdown(&mut self) {
        if self.state != ServerState::Running {
            return;
        }
        self.state = ServerState::ShuttingDown;
        tracing::info!("Shutting down");

        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            log_exit(task.await);
        }
        self.release();
    }

    fn release(&mut self) {
        self.shutdown = None;
        self.workflow = None;
        self.registry = None;
        self.local_addr = None;
        let released = self.ctx.clear();
        tracing::info!("Server stopped; released {} cached entries", released);
        self.state = ServerState::Stopped;
    }
}

fn log_exit(outcome: Result<std::io::Result<()>, tokio::task::JoinError>) {
    match outcome {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::error!("Transport failed: {}", e),
        Err(e) => tracing::error!("Transport task aborted: {}", e),
    }
}
