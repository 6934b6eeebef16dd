//! # Imaging MCP
//!
//! An MCP server exposing the [`vision`] operations as tools over two
//! transports: stdio (one client, rmcp) and a stateless HTTP endpoint
//! (many clients, axum). Both serve the same [`ToolRegistry`], so a tool
//! call produces the same content on either.
//!
//! Tools share a keyed result cache: a tool given an `output_key` stores its
//! result there, and later tools read it back through `input_key`, so a
//! multi-step pipeline decodes its input once. Four more tools drive a
//! workflow list owned by a single task ([`WorkflowHost`]).
//!
//! ```rust,no_run
//! use imaging_mcp::{ServerConfig, ServerLauncher};
//!
//! # async fn run() {
//! let mut launcher = ServerLauncher::new(ServerConfig::default());
//! if launcher.start().await {
//!     tokio::signal::ctrl_c().await.ok();
//!     launcher.shutdown().await;
//! }
//! # }
//! ```

pub mod args;
pub mod cache;
pub mod config;
pub mod error;
pub mod logging;
pub mod registry;
pub mod server;
pub mod tools;
pub mod transport;
pub mod workflow;

pub use args::{Arguments, JsonObject};
pub use cache::{ImageCache, ResultCache, TextCache};
pub use config::{HttpConfig, LogConfig, ServerConfig, TransportMode, WorkflowConfig};
pub use error::{Result, ServerError, ToolError};
pub use logging::init_logging;
pub use registry::{ToolCategory, ToolRegistry, ToolSpec, into_call_result};
pub use server::{SERVER_NAME, SERVER_VERSION, ServerLauncher, ServerState, server_info};
pub use tools::{ToolContext, catalog, image_tools};
pub use workflow::{
    ExecutionResult, PipelineExecutor, StepStatus, ToolInvocation, WorkflowHandle, WorkflowHost, WorkflowSnapshot,
};
