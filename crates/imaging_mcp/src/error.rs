use thiserror::Error;
use vision::VisionError;

/// Failures raised by tool handlers; converted to `isError` results at dispatch
#[derive(Error, Debug)]
pub enum ToolError {
    #[error("{0}")]
    InvalidArgument(String),

    #[error("{0}")]
    MissingInput(String),

    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Workflow is empty")]
    EmptyWorkflow,

    #[error("UI not initialized")]
    UiUnavailable,

    #[error("Workflow is already executing")]
    WorkflowBusy,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("No cached entry for key: {0}")]
    CacheMiss(String),

    #[error(transparent)]
    Vision(VisionError),

    #[error("Tool handler failed: {0}")]
    Internal(String),
}

impl From<VisionError> for ToolError {
    fn from(err: VisionError) -> Self {
        match err {
            VisionError::InvalidParameter(msg) => ToolError::InvalidArgument(msg),
            VisionError::UnknownVariant { .. } => ToolError::InvalidArgument(err.to_string()),
            VisionError::Io(io) => ToolError::Io(io),
            other => ToolError::Vision(other),
        }
    }
}

impl ToolError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        ToolError::InvalidArgument(msg.into())
    }

    pub fn missing(msg: impl Into<String>) -> Self {
        ToolError::MissingInput(msg.into())
    }
}

/// Failures while configuring or starting the server
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    TomlDe(#[from] toml::de::Error),

    #[error(transparent)]
    TomlSer(#[from] toml::ser::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("Unsupported config format. Please use .toml or .json files")]
    UnsupportedFileFormat,

    #[error("Invalid workflow file: {0}")]
    InvalidWorkflow(String),

    #[error("Failed to initialize logging: {0}")]
    Logging(String),
}

pub type Result<T> = std::result::Result<T, ToolError>;
