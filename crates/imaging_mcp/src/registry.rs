//! The tool dispatch table shared by both transports.
//!
//! Every tool has exactly one handler, stored as an async function. The
//! stdio transport awaits it directly; the HTTP transport runs the blocking
//! adapter from [`blocking`] on a worker thread. Both go through
//! [`into_call_result`], so a given call produces the same content either way.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use rmcp::model::{CallToolResult, Content, Tool};
use schemars::{JsonSchema, r#gen::SchemaSettings};
use serde_json::Value;
use strum::{Display, EnumString};
use tokio::runtime::Handle;

use crate::args::{Arguments, JsonObject};
use crate::error::{Result, ToolError};

pub type ToolOutput = Result<Vec<Content>>;
pub type ToolFuture = Pin<Box<dyn Future<Output = ToolOutput> + Send>>;
pub type AsyncHandler = Arc<dyn Fn(Arguments) -> ToolFuture + Send + Sync>;
pub type SyncHandler = Arc<dyn Fn(Arguments) -> ToolOutput + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum ToolCategory {
    /// Operates on images and the result cache; usable as a workflow step
    Image,
    /// Manipulates the workflow list
    Workflow,
}

/// Name, description and argument schema of one tool
#[derive(Debug, Clone)]
pub struct ToolSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub category: ToolCategory,
    pub input_schema: Arc<JsonObject>,
}

impl ToolSpec {
    /// Build the spec with a schema generated from the request type
    pub fn new<T: JsonSchema>(name: &'static str, description: &'static str, category: ToolCategory) -> Self {
        let settings = SchemaSettings::draft07().with(|s| {
            s.inline_subschemas = true;
            s.meta_schema = None;
        });
        let root = settings.into_generator().into_root_schema_for::<T>();
        let input_schema = match serde_json::to_value(root) {
            Ok(Value::Object(mut map)) => {
                map.remove("title");
                map
            }
            _ => JsonObject::new(),
        };
        Self {
            name,
            description,
            category,
            input_schema: Arc::new(input_schema),
        }
    }

    pub fn to_tool(&self) -> Tool {
        Tool::new(self.name, self.description, Arc::clone(&self.input_schema))
    }

    /// Declared default of every property that has one
    pub fn defaults(&self) -> JsonObject {
        self.input_schema
            .get("properties")
            .and_then(Value::as_object)
            .map(|props| {
                props
                    .iter()
                    .filter_map(|(name, schema)| {
                        schema.get("default").map(|d| (name.clone(), d.clone()))
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn required(&self) -> Vec<&str> {
        self.input_schema
            .get("required")
            .and_then(Value::as_array)
            .map(|names| names.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }
}

#[derive(Clone)]
struct RegisteredTool {
    spec: ToolSpec,
    handler: AsyncHandler,
}

/// Append-only `name -> (spec, handler)` table, built once at startup
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: Vec<RegisteredTool>,
    index: HashMap<&'static str, usize>,
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry").field("tools", &self.names()).finish()
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an async handler; a second registration under the same name is ignored
    pub fn register<F, Fut>(&mut self, spec: ToolSpec, handler: F) -> &mut Self
    where
        F: Fn(Arguments) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ToolOutput> + Send + 'static,
    {
        if self.index.contains_key(spec.name) {
            tracing::warn!("Tool '{}' is already registered; ignoring duplicate", spec.name);
            return self;
        }
        let handler: AsyncHandler = Arc::new(move |args| -> ToolFuture { Box::pin(handler(args)) });
        self.index.insert(spec.name, self.tools.len());
        self.tools.push(RegisteredTool { spec, handler });
        self
    }

    /// Register a CPU- or IO-bound handler; it runs on the blocking pool
    pub fn register_blocking<F>(&mut self, spec: ToolSpec, handler: F) -> &mut Self
    where
        F: Fn(Arguments) -> ToolOutput + Send + Sync + 'static,
    {
        let handler = Arc::new(handler);
        self.register(spec, move |args| {
            let handler = Arc::clone(&handler);
            async move {
                tokio::task::spawn_blocking(move || handler(args))
                    .await
                    .map_err(|e| ToolError::Internal(e.to_string()))?
            }
        })
    }

    pub fn spec(&self, name: &str) -> Option<&ToolSpec> {
        self.index.get(name).map(|&i| &self.tools[i].spec)
    }

    pub fn specs(&self) -> impl Iterator<Item = &ToolSpec> {
        self.tools.iter().map(|t| &t.spec)
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.tools.iter().map(|t| t.spec.name).collect()
    }

    pub fn tools(&self) -> Vec<Tool> {
        self.specs().map(ToolSpec::to_tool).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn handler(&self, name: &str) -> Option<AsyncHandler> {
        self.index.get(name).map(|&i| Arc::clone(&self.tools[i].handler))
    }

    /// Synchronous variant of a tool's handler, driven on `runtime`
    pub fn sync_handler(&self, name: &str, runtime: Handle) -> Option<SyncHandler> {
        self.handler(name).map(|handler| blocking(handler, runtime))
    }

    /// Run a tool and return its raw outcome
    pub async fn invoke(&self, name: &str, args: Arguments) -> ToolOutput {
        let handler = self
            .handler(name)
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;
        handler(args).await
    }

    /// Run a tool, folding any failure into an `isError` result
    pub async fn call(&self, name: &str, args: Arguments) -> CallToolResult {
        tracing::info!("Calling tool '{}'", name);
        into_call_result(name, self.invoke(name, args).await)
    }

    /// Blocking counterpart of [`call`](Self::call); must not run on a runtime worker thread
    pub fn call_blocking(&self, name: &str, args: Arguments, runtime: &Handle) -> CallToolResult {
        tracing::info!("Calling tool '{}' (blocking)", name);
        let output = match self.sync_handler(name, runtime.clone()) {
            Some(handler) => handler(args),
            None => Err(ToolError::UnknownTool(name.to_string())),
        };
        into_call_result(name, output)
    }
}

/// Derive a synchronous handler by driving the async one to completion
pub fn blocking(handler: AsyncHandler, runtime: Handle) -> SyncHandler {
    Arc::new(move |args| runtime.block_on(handler(args)))
}

/// The dispatch boundary: errors become a single `Error: ...` text item
pub fn into_call_result(name: &str, output: ToolOutput) -> CallToolResult {
    match output {
        Ok(content) if content.is_empty() => {
            CallToolResult::success(vec![Content::text(format!("{name} completed"))])
        }
        Ok(content) => CallToolResult::success(content),
        Err(err) => {
            tracing::warn!("Tool '{}' failed: {}", name, err);
            CallToolResult::error(vec![Content::text(format!("Error: {err}"))])
        }
    }
}
