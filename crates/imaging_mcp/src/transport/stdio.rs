use std::future::Future;
use std::sync::Arc;

use rmcp::{
    Error as McpError, RoleServer, ServerHandler, ServiceExt,
    model::{CallToolRequestParam, CallToolResult, ListToolsResult, PaginatedRequestParam, ServerInfo},
    service::RequestContext,
    transport::{IntoTransport, stdio},
};
use tokio_util::sync::CancellationToken;

use crate::args::Arguments;
use crate::registry::ToolRegistry;
use crate::server::server_info;

/// MCP handler for the stdio transport; awaits tool handlers directly
#[derive(Clone)]
pub struct StdioServer {
    registry: Arc<ToolRegistry>,
}

impl StdioServer {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self { registry }
    }
}

impl ServerHandler for StdioServer {
    fn get_info(&self) -> ServerInfo {
        server_info()
    }

    async fn list_tools(
        &self,
        _request: PaginatedRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, McpError> {
        Ok(ListToolsResult {
            next_cursor: None,
            tools: self.registry.tools(),
        })
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        let args = Arguments::from(request.arguments.unwrap_or_default());
        Ok(self.registry.call(&request.name, args).await)
    }
}

/// Serve on stdin/stdout until the client disconnects, Ctrl+C, or `shutdown` resolves
pub async fn serve<F>(registry: Arc<ToolRegistry>, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send,
{
    let stop = async {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => tracing::info!("Received Ctrl+C, shutting down"),
            _ = shutdown => tracing::info!("Shutdown requested"),
        }
    };
    serve_transport(registry, stdio(), stop).await
}

/// Run the MCP session over any byte transport until the peer closes it or
/// `stop` resolves; stopping cancels the session and waits for it to end.
pub async fn serve_transport<T, A, F>(registry: Arc<ToolRegistry>, transport: T, stop: F) -> std::io::Result<()>
where
    T: IntoTransport<RoleServer, std::io::Error, A>,
    F: Future<Output = ()> + Send,
{
    let ct = CancellationToken::new();
    tokio::pin!(stop);

    let service = tokio::select! {
        service = StdioServer::new(registry).serve_with_ct(transport, ct.clone()) => {
            service.inspect_err(|e| tracing::error!("Failed to start MCP server: {:?}", e))?
        }
        _ = &mut stop => {
            tracing::info!("Stopped before the client initialized");
            return Ok(());
        }
    };
    tracing::info!("MCP session initialized");

    let waiting = service.waiting();
    tokio::pin!(waiting);
    let result = tokio::select! {
        result = &mut waiting => result,
        _ = &mut stop => {
            ct.cancel();
            waiting.await
        }
    };

    match result {
        Ok(reason) => {
            tracing::info!("MCP session ended: {:?}", reason);
            Ok(())
        }
        Err(e) => {
            tracing::error!("MCP server error: {:?}", e);
            Err(std::io::Error::other(e))
        }
    }
}
