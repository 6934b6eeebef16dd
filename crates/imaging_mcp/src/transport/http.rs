//! Stateless HTTP transport: one POST endpoint speaking JSON-RPC.
//!
//! Each request is handled on its own; concurrent clients share only the
//! result cache. `tools/call` runs the tool's blocking handler on tokio's
//! blocking pool, so request handling never stalls a runtime worker.

use std::future::Future;
use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::runtime::Handle;
use tower_http::trace::TraceLayer;

use crate::args::Arguments;
use crate::registry::ToolRegistry;
use crate::server::server_info;
use crate::transport::jsonrpc::{
    CallParams, INTERNAL_ERROR, INVALID_PARAMS, INVALID_REQUEST, JsonRpcRequest, JsonRpcResponse, METHOD_NOT_FOUND,
    PARSE_ERROR,
};

#[derive(Clone)]
pub struct HttpState {
    registry: Arc<ToolRegistry>,
}

pub fn router(registry: Arc<ToolRegistry>, endpoint: &str) -> Router {
    Router::new()
        .route(endpoint, post(handle_rpc))
        .layer(TraceLayer::new_for_http())
        .with_state(HttpState { registry })
}

/// Serve until `shutdown` resolves
pub async fn serve<F>(listener: TcpListener, router: Router, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, router).with_graceful_shutdown(shutdown).await
}

async fn handle_rpc(State(state): State<HttpState>, body: Bytes) -> Response {
    let value: Value = match serde_json::from_slice(&body) {
        Ok(value) => value,
        Err(e) => {
            tracing::debug!("Rejecting unparseable request: {}", e);
            return Json(JsonRpcResponse::error(Value::Null, PARSE_ERROR, format!("Parse error: {e}"))).into_response();
        }
    };

    let id = value.get("id").cloned().unwrap_or(Value::Null);
    let request: JsonRpcRequest = match serde_json::from_value(value) {
        Ok(request) => request,
        Err(e) => {
            return Json(JsonRpcResponse::error(id, INVALID_REQUEST, format!("Invalid request: {e}"))).into_response();
        }
    };

    let Some(id) = request.id.clone() else {
        tracing::debug!("Notification '{}' accepted", request.method);
        return StatusCode::ACCEPTED.into_response();
    };

    Json(dispatch(&state.registry, id, request).await).into_response()
}

async fn dispatch(registry: &Arc<ToolRegistry>, id: Value, request: JsonRpcRequest) -> JsonRpcResponse {
    tracing::debug!("HTTP request: {}", request.method);
    match request.method.as_str() {
        "initialize" => match serde_json::to_value(server_info()) {
            Ok(info) => JsonRpcResponse::success(id, info),
            Err(e) => JsonRpcResponse::error(id, INTERNAL_ERROR, e.to_string()),
        },
        "ping" => JsonRpcResponse::success(id, json!({})),
        "tools/list" => JsonRpcResponse::success(id, json!({ "tools": registry.tools() })),
        "tools/call" => call_tool(registry, id, request.params).await,
        other => JsonRpcResponse::error(id, METHOD_NOT_FOUND, format!("Method not found: {other}")),
    }
}

async fn call_tool(registry: &Arc<ToolRegistry>, id: Value, params: Value) -> JsonRpcResponse {
    let params: CallParams = match serde_json::from_value(params) {
        Ok(params) => params,
        Err(e) => return JsonRpcResponse::error(id, INVALID_PARAMS, format!("Invalid params: {e}")),
    };
    let args = match Arguments::from_value(params.arguments) {
        Ok(args) => args,
        Err(e) => return JsonRpcResponse::error(id, INVALID_PARAMS, e.to_string()),
    };

    let registry = Arc::clone(registry);
    let runtime = Handle::current();
    let name = params.name;
    let outcome = tokio::task::spawn_blocking(move || registry.call_blocking(&name, args, &runtime)).await;

    match outcome.map_err(|e| e.to_string()).and_then(|r| serde_json::to_value(r).map_err(|e| e.to_string())) {
        Ok(result) => JsonRpcResponse::success(id, result),
        Err(e) => JsonRpcResponse::error(id, INTERNAL_ERROR, e),
    }
}
