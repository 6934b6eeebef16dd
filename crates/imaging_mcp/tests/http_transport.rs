use std::sync::Arc;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode},
};
use image::{DynamicImage, Rgb, RgbImage};
use imaging_mcp::{ToolContext, WorkflowHost, catalog, image_tools, transport::http};
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use tower::ServiceExt;

fn app(ctx: &Arc<ToolContext>, attach_workflow: bool) -> Router {
    let workflow = attach_workflow.then(|| WorkflowHost::spawn(Arc::clone(ctx), Arc::new(image_tools(ctx))));
    http::router(Arc::new(catalog(ctx, workflow)), "/mcp")
}

async fn post(app: &Router, body: impl Into<String>) -> (StatusCode, Vec<u8>) {
    let request = Request::builder()
        .method("POST")
        .uri("/mcp")
        .header("content-type", "application/json")
        .body(Body::from(body.into()))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, bytes.to_vec())
}

async fn rpc(app: &Router, method: &str, params: Value) -> Value {
    let body = json!({"jsonrpc": "2.0", "id": 1, "method": method, "params": params});
    let (status, bytes) = post(app, body.to_string()).await;
    assert_eq!(status, StatusCode::OK);
    serde_json::from_slice(&bytes).unwrap()
}

async fn call(app: &Router, name: &str, arguments: Value) -> Value {
    rpc(app, "tools/call", json!({"name": name, "arguments": arguments})).await["result"].clone()
}

fn png_base64() -> String {
    let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(12, 6, Rgb([30, 200, 30])));
    vision::io::encode_png_base64(&image).unwrap()
}

#[tokio::test(flavor = "multi_thread")]
async fn test_tools_list_exposes_full_catalog() {
    let app = app(&Arc::new(ToolContext::new()), false);
    let response = rpc(&app, "tools/list", Value::Null).await;

    let names: Vec<&str> = response["result"]["tools"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["name"].as_str().unwrap())
        .collect();
    assert_eq!(
        names,
        vec![
            "load_image",
            "resize_image",
            "segment_image",
            "color_to_grayscale",
            "filter_image",
            "denoise_image",
            "blur_image",
            "detect_contours",
            "output_segmented",
            "display_image",
            "add_to_workflow",
            "clear_workflow",
            "get_workflow_status",
            "execute_workflow",
        ]
    );

    let resize = &response["result"]["tools"][1];
    assert_eq!(resize["inputSchema"]["type"], "object");
    assert_eq!(resize["inputSchema"]["properties"]["interpolation"]["default"], "LINEAR");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_initialize_reports_identity() {
    let app = app(&Arc::new(ToolContext::new()), false);
    let response = rpc(&app, "initialize", json!({})).await;
    assert_eq!(response["result"]["serverInfo"]["name"], "image-processing-mcp-server");
    assert_eq!(response["result"]["serverInfo"]["version"], "1.0.0");
    assert!(response["result"]["capabilities"]["tools"].is_object());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_notification_is_accepted_without_body() {
    let app = app(&Arc::new(ToolContext::new()), false);
    let (status, body) = post(&app, r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert!(body.is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_protocol_errors_use_jsonrpc_codes() {
    let app = app(&Arc::new(ToolContext::new()), false);

    let (status, body) = post(&app, "{not json").await;
    assert_eq!(status, StatusCode::OK);
    let parse: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(parse["error"]["code"], -32700);

    let unknown = rpc(&app, "resources/list", json!({})).await;
    assert_eq!(unknown["error"]["code"], -32601);

    let bad_params = rpc(&app, "tools/call", json!({"arguments": {}})).await;
    assert_eq!(bad_params["error"]["code"], -32602);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_tool_failures_are_error_results() {
    let app = app(&Arc::new(ToolContext::new()), false);

    let unknown = call(&app, "sharpen_image", json!({})).await;
    assert_eq!(unknown["isError"], true);
    assert_eq!(unknown["content"][0]["text"], "Error: Unknown tool: sharpen_image");

    let missing = call(&app, "blur_image", json!({"input_key": "nothing"})).await;
    assert_eq!(missing["isError"], true);
    assert!(missing["content"][0]["text"].as_str().unwrap().starts_with("Error: "));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_cache_is_shared_across_requests() {
    let ctx = Arc::new(ToolContext::new());
    let app = app(&ctx, false);

    let loaded = call(&app, "load_image", json!({"image_data": png_base64(), "output_key": "img1"})).await;
    assert_eq!(loaded["isError"], false);
    assert_eq!(loaded["content"][1]["type"], "image");
    assert_eq!(loaded["content"][1]["mimeType"], "image/png");

    let gray = call(&app, "color_to_grayscale", json!({"input_key": "img1", "output_key": "gray"})).await;
    assert_eq!(
        gray["content"][0]["text"],
        "Image converted to grayscale!\n- Original channels: 3\n- New channels: 1\n- Cached with key: gray"
    );
    assert_eq!(ctx.images.keys(), vec!["gray".to_string(), "img1".to_string()]);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_headless_workflow_tools_report_ui_unavailable() {
    let app = app(&Arc::new(ToolContext::new()), false);
    let result = call(&app, "execute_workflow", json!({})).await;
    assert_eq!(result["isError"], true);
    assert_eq!(result["content"][0]["text"], "Error: UI not initialized");
}
