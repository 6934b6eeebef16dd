use std::sync::Arc;

use image::{DynamicImage, GrayImage, Luma};
use imaging_mcp::{Arguments, ToolContext, ToolRegistry, WorkflowHandle, WorkflowHost, catalog, image_tools};
use rmcp::model::CallToolResult;
use serde_json::{Value, json};
use tokio::runtime::Handle;

fn setup() -> (Arc<ToolContext>, WorkflowHandle, Arc<ToolRegistry>) {
    let ctx = Arc::new(ToolContext::new());
    let handle = WorkflowHost::spawn(Arc::clone(&ctx), Arc::new(image_tools(&ctx)));
    let registry = Arc::new(catalog(&ctx, Some(handle.clone())));
    (ctx, handle, registry)
}

fn args(value: Value) -> Arguments {
    Arguments::from_value(value).unwrap()
}

fn json_of(result: &CallToolResult) -> Value {
    serde_json::to_value(result).unwrap()
}

fn text(result: &Value, i: usize) -> &str {
    result["content"][i]["text"].as_str().unwrap()
}

fn blobs() -> DynamicImage {
    let mut img = GrayImage::new(48, 48);
    for y in 10..30 {
        for x in 10..30 {
            img.put_pixel(x, y, Luma([220]));
        }
    }
    DynamicImage::ImageLuma8(img)
}

#[tokio::test]
async fn test_add_then_status_shows_pending_step() {
    let (_ctx, _handle, registry) = setup();

    let added = json_of(
        &registry
            .call("add_to_workflow", args(json!({"tool": "resize_image", "parameters": {"width": 100, "height": 100}})))
            .await,
    );
    assert_eq!(text(&added, 0), "Added 'resize_image' to workflow (position 1)");

    let status = json_of(&registry.call("get_workflow_status", Arguments::new()).await);
    assert!(text(&status, 0).contains("1. resize_image [Pending]"));
    assert!(text(&status, 0).starts_with("Workflow: 1 tools total\n- Pending: 1"));
}

#[tokio::test]
async fn test_execute_empty_workflow_leaves_cache_untouched() {
    let (ctx, _handle, registry) = setup();
    ctx.images.put("existing", blobs()).unwrap();

    let result = json_of(&registry.call("execute_workflow", Arguments::new()).await);
    assert_eq!(result["isError"], true);
    assert_eq!(text(&result, 0), "Error: Workflow is empty");
    assert_eq!(ctx.images.keys(), vec!["existing".to_string()]);
}

#[tokio::test]
async fn test_add_unknown_tool_fails() {
    let (_ctx, _handle, registry) = setup();
    let result = json_of(&registry.call("add_to_workflow", args(json!({"tool": "sharpen"}))).await);
    assert_eq!(text(&result, 0), "Error: Unknown tool: sharpen");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_pipeline_runs_and_returns_cached_images() {
    let (ctx, handle, registry) = setup();
    ctx.images.put("cells", blobs()).unwrap();

    for (tool, params) in [
        ("blur_image", json!({"input_key": "cells", "blur_type": "GAUSSIAN", "kernel_size": 3, "output_key": "smooth"})),
        ("segment_image", json!({"input_key": "smooth", "threshold_type": "OTSU", "output_key": "mask"})),
        ("detect_contours", json!({"input_key": "mask", "min_area": 50, "output_key": "overlay"})),
    ] {
        handle.add(tool, args(params)).await.unwrap();
    }

    let result = json_of(&registry.call("execute_workflow", Arguments::new()).await);
    assert_eq!(result["isError"], false);
    assert_eq!(
        text(&result, 0),
        "Workflow execution completed!\n- Total tools: 3\n- Completed: 3\n- Errors: 0\n- Images generated: 3\n"
    );
    let content = result["content"].as_array().unwrap();
    assert_eq!(content.len(), 4);
    assert!(content[1..].iter().all(|c| c["type"] == "image"));

    let status = handle.status().await.unwrap();
    assert!(status.summary().contains("3. detect_contours [Completed]"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_failed_step_is_reported_and_run_continues() {
    let (ctx, _handle, registry) = setup();
    ctx.images.put("cells", blobs()).unwrap();

    for params in [
        json!({"tool": "filter_image", "parameters": {"input_key": "cells", "filter_type": "EMBOSS", "output_key": "f"}}),
        json!({"tool": "color_to_grayscale", "parameters": {"input_key": "cells", "output_key": "g"}}),
    ] {
        registry.call("add_to_workflow", args(params)).await;
    }

    let result = json_of(&registry.call("execute_workflow", Arguments::new()).await);
    assert_eq!(result["isError"], false);
    let summary = text(&result, 0);
    assert!(summary.contains("- Completed: 1\n- Errors: 1\n- Images generated: 1\n"));
    assert!(summary.contains("- filter_image: Unknown filter type: EMBOSS"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_rerun_resets_step_status() {
    let (ctx, handle, registry) = setup();
    ctx.images.put("cells", blobs()).unwrap();
    handle
        .add("color_to_grayscale", args(json!({"input_key": "cells", "output_key": "gray"})))
        .await
        .unwrap();

    let first = json_of(&registry.call("execute_workflow", Arguments::new()).await);
    assert!(text(&first, 0).contains("- Images generated: 1"));

    ctx.images.remove("cells");
    ctx.images.remove("gray");
    let second = json_of(&registry.call("execute_workflow", Arguments::new()).await);
    assert!(text(&second, 0).contains("- Completed: 0\n- Errors: 1\n- Images generated: 0"));
    let status = handle.status().await.unwrap();
    assert!(status.summary().contains("1. color_to_grayscale [Error]"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_blocking_and_async_paths_agree_for_bridge_tools() {
    let (_ctx, _handle, registry) = setup();
    registry
        .call("add_to_workflow", args(json!({"tool": "display_image"})))
        .await;

    let via_async = json_of(&registry.call("get_workflow_status", Arguments::new()).await);

    let runtime = Handle::current();
    let blocking = Arc::clone(&registry);
    let via_blocking = tokio::task::spawn_blocking(move || {
        blocking.call_blocking("get_workflow_status", Arguments::new(), &runtime)
    })
    .await
    .unwrap();

    assert_eq!(via_async, json_of(&via_blocking));
}

#[tokio::test]
async fn test_clear_reports_count() {
    let (_ctx, _handle, registry) = setup();
    for _ in 0..3 {
        registry.call("add_to_workflow", args(json!({"tool": "display_image"}))).await;
    }
    let cleared = json_of(&registry.call("clear_workflow", Arguments::new()).await);
    assert_eq!(text(&cleared, 0), "Cleared workflow (3 tools removed)");
    let status = json_of(&registry.call("get_workflow_status", Arguments::new()).await);
    assert_eq!(text(&status, 0), "Workflow is empty");
}
