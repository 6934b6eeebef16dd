use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::DynamicImage;
use rmcp::model::Content;
use schemars::JsonSchema;
use serde::Deserialize;
use vision::{
    BlurType, ContourFilter, FilterParams, FilterType, ImageFilter, ImageInfo, Interpolation,
    NonLocalMeans, ThresholdType, blobs_to_csv, odd_kernel_size,
};

use crate::args::{Arguments, lenient_bool, lenient_f64, lenient_i64, non_blank};
use crate::error::ToolError;
use crate::registry::{ToolCategory, ToolOutput, ToolRegistry, ToolSpec};
use crate::tools::{
    DirectSource, ImageInput, OutputOptions, ToolContext, image_content, path_list, register_image_tool,
    text_and_image,
};

fn default_interpolation() -> String {
    "LINEAR".to_string()
}

fn default_threshold() -> f64 {
    127.0
}

fn default_threshold_type() -> String {
    "BINARY".to_string()
}

fn default_filter_type() -> String {
    "GAUSSIAN".to_string()
}

fn default_blur_type() -> String {
    "GAUSSIAN".to_string()
}

fn default_kernel_size() -> i64 {
    5
}

fn default_sigma_x() -> f64 {
    1.0
}

fn default_sigma_range() -> f64 {
    75.0
}

fn default_h() -> f64 {
    10.0
}

fn default_template_window() -> i64 {
    7
}

fn default_search_window() -> i64 {
    21
}

fn default_min_area() -> f64 {
    100.0
}

fn default_max_area() -> f64 {
    -1.0
}

fn default_max_circularity() -> f64 {
    1.0
}

fn default_segmented_path() -> String {
    "./segmented_output.png".to_string()
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct LoadImageRequest {
    #[serde(flatten)]
    pub source: DirectSource,
    #[schemars(description = "Cache the loaded image under this key (alias: result_key)")]
    #[serde(default, alias = "result_key", deserialize_with = "non_blank")]
    pub output_key: Option<String>,
    #[schemars(description = "Also save the loaded image to this file")]
    #[serde(default, deserialize_with = "non_blank")]
    pub output_path: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ResizeImageRequest {
    #[serde(flatten)]
    pub input: ImageInput,
    #[schemars(description = "Target width in pixels")]
    #[serde(deserialize_with = "lenient_i64")]
    pub width: i64,
    #[schemars(description = "Target height in pixels")]
    #[serde(deserialize_with = "lenient_i64")]
    pub height: i64,
    #[schemars(description = "NEAREST, LINEAR, CUBIC, AREA or LANCZOS4; unknown names use LINEAR")]
    #[serde(default = "default_interpolation")]
    pub interpolation: String,
    #[serde(flatten)]
    pub output: OutputOptions,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SegmentImageRequest {
    #[serde(flatten)]
    pub input: ImageInput,
    #[schemars(description = "Threshold level (ignored for OTSU)")]
    #[serde(default = "default_threshold", deserialize_with = "lenient_f64")]
    pub threshold: f64,
    #[schemars(description = "BINARY, BINARY_INV, TRUNC, TOZERO, TOZERO_INV or OTSU")]
    #[serde(default = "default_threshold_type")]
    pub threshold_type: String,
    #[schemars(description = "Complement the result after thresholding")]
    #[serde(default, deserialize_with = "lenient_bool")]
    pub invert: bool,
    #[serde(flatten)]
    pub output: OutputOptions,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct GrayscaleRequest {
    #[serde(flatten)]
    pub input: ImageInput,
    #[serde(flatten)]
    pub output: OutputOptions,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct FilterImageRequest {
    #[serde(flatten)]
    pub input: ImageInput,
    #[schemars(description = "GAUSSIAN, MEDIAN or BILATERAL")]
    #[serde(default = "default_filter_type")]
    pub filter_type: String,
    #[schemars(description = "Kernel size (diameter for BILATERAL); even values are increased by one")]
    #[serde(default = "default_kernel_size", deserialize_with = "lenient_i64")]
    pub kernel_size: i64,
    #[schemars(description = "Gaussian sigma; zero or less derives it from the kernel size")]
    #[serde(default = "default_sigma_x", deserialize_with = "lenient_f64")]
    pub sigma_x: f64,
    #[schemars(description = "Bilateral filter sigma in color space")]
    #[serde(default = "default_sigma_range", deserialize_with = "lenient_f64")]
    pub sigma_color: f64,
    #[schemars(description = "Bilateral filter sigma in coordinate space")]
    #[serde(default = "default_sigma_range", deserialize_with = "lenient_f64")]
    pub sigma_space: f64,
    #[serde(flatten)]
    pub output: OutputOptions,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct DenoiseImageRequest {
    #[serde(flatten)]
    pub input: ImageInput,
    #[schemars(description = "Filter strength; higher removes more noise and more detail")]
    #[serde(default = "default_h", deserialize_with = "lenient_f64")]
    pub h: f64,
    #[schemars(description = "Patch size used to compare pixels (odd)")]
    #[serde(default = "default_template_window", alias = "template_window_size", deserialize_with = "lenient_i64")]
    pub template_window: i64,
    #[schemars(description = "Size of the area searched for similar patches (odd)")]
    #[serde(default = "default_search_window", alias = "search_window_size", deserialize_with = "lenient_i64")]
    pub search_window: i64,
    #[serde(flatten)]
    pub output: OutputOptions,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct BlurImageRequest {
    #[serde(flatten)]
    pub input: ImageInput,
    #[schemars(description = "GAUSSIAN, MOTION, BOX or AVERAGE")]
    #[serde(default = "default_blur_type")]
    pub blur_type: String,
    #[schemars(description = "Kernel size; even values are increased by one")]
    #[serde(default = "default_kernel_size", deserialize_with = "lenient_i64")]
    pub kernel_size: i64,
    #[schemars(description = "Direction of MOTION blur in degrees")]
    #[serde(default, deserialize_with = "lenient_f64")]
    pub angle: f64,
    #[serde(flatten)]
    pub output: OutputOptions,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct DetectContoursRequest {
    #[serde(flatten)]
    pub input: ImageInput,
    #[schemars(description = "Smallest contour area kept")]
    #[serde(default = "default_min_area", deserialize_with = "lenient_f64")]
    pub min_area: f64,
    #[schemars(description = "Largest contour area kept; zero or less means unlimited")]
    #[serde(default = "default_max_area", deserialize_with = "lenient_f64")]
    pub max_area: f64,
    #[schemars(description = "Lowest circularity kept; negative disables the bound")]
    #[serde(default, deserialize_with = "lenient_f64")]
    pub min_circularity: f64,
    #[schemars(description = "Highest circularity kept; negative disables the bound")]
    #[serde(default = "default_max_circularity", deserialize_with = "lenient_f64")]
    pub max_circularity: f64,
    #[schemars(description = "Write the blob table as CSV to this file")]
    #[serde(default, deserialize_with = "non_blank")]
    pub output_csv_path: Option<String>,
    #[schemars(description = "Cache the blob CSV under this key")]
    #[serde(default, deserialize_with = "non_blank")]
    pub output_csv_key: Option<String>,
    #[serde(flatten)]
    pub output: OutputOptions,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct OutputSegmentedRequest {
    #[schemars(description = "Cache key of the source image")]
    #[serde(default, deserialize_with = "non_blank")]
    pub source_key: Option<String>,
    #[serde(flatten)]
    pub source: DirectSource,
    #[schemars(description = "Path to the binary mask image")]
    #[serde(default, deserialize_with = "non_blank")]
    pub mask_path: Option<String>,
    #[schemars(description = "Cache key of the binary mask image")]
    #[serde(default, deserialize_with = "non_blank")]
    pub mask_key: Option<String>,
    #[schemars(description = "Base output path; region i is written to <stem>_region_<iii><ext>")]
    #[serde(default = "default_segmented_path")]
    pub output_path: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct DisplayImageRequest {
    #[serde(flatten)]
    pub input: ImageInput,
}

pub fn load_image(ctx: &ToolContext, args: Arguments) -> ToolOutput {
    let req: LoadImageRequest = args.parse()?;
    let source = req
        .source
        .source()
        .ok_or_else(|| ToolError::missing("Must provide image_path, image_url or image_data"))?;
    let image = source.load()?;

    let mut message = format!("Image loaded successfully!\n{}", ImageInfo::of(&image));
    let output = OutputOptions { output_path: req.output_path, output_key: req.output_key };
    let image = ctx.store(image, &output, &mut message)?;
    text_and_image(message, &image)
}

pub fn resize_image(ctx: &ToolContext, args: Arguments) -> ToolOutput {
    let req: ResizeImageRequest = args.parse()?;
    let src = ctx.resolve(&req.input)?;
    let interpolation = Interpolation::from_name(&req.interpolation);
    let resized = vision::resize(&src.image, req.width, req.height, interpolation)?;

    let mut message = format!(
        "Image resized successfully!\n- Original size: {}x{}\n- New size: {}x{}\n- Interpolation: {}",
        src.image.width(),
        src.image.height(),
        resized.width(),
        resized.height(),
        interpolation
    );
    let resized = ctx.store(resized, &req.output, &mut message)?;
    text_and_image(message, &resized)
}

pub fn segment_image(ctx: &ToolContext, args: Arguments) -> ToolOutput {
    let req: SegmentImageRequest = args.parse()?;
    let src = ctx.resolve(&req.input)?;
    let kind = ThresholdType::from_name(&req.threshold_type);
    let segmented = DynamicImage::ImageLuma8(vision::segment(&src.image, req.threshold, kind, req.invert));

    let mut message = format!(
        "Image segmented successfully!\n- Threshold: {:.1}\n- Type: {}{}",
        req.threshold,
        kind,
        if req.invert { ", inverted" } else { "" }
    );
    let segmented = ctx.store(segmented, &req.output, &mut message)?;
    text_and_image(message, &segmented)
}

pub fn color_to_grayscale(ctx: &ToolContext, args: Arguments) -> ToolOutput {
    let req: GrayscaleRequest = args.parse()?;
    let src = ctx.resolve(&req.input)?;
    let gray = vision::to_grayscale(&src.image);

    let mut message = format!(
        "Image converted to grayscale!\n- Original channels: {}\n- New channels: 1",
        src.image.color().channel_count()
    );
    let gray = ctx.store(gray, &req.output, &mut message)?;
    text_and_image(message, &gray)
}

pub fn filter_image(ctx: &ToolContext, args: Arguments) -> ToolOutput {
    let req: FilterImageRequest = args.parse()?;
    let kind = FilterType::parse(&req.filter_type)?;
    let params = FilterParams {
        kernel_size: odd_kernel_size(req.kernel_size)?,
        sigma_x: req.sigma_x,
        sigma_color: req.sigma_color,
        sigma_space: req.sigma_space,
    };
    let src = ctx.resolve(&req.input)?;
    let filtered = vision::filter(&src.image, kind, &params)?;

    let mut message = format!(
        "Filter applied successfully!\n- Filter type: {}\n- Kernel size: {}",
        kind, params.kernel_size
    );
    let filtered = ctx.store(filtered, &req.output, &mut message)?;
    text_and_image(message, &filtered)
}

pub fn denoise_image(ctx: &ToolContext, args: Arguments) -> ToolOutput {
    let req: DenoiseImageRequest = args.parse()?;
    let nlm = NonLocalMeans::new(
        req.h,
        odd_kernel_size(req.template_window)?,
        odd_kernel_size(req.search_window)?,
    )?;
    let src = ctx.resolve(&req.input)?;
    let denoised = nlm.apply(&src.image)?;

    let mut message = format!(
        "Image denoised successfully!\n- Filter strength: {:.1}\n- Template window: {}\n- Search window: {}",
        nlm.h, nlm.template_window, nlm.search_window
    );
    let denoised = ctx.store(denoised, &req.output, &mut message)?;
    text_and_image(message, &denoised)
}

pub fn blur_image(ctx: &ToolContext, args: Arguments) -> ToolOutput {
    let req: BlurImageRequest = args.parse()?;
    let kind = BlurType::parse(&req.blur_type)?;
    let kernel_size = odd_kernel_size(req.kernel_size)?;
    let src = ctx.resolve(&req.input)?;
    let blurred = vision::blur(&src.image, kind, kernel_size, req.angle)?;

    let mut message = format!(
        "Blur applied successfully!\n- Blur type: {}\n- Kernel size: {}\n- Angle: {:.1}°",
        kind, kernel_size, req.angle
    );
    let blurred = ctx.store(blurred, &req.output, &mut message)?;
    text_and_image(message, &blurred)
}

pub fn detect_contours(ctx: &ToolContext, args: Arguments) -> ToolOutput {
    let req: DetectContoursRequest = args.parse()?;
    let src = ctx.resolve(&req.input)?;
    let filter = ContourFilter::from_bounds(req.min_area, req.max_area, req.min_circularity, req.max_circularity);
    let analysis = vision::detect_blobs(&src.image, &filter)?;

    let mut message = format!(
        "Contours detected successfully!\n- Count: {}\n- Min area: {:.1}\n- Max area: {:.1}\n- Circularity: {:.2}-{:.2}",
        analysis.blobs.len(),
        req.min_area,
        req.max_area,
        req.min_circularity,
        req.max_circularity
    );

    if req.output_csv_path.is_some() || req.output_csv_key.is_some() {
        let csv = blobs_to_csv(&analysis.blobs);
        if let Some(path) = &req.output_csv_path {
            let path = Path::new(path);
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, &csv)?;
            message.push_str(&format!("\n- CSV saved to: {}", path.display()));
        }
        if let Some(key) = &req.output_csv_key {
            ctx.texts.put(key, csv)?;
            message.push_str(&format!("\n- CSV cached with key: {key}"));
        }
    }

    let overlay = DynamicImage::ImageRgb8(vision::visualize(&src.image, &analysis));
    let overlay = ctx.store(overlay, &req.output, &mut message)?;
    let blobs = serde_json::to_string(&analysis.blobs)
        .map_err(|e| ToolError::Internal(e.to_string()))?;

    Ok(vec![Content::text(message), Content::text(blobs), image_content(&overlay)?])
}

pub fn output_segmented(ctx: &ToolContext, args: Arguments) -> ToolOutput {
    let req: OutputSegmentedRequest = args.parse()?;
    let src = ctx.resolve_with(req.source_key.as_deref(), &req.source, "source_key")?;
    let mask = resolve_mask(ctx, req.mask_key.as_deref(), req.mask_path.as_deref())?;

    let regions = vision::extract_regions(&src.image, &mask)?;
    let base = Path::new(&req.output_path);
    let mut saved: Vec<PathBuf> = Vec::with_capacity(regions.len());
    for (i, region) in regions.iter().enumerate() {
        let path = vision::numbered_region_path(base, i + 1);
        vision::io::save(region, &path)?;
        saved.push(path);
    }

    let message = format!(
        "Segmented regions extracted successfully!\n- Total regions: {}\n- Saved files:\n{}",
        saved.len(),
        path_list(&saved)
    );
    Ok(vec![Content::text(message)])
}

fn resolve_mask(ctx: &ToolContext, key: Option<&str>, path: Option<&str>) -> crate::error::Result<Arc<DynamicImage>> {
    if let Some(mask) = key.and_then(|k| ctx.images.get(k)) {
        return Ok(mask);
    }
    match (path, key) {
        (Some(path), _) => Ok(Arc::new(vision::io::load_path(Path::new(path))?)),
        (None, Some(key)) => Err(ToolError::missing(format!("No mask cached under '{key}'"))),
        (None, None) => Err(ToolError::missing("Must provide mask_path or mask_key")),
    }
}

pub fn display_image(ctx: &ToolContext, args: Arguments) -> ToolOutput {
    let req: DisplayImageRequest = args.parse()?;
    let src = ctx.resolve(&req.input)?;
    Ok(vec![image_content(&src.image)?])
}

pub fn register(registry: &mut ToolRegistry, ctx: &Arc<ToolContext>) {
    use ToolCategory::Image;

    register_image_tool(
        registry,
        ctx,
        ToolSpec::new::<LoadImageRequest>(
            "load_image",
            "Load an image from a file path, URL or base64 data, optionally caching it",
            Image,
        ),
        load_image,
    );
    register_image_tool(
        registry,
        ctx,
        ToolSpec::new::<ResizeImageRequest>("resize_image", "Resize an image to the given dimensions", Image),
        resize_image,
    );
    register_image_tool(
        registry,
        ctx,
        ToolSpec::new::<SegmentImageRequest>(
            "segment_image",
            "Segment an image with a global threshold (supports OTSU)",
            Image,
        ),
        segment_image,
    );
    register_image_tool(
        registry,
        ctx,
        ToolSpec::new::<GrayscaleRequest>("color_to_grayscale", "Convert a color image to grayscale", Image),
        color_to_grayscale,
    );
    register_image_tool(
        registry,
        ctx,
        ToolSpec::new::<FilterImageRequest>(
            "filter_image",
            "Apply a GAUSSIAN, MEDIAN or BILATERAL smoothing filter",
            Image,
        ),
        filter_image,
    );
    register_image_tool(
        registry,
        ctx,
        ToolSpec::new::<DenoiseImageRequest>("denoise_image", "Remove noise with non-local means denoising", Image),
        denoise_image,
    );
    register_image_tool(
        registry,
        ctx,
        ToolSpec::new::<BlurImageRequest>("blur_image", "Apply a GAUSSIAN, MOTION, BOX or AVERAGE blur", Image),
        blur_image,
    );
    register_image_tool(
        registry,
        ctx,
        ToolSpec::new::<DetectContoursRequest>(
            "detect_contours",
            "Detect external contours and report centroid, circularity, bounding box and area of each",
            Image,
        ),
        detect_contours,
    );
    register_image_tool(
        registry,
        ctx,
        ToolSpec::new::<OutputSegmentedRequest>(
            "output_segmented",
            "Crop one region of the source image per contour of a binary mask and save each to a file",
            Image,
        ),
        output_segmented,
    );
    register_image_tool(
        registry,
        ctx,
        ToolSpec::new::<DisplayImageRequest>("display_image", "Return an image for display", Image),
        display_image,
    );
}
