//! The tool catalog: ten image tools plus the four workflow bridge tools.

pub mod image_ops;
pub mod workflow;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::DynamicImage;
use rmcp::model::Content;
use schemars::JsonSchema;
use serde::Deserialize;
use vision::ImageSource;

use crate::args::{Arguments, non_blank};
use crate::cache::{ImageCache, TextCache};
use crate::error::{Result, ToolError};
use crate::registry::{ToolOutput, ToolRegistry, ToolSpec};
use crate::workflow::WorkflowHandle;

pub const PNG_MIME: &str = "image/png";

/// State shared by every image tool: the image cache and the text cache
#[derive(Debug, Default)]
pub struct ToolContext {
    pub images: ImageCache,
    pub texts: TextCache,
}

impl ToolContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Release every cached image and text payload
    pub fn clear(&self) -> usize {
        self.images.clear() + self.texts.clear()
    }
}

/// A direct image source; `image_data` wins over `image_url`, which wins over `image_path`
#[derive(Debug, Default, Deserialize, JsonSchema)]
pub struct DirectSource {
    #[schemars(description = "Path to an image file on disk")]
    #[serde(default, deserialize_with = "non_blank")]
    pub image_path: Option<String>,
    #[schemars(description = "URL of an image to download")]
    #[serde(default, deserialize_with = "non_blank")]
    pub image_url: Option<String>,
    #[schemars(description = "Base64-encoded image bytes, optionally as a data: URI")]
    #[serde(default, deserialize_with = "non_blank")]
    pub image_data: Option<String>,
}

impl DirectSource {
    pub fn source(&self) -> Option<ImageSource<'_>> {
        if let Some(data) = &self.image_data {
            Some(ImageSource::Data(data))
        } else if let Some(url) = &self.image_url {
            Some(ImageSource::Url(url))
        } else {
            self.image_path.as_deref().map(|p| ImageSource::Path(Path::new(p)))
        }
    }
}

/// Cache key first, then a direct source
#[derive(Debug, Default, Deserialize, JsonSchema)]
pub struct ImageInput {
    #[schemars(description = "Cache key of a previously loaded or produced image (alias: result_key)")]
    #[serde(default, alias = "result_key", deserialize_with = "non_blank")]
    pub input_key: Option<String>,
    #[serde(flatten)]
    pub source: DirectSource,
}

/// Where a result goes besides the response
#[derive(Debug, Default, Deserialize, JsonSchema)]
pub struct OutputOptions {
    #[schemars(description = "Save the result to this file; the format follows the extension")]
    #[serde(default, deserialize_with = "non_blank")]
    pub output_path: Option<String>,
    #[schemars(description = "Cache the result under this key for later tools")]
    #[serde(default, deserialize_with = "non_blank")]
    pub output_key: Option<String>,
}

/// An input image and whether the cache already owns it
#[derive(Debug, Clone)]
pub struct ResolvedImage {
    pub image: Arc<DynamicImage>,
    pub cache_key: Option<String>,
}

impl ToolContext {
    /// Three-tier input resolution: cache key, then direct source, else `MissingInput`
    pub fn resolve(&self, input: &ImageInput) -> Result<ResolvedImage> {
        self.resolve_with(input.input_key.as_deref(), &input.source, "input_key")
    }

    pub fn resolve_with(&self, key: Option<&str>, source: &DirectSource, key_name: &str) -> Result<ResolvedImage> {
        if let Some(key) = key {
            if let Some(image) = self.images.get(key) {
                tracing::debug!("Cache hit for '{}'", key);
                return Ok(ResolvedImage { image, cache_key: Some(key.to_string()) });
            }
            tracing::debug!("Cache miss for '{}', trying direct sources", key);
        }

        match source.source() {
            Some(source) => {
                tracing::debug!("Loading image from {}", source.kind());
                let image = source.load()?;
                Ok(ResolvedImage { image: Arc::new(image), cache_key: None })
            }
            None => Err(match key {
                Some(key) => ToolError::missing(format!(
                    "No image cached under '{key}' and no image_path, image_url or image_data given"
                )),
                None => ToolError::missing(format!(
                    "No image input: provide {key_name}, image_path, image_url or image_data"
                )),
            }),
        }
    }

    /// Save and/or cache a result, appending the matching lines to `message`
    pub fn store(&self, image: DynamicImage, output: &OutputOptions, message: &mut String) -> Result<Arc<DynamicImage>> {
        let image = Arc::new(image);
        if let Some(path) = &output.output_path {
            vision::io::save(&image, Path::new(path))?;
            message.push_str(&format!("\n- Saved to: {path}"));
        }
        if let Some(key) = &output.output_key {
            self.images.put_shared(key, Arc::clone(&image))?;
            message.push_str(&format!("\n- Cached with key: {key}"));
        }
        Ok(image)
    }
}

pub fn image_content(image: &DynamicImage) -> Result<Content> {
    Ok(Content::image(vision::io::encode_png_base64(image)?, PNG_MIME))
}

/// Text summary followed by the result image
pub fn text_and_image(message: String, image: &DynamicImage) -> ToolOutput {
    Ok(vec![Content::text(message), image_content(image)?])
}

/// The ten image tools, which are also the vocabulary of workflow steps
pub fn image_tools(ctx: &Arc<ToolContext>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    image_ops::register(&mut registry, ctx);
    registry
}

/// Everything the transports expose: the image tools plus the workflow bridge
pub fn catalog(ctx: &Arc<ToolContext>, workflow: Option<WorkflowHandle>) -> ToolRegistry {
    let mut registry = image_tools(ctx);
    workflow::register(&mut registry, workflow);
    registry
}

pub(crate) fn register_image_tool<F>(registry: &mut ToolRegistry, ctx: &Arc<ToolContext>, spec: ToolSpec, handler: F)
where
    F: Fn(&ToolContext, Arguments) -> ToolOutput + Send + Sync + 'static,
{
    let ctx = Arc::clone(ctx);
    registry.register_blocking(spec, move |args| handler(&ctx, args));
}

pub(crate) fn path_list(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| format!("  - {}\n", p.display()))
        .collect()
}
