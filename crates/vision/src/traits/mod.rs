use image::{DynamicImage, GrayImage};
use crate::{error::Result, types::Contour};

/// Trait for whole-image filtering algorithms (blur, smoothing, denoising)
pub trait ImageFilter: Send + Sync {
    /// Filter the image, preserving its dimensions and channel layout
    fn apply(&self, image: &DynamicImage) -> Result<DynamicImage>;
}

/// Trait for contour extraction algorithms
pub trait ContourExtractor: Send + Sync {
    /// Extract contours from a binary image (non-zero pixels are foreground)
    fn extract_contours(&self, image: &GrayImage) -> Result<Vec<Contour>>;
}
