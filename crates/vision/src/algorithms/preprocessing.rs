use std::str::FromStr;

use image::{DynamicImage, GrayImage, Luma, imageops::FilterType};
use strum::{Display, EnumString};

use crate::error::{Result, VisionError};

/// Interpolation used when resizing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum Interpolation {
    Nearest,
    #[default]
    Linear,
    Cubic,
    Area,
    #[strum(serialize = "LANCZOS4")]
    Lanczos4,
}

impl Interpolation {
    /// Parse a name, falling back to `Linear` for anything unrecognized
    pub fn from_name(name: &str) -> Self {
        Self::from_str(name.trim()).unwrap_or_else(|_| {
            tracing::debug!("Unknown interpolation '{}', using LINEAR", name);
            Self::Linear
        })
    }

    fn filter(self) -> FilterType {
        match self {
            Interpolation::Nearest => FilterType::Nearest,
            Interpolation::Linear => FilterType::Triangle,
            Interpolation::Cubic => FilterType::CatmullRom,
            Interpolation::Area => FilterType::Gaussian,
            Interpolation::Lanczos4 => FilterType::Lanczos3,
        }
    }
}

/// Global threshold modes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString)]
#[strum(ascii_case_insensitive)]
pub enum ThresholdType {
    #[default]
    #[strum(serialize = "BINARY")]
    Binary,
    #[strum(serialize = "BINARY_INV")]
    BinaryInv,
    #[strum(serialize = "TRUNC")]
    Trunc,
    #[strum(serialize = "TOZERO")]
    ToZero,
    #[strum(serialize = "TOZERO_INV")]
    ToZeroInv,
    /// Binary threshold at the level picked by Otsu's method
    #[strum(serialize = "OTSU")]
    Otsu,
}

impl ThresholdType {
    /// Parse a name, falling back to `Binary` for anything unrecognized
    pub fn from_name(name: &str) -> Self {
        Self::from_str(name.trim()).unwrap_or_else(|_| {
            tracing::debug!("Unknown threshold type '{}', using BINARY", name);
            Self::Binary
        })
    }
}

pub fn resize(image: &DynamicImage, width: i64, height: i64, interpolation: Interpolation) -> Result<DynamicImage> {
    let (Ok(width), Ok(height)) = (u32::try_from(width), u32::try_from(height)) else {
        return Err(VisionError::InvalidParameter(format!(
            "width and height must be positive, got {width}x{height}"
        )));
    };
    if width == 0 || height == 0 {
        return Err(VisionError::InvalidParameter(format!(
            "width and height must be positive, got {width}x{height}"
        )));
    }
    Ok(image.resize_exact(width, height, interpolation.filter()))
}

/// Single-channel copy of the image; already-gray input is cloned unchanged
pub fn to_grayscale(image: &DynamicImage) -> DynamicImage {
    match image {
        DynamicImage::ImageLuma8(_) => image.clone(),
        other => DynamicImage::ImageLuma8(other.to_luma8()),
    }
}

/// Apply a global threshold with a maximum value of 255
pub fn threshold(image: &GrayImage, level: f64, kind: ThresholdType) -> GrayImage {
    let level = match kind {
        ThresholdType::Otsu => f64::from(imageproc::contrast::otsu_level(image)),
        _ => level,
    };
    // Pixels are integral, so `value > level` is `value > floor(level)`
    let cut = level.clamp(0.0, 255.0).floor() as u8;

    match kind {
        ThresholdType::Binary | ThresholdType::Otsu if level >= 0.0 => {
            return imageproc::contrast::threshold(image, cut);
        }
        ThresholdType::BinaryInv if level >= 0.0 => {
            let mut output = imageproc::contrast::threshold(image, cut);
            complement(&mut output);
            return output;
        }
        _ => {}
    }

    let mut output = image.clone();
    for pixel in output.pixels_mut() {
        let value = pixel[0];
        let above = f64::from(value) > level;
        pixel[0] = match kind {
            ThresholdType::Binary | ThresholdType::Otsu => if above { 255 } else { 0 },
            ThresholdType::BinaryInv => if above { 0 } else { 255 },
            ThresholdType::Trunc => if above { cut } else { value },
            ThresholdType::ToZero => if above { value } else { 0 },
            ThresholdType::ToZeroInv => if above { 0 } else { value },
        };
    }
    output
}

fn complement(image: &mut GrayImage) {
    for pixel in image.pixels_mut() {
        *pixel = Luma([!pixel[0]]);
    }
}

/// Grayscale conversion, threshold, then optional bitwise complement
pub fn segment(image: &DynamicImage, level: f64, kind: ThresholdType, invert: bool) -> GrayImage {
    let gray = image.to_luma8();
    let mut binary = threshold(&gray, level, kind);
    if invert {
        complement(&mut binary);
    }
    binary
}
