pub mod preprocessing;
pub mod smoothing;
pub mod denoise;
pub mod extraction;

pub use preprocessing::*;
pub use smoothing::*;
pub use denoise::*;
pub use extraction::*;

use image::{DynamicImage, GrayImage, ImageBuffer, Luma, Pixel, Rgb, RgbImage, Rgba, RgbaImage};

use crate::error::{Result, VisionError};

/// Largest kernel size accepted after odd normalization
pub const MAX_KERNEL_SIZE: u32 = 99;

/// Force a kernel-like size to be odd: even values grow by one.
pub fn odd_kernel_size(size: i64) -> Result<u32> {
    if size < 0 {
        return Err(VisionError::InvalidParameter(format!(
            "kernel size must not be negative, got {size}"
        )));
    }
    let odd = if size % 2 == 0 { size.saturating_add(1) } else { size };
    match u32::try_from(odd) {
        Ok(odd) if odd <= MAX_KERNEL_SIZE => Ok(odd),
        _ => Err(VisionError::InvalidParameter(format!(
            "kernel size must be at most {MAX_KERNEL_SIZE}, got {size}"
        ))),
    }
}

/// Split an image into one 8-bit plane per channel
pub fn split_planes(image: &DynamicImage) -> Vec<GrayImage> {
    match image {
        DynamicImage::ImageLuma8(gray) => vec![gray.clone()],
        DynamicImage::ImageRgb8(rgb) => split(rgb),
        DynamicImage::ImageRgba8(rgba) => split(rgba),
        other if other.color().has_alpha() && other.color().has_color() => split(&other.to_rgba8()),
        other if other.color().has_color() => split(&other.to_rgb8()),
        other => vec![other.to_luma8()],
    }
}

fn split<P: Pixel<Subpixel = u8>>(image: &ImageBuffer<P, Vec<u8>>) -> Vec<GrayImage> {
    (0..usize::from(P::CHANNEL_COUNT))
        .map(|c| {
            GrayImage::from_fn(image.width(), image.height(), |x, y| {
                Luma([image.get_pixel(x, y).channels()[c]])
            })
        })
        .collect()
}

/// Reassemble planes produced by [`split_planes`]
pub fn merge_planes(planes: &[GrayImage]) -> Result<DynamicImage> {
    let Some(first) = planes.first() else {
        return Err(VisionError::ImageProcessing("no planes to merge".to_string()));
    };
    let (width, height) = first.dimensions();
    let px = |c: usize, x: u32, y: u32| planes[c].get_pixel(x, y)[0];

    match planes.len() {
        1 => Ok(DynamicImage::ImageLuma8(first.clone())),
        3 => Ok(DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
            Rgb([px(0, x, y), px(1, x, y), px(2, x, y)])
        }))),
        4 => Ok(DynamicImage::ImageRgba8(RgbaImage::from_fn(width, height, |x, y| {
            Rgba([px(0, x, y), px(1, x, y), px(2, x, y), px(3, x, y)])
        }))),
        n => Err(VisionError::ImageProcessing(format!("unsupported channel count: {n}"))),
    }
}

/// Apply a per-channel operation to every plane of the image
pub fn map_planes<F>(image: &DynamicImage, f: F) -> Result<DynamicImage>
where
    F: Fn(&GrayImage) -> GrayImage,
{
    let planes: Vec<GrayImage> = split_planes(image).iter().map(f).collect();
    merge_planes(&planes)
}

/// Mirror an out-of-range coordinate back into `0..len` without repeating the edge pixel
pub(crate) fn reflect_101(i: i64, len: i64) -> u32 {
    if len <= 1 {
        return 0;
    }
    let period = 2 * (len - 1);
    let mut i = i.rem_euclid(period);
    if i >= len {
        i = period - i;
    }
    i as u32
}
