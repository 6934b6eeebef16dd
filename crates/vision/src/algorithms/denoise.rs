use image::{DynamicImage, GrayImage, Luma};

use crate::{
    algorithms::{merge_planes, reflect_101, split_planes},
    error::{Result, VisionError},
    traits::ImageFilter,
};

/// Non-local means denoising.
///
/// Each output pixel is a weighted mean over the search window, where the
/// weight of a candidate falls off with the mean squared difference between
/// the template patches around it and around the target pixel. Patch
/// distances are read from one integral image per search offset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NonLocalMeans {
    pub h: f64,
    /// Odd patch size
    pub template_window: u32,
    /// Odd search area size
    pub search_window: u32,
}

impl Default for NonLocalMeans {
    fn default() -> Self {
        Self {
            h: 10.0,
            template_window: 7,
            search_window: 21,
        }
    }
}

/// Largest accepted patch size
pub const MAX_TEMPLATE_WINDOW: u32 = 21;
/// Largest accepted search area size
pub const MAX_SEARCH_WINDOW: u32 = 51;

impl NonLocalMeans {
    pub fn new(h: f64, template_window: u32, search_window: u32) -> Result<Self> {
        if h.is_nan() || h <= 0.0 {
            return Err(VisionError::InvalidParameter(format!(
                "filter strength h must be positive, got {h}"
            )));
        }
        if template_window > MAX_TEMPLATE_WINDOW {
            return Err(VisionError::InvalidParameter(format!(
                "template window must be at most {MAX_TEMPLATE_WINDOW}, got {template_window}"
            )));
        }
        if search_window > MAX_SEARCH_WINDOW {
            return Err(VisionError::InvalidParameter(format!(
                "search window must be at most {MAX_SEARCH_WINDOW}, got {search_window}"
            )));
        }
        Ok(Self { h, template_window, search_window })
    }

    /// Grayscale variant
    pub fn denoise_gray(&self, image: &GrayImage) -> GrayImage {
        let mut planes = self.denoise_planes(std::slice::from_ref(image));
        planes.pop().unwrap_or_else(|| image.clone())
    }

    /// Colored variant: patch distances are accumulated over every channel
    pub fn denoise_colored(&self, image: &DynamicImage) -> Result<DynamicImage> {
        let planes = split_planes(image);
        merge_planes(&self.denoise_planes(&planes))
    }

    fn denoise_planes(&self, planes: &[GrayImage]) -> Vec<GrayImage> {
        let Some(first) = planes.first() else {
            return Vec::new();
        };
        let (width, height) = first.dimensions();
        let (w, h) = (i64::from(width), i64::from(height));
        let template_radius = i64::from(self.template_window / 2);
        let search_radius = i64::from(self.search_window / 2);

        // Padded grid covering every template around every pixel
        let pw = w + 2 * template_radius;
        let ph = h + 2 * template_radius;
        let sample = |plane: &GrayImage, x: i64, y: i64| {
            f64::from(plane.get_pixel(reflect_101(x, w), reflect_101(y, h))[0])
        };

        let patch_len = (self.template_window * self.template_window) as f64 * planes.len() as f64;
        let h2 = self.h * self.h;
        let pixel_count = (width * height) as usize;
        let mut weight_sum = vec![0.0f64; pixel_count];
        let mut sums = vec![vec![0.0f64; pixel_count]; planes.len()];
        let mut integral = vec![0.0f64; ((pw + 1) * (ph + 1)) as usize];
        let stride = pw + 1;

        for dy in -search_radius..=search_radius {
            for dx in -search_radius..=search_radius {
                for py in 0..ph {
                    let mut row = 0.0;
                    for px in 0..pw {
                        let x = px - template_radius;
                        let y = py - template_radius;
                        let diff: f64 = planes
                            .iter()
                            .map(|plane| {
                                let d = sample(plane, x, y) - sample(plane, x + dx, y + dy);
                                d * d
                            })
                            .sum();
                        row += diff;
                        integral[((py + 1) * stride + px + 1) as usize] =
                            integral[(py * stride + px + 1) as usize] + row;
                    }
                }

                let t = 2 * template_radius + 1;
                for y in 0..h {
                    for x in 0..w {
                        let at = |xx: i64, yy: i64| integral[(yy * stride + xx) as usize];
                        let patch = at(x + t, y + t) - at(x, y + t) - at(x + t, y) + at(x, y);
                        let weight = (-(patch / patch_len) / h2).exp();
                        let idx = (y * w + x) as usize;
                        weight_sum[idx] += weight;
                        for (sum, plane) in sums.iter_mut().zip(planes) {
                            sum[idx] += weight * sample(plane, x + dx, y + dy);
                        }
                    }
                }
            }
        }

        sums.iter()
            .map(|sum| {
                GrayImage::from_fn(width, height, |x, y| {
                    let idx = (y * width + x) as usize;
                    Luma([(sum[idx] / weight_sum[idx]).round().clamp(0.0, 255.0) as u8])
                })
            })
            .collect()
    }
}

impl ImageFilter for NonLocalMeans {
    fn apply(&self, image: &DynamicImage) -> Result<DynamicImage> {
        match image {
            DynamicImage::ImageLuma8(gray) => Ok(DynamicImage::ImageLuma8(self.denoise_gray(gray))),
            other => self.denoise_colored(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn speckled() -> GrayImage {
        GrayImage::from_fn(16, 16, |x, y| {
            if (x * 7 + y * 3) % 11 == 0 { Luma([200]) } else { Luma([100]) }
        })
    }

    fn variance(image: &GrayImage) -> f64 {
        let n = f64::from(image.width() * image.height());
        let mean = image.pixels().map(|p| f64::from(p[0])).sum::<f64>() / n;
        image.pixels().map(|p| (f64::from(p[0]) - mean).powi(2)).sum::<f64>() / n
    }

    #[test]
    fn test_flat_image_is_unchanged() {
        let flat = GrayImage::from_pixel(9, 9, Luma([77]));
        let nlm = NonLocalMeans::new(10.0, 3, 5).unwrap();
        assert_eq!(nlm.denoise_gray(&flat), flat);
    }

    #[test]
    fn test_denoising_reduces_variance() {
        let noisy = speckled();
        let nlm = NonLocalMeans::new(60.0, 3, 7).unwrap();
        let cleaned = nlm.denoise_gray(&noisy);
        assert!(variance(&cleaned) < variance(&noisy));
    }

    #[test]
    fn test_colored_variant_keeps_channels() {
        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(8, 8, Rgb([10, 120, 230])));
        let nlm = NonLocalMeans::new(10.0, 3, 5).unwrap();
        let output = nlm.apply(&image).unwrap();
        assert_eq!(output, image);
    }

    #[test]
    fn test_non_positive_strength_is_rejected() {
        assert!(NonLocalMeans::new(0.0, 7, 21).is_err());
        assert!(NonLocalMeans::new(f64::NAN, 7, 21).is_err());
    }

    #[test]
    fn test_oversized_windows_are_rejected() {
        assert!(NonLocalMeans::new(10.0, MAX_TEMPLATE_WINDOW, MAX_SEARCH_WINDOW).is_ok());
        assert!(NonLocalMeans::new(10.0, 23, 21).is_err());
        assert!(NonLocalMeans::new(10.0, 7, 53).is_err());
    }
}
