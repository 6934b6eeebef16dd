use std::str::FromStr;

use image::{DynamicImage, GrayImage, ImageBuffer, Luma};
use strum::{Display, EnumString};

use crate::{
    algorithms::map_planes,
    error::{Result, VisionError},
    traits::ImageFilter,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum FilterType {
    #[default]
    Gaussian,
    Median,
    Bilateral,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum BlurType {
    #[default]
    Gaussian,
    Motion,
    Box,
    Average,
}

impl FilterType {
    pub fn parse(name: &str) -> Result<Self> {
        Self::from_str(name.trim()).map_err(|_| VisionError::UnknownVariant {
            kind: "filter type",
            name: name.to_string(),
        })
    }
}

impl BlurType {
    pub fn parse(name: &str) -> Result<Self> {
        Self::from_str(name.trim()).map_err(|_| VisionError::UnknownVariant {
            kind: "blur type",
            name: name.to_string(),
        })
    }
}

/// Parameters shared by the smoothing filters; sizes are already odd
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterParams {
    pub kernel_size: u32,
    pub sigma_x: f64,
    pub sigma_color: f64,
    pub sigma_space: f64,
}

impl Default for FilterParams {
    fn default() -> Self {
        Self {
            kernel_size: 5,
            sigma_x: 1.0,
            sigma_color: 75.0,
            sigma_space: 75.0,
        }
    }
}

/// Median of the square neighbourhood, per channel
#[derive(Debug, Clone, Copy)]
pub struct MedianFilter {
    pub radius: u32,
}

impl ImageFilter for MedianFilter {
    fn apply(&self, image: &DynamicImage) -> Result<DynamicImage> {
        map_planes(image, |plane| {
            imageproc::filter::median_filter(plane, self.radius, self.radius)
        })
    }
}

/// Edge-preserving smoothing, applied to each channel independently
#[derive(Debug, Clone, Copy)]
pub struct BilateralFilter {
    pub diameter: u32,
    pub sigma_color: f64,
    pub sigma_space: f64,
}

impl ImageFilter for BilateralFilter {
    fn apply(&self, image: &DynamicImage) -> Result<DynamicImage> {
        if image.width() == 0 || image.height() == 0 {
            return Ok(image.clone());
        }
        map_planes(image, |plane| {
            imageproc::filter::bilateral_filter(
                plane,
                self.diameter,
                self.sigma_color as f32,
                self.sigma_space as f32,
            )
        })
    }
}

/// Gaussian smoothing with an explicit odd kernel size
#[derive(Debug, Clone, Copy)]
pub struct GaussianBlur {
    pub kernel_size: u32,
    /// Non-positive values are derived from the kernel size
    pub sigma: f64,
}

impl GaussianBlur {
    pub fn weights(&self) -> Vec<f32> {
        let sigma = if self.sigma > 0.0 {
            self.sigma
        } else {
            0.3 * ((f64::from(self.kernel_size) - 1.0) * 0.5 - 1.0) + 0.8
        };
        let center = f64::from(self.kernel_size / 2);
        let row: Vec<f64> = (0..self.kernel_size)
            .map(|i| {
                let d = f64::from(i) - center;
                (-(d * d) / (2.0 * sigma * sigma)).exp()
            })
            .collect();
        let sum: f64 = row.iter().sum();
        row.iter().map(|w| (w / sum) as f32).collect()
    }
}

impl ImageFilter for GaussianBlur {
    fn apply(&self, image: &DynamicImage) -> Result<DynamicImage> {
        let row = self.weights();
        map_planes(image, |plane| {
            // Filter in f32 so the result is rounded once instead of truncated per pass
            let wide = ImageBuffer::<Luma<f32>, Vec<f32>>::from_fn(plane.width(), plane.height(), |x, y| {
                Luma([f32::from(plane.get_pixel(x, y)[0])])
            });
            let smoothed = imageproc::filter::separable_filter_equal(&wide, &row);
            GrayImage::from_fn(plane.width(), plane.height(), |x, y| {
                Luma([smoothed.get_pixel(x, y)[0].round().clamp(0.0, 255.0) as u8])
            })
        })
    }
}

/// Normalized box filter
#[derive(Debug, Clone, Copy)]
pub struct BoxBlur {
    pub kernel_size: u32,
}

impl ImageFilter for BoxBlur {
    fn apply(&self, image: &DynamicImage) -> Result<DynamicImage> {
        let radius = self.kernel_size / 2;
        map_planes(image, |plane| imageproc::filter::box_filter(plane, radius, radius))
    }
}

/// Directional blur along a line through the kernel center
#[derive(Debug, Clone, Copy)]
pub struct MotionBlur {
    pub kernel_size: u32,
    /// Degrees, counter-clockwise from the x axis
    pub angle: f64,
}

impl MotionBlur {
    /// Row-major weights: ones on the line, normalized to sum 1
    pub fn weights(&self) -> Vec<f32> {
        let size = i64::from(self.kernel_size);
        let mut weights = vec![0.0f32; (self.kernel_size as usize).pow(2)];
        let center = size / 2;
        let (sin, cos) = self.angle.to_radians().sin_cos();

        for i in -center..=center {
            let x = center + (i as f64 * cos).round() as i64;
            let y = center + (i as f64 * sin).round() as i64;
            if (0..size).contains(&x) && (0..size).contains(&y) {
                weights[(y * size + x) as usize] = 1.0;
            }
        }

        let sum: f32 = weights.iter().sum();
        if sum > 0.0 {
            weights.iter_mut().for_each(|w| *w /= sum);
        }
        weights
    }
}

impl ImageFilter for MotionBlur {
    fn apply(&self, image: &DynamicImage) -> Result<DynamicImage> {
        let weights = self.weights();
        let kernel = imageproc::filter::Kernel::new(&weights, self.kernel_size, self.kernel_size);
        map_planes(image, |plane| {
            kernel.filter(plane, |channel: &mut u8, acc: f32| {
                *channel = acc.round().clamp(0.0, 255.0) as u8;
            })
        })
    }
}

pub fn filter(image: &DynamicImage, kind: FilterType, params: &FilterParams) -> Result<DynamicImage> {
    let op: Box<dyn ImageFilter> = match kind {
        FilterType::Gaussian => Box::new(GaussianBlur {
            kernel_size: params.kernel_size,
            sigma: params.sigma_x,
        }),
        FilterType::Median => Box::new(MedianFilter { radius: params.kernel_size / 2 }),
        FilterType::Bilateral => Box::new(BilateralFilter {
            diameter: params.kernel_size,
            sigma_color: params.sigma_color,
            sigma_space: params.sigma_space,
        }),
    };
    op.apply(image)
}

pub fn blur(image: &DynamicImage, kind: BlurType, kernel_size: u32, angle: f64) -> Result<DynamicImage> {
    let op: Box<dyn ImageFilter> = match kind {
        BlurType::Gaussian => Box::new(GaussianBlur { kernel_size, sigma: 0.0 }),
        BlurType::Box | BlurType::Average => Box::new(BoxBlur { kernel_size }),
        BlurType::Motion => Box::new(MotionBlur { kernel_size, angle }),
    };
    op.apply(image)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn noisy() -> DynamicImage {
        let mut img = RgbImage::from_pixel(12, 12, Rgb([100, 100, 100]));
        img.put_pixel(6, 6, Rgb([255, 255, 255]));
        DynamicImage::ImageRgb8(img)
    }

    #[test]
    fn test_unknown_filter_type_is_an_error() {
        let err = FilterType::parse("SHARPEN").unwrap_err();
        assert_eq!(err.to_string(), "Unknown filter type: SHARPEN");
        assert_eq!(FilterType::parse("median").unwrap(), FilterType::Median);
        assert_eq!(BlurType::parse("average").unwrap(), BlurType::Average);
        assert!(BlurType::parse("RADIAL").is_err());
    }

    #[test]
    fn test_median_removes_impulse() {
        let output = filter(&noisy(), FilterType::Median, &FilterParams { kernel_size: 3, ..Default::default() })
            .unwrap();
        assert_eq!(output.to_rgb8().get_pixel(6, 6), &Rgb([100, 100, 100]));
    }

    #[test]
    fn test_filters_preserve_shape_and_layout() {
        let image = noisy();
        for kind in [FilterType::Gaussian, FilterType::Median, FilterType::Bilateral] {
            let output = filter(&image, kind, &FilterParams::default()).unwrap();
            assert_eq!((output.width(), output.height()), (12, 12));
            assert_eq!(output.color(), image.color(), "{kind} changed the layout");
        }
        for kind in [BlurType::Gaussian, BlurType::Motion, BlurType::Box, BlurType::Average] {
            let output = blur(&image, kind, 5, 45.0).unwrap();
            assert_eq!((output.width(), output.height()), (12, 12));
        }
    }

    #[test]
    fn test_kernel_weights_are_normalized() {
        let sum = |w: Vec<f32>| w.iter().sum::<f32>();
        assert!((sum(GaussianBlur { kernel_size: 7, sigma: 1.5 }.weights()) - 1.0).abs() < 1e-5);
        assert!((sum(GaussianBlur { kernel_size: 7, sigma: 0.0 }.weights()) - 1.0).abs() < 1e-5);
        assert!((sum(MotionBlur { kernel_size: 9, angle: 30.0 }.weights()) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_horizontal_motion_kernel_is_center_row() {
        let weights = MotionBlur { kernel_size: 5, angle: 0.0 }.weights();
        for (i, w) in weights.iter().enumerate() {
            let expected = if i / 5 == 2 { 0.2 } else { 0.0 };
            assert!((w - expected).abs() < 1e-6, "weight {i} was {w}");
        }
    }

    #[test]
    fn test_vertical_motion_kernel_is_center_column() {
        let nonzero: Vec<usize> = MotionBlur { kernel_size: 3, angle: 90.0 }
            .weights()
            .iter()
            .enumerate()
            .filter(|(_, w)| **w > 0.0)
            .map(|(i, _)| i)
            .collect();
        assert_eq!(nonzero, vec![1, 4, 7]);
    }

    #[test]
    fn test_box_blur_spreads_impulse() {
        let mut plane = GrayImage::new(5, 5);
        plane.put_pixel(2, 2, Luma([90]));
        let blurred = blur(&DynamicImage::ImageLuma8(plane), BlurType::Box, 3, 0.0).unwrap().to_luma8();
        assert_eq!(blurred.get_pixel(2, 2)[0], 10);
        assert_eq!(blurred.get_pixel(1, 1)[0], 10);
        assert_eq!(blurred.get_pixel(0, 0)[0], 0);
    }

    #[test]
    fn test_smoothing_keeps_flat_planes_flat() {
        let flat = DynamicImage::ImageLuma8(GrayImage::from_pixel(9, 9, Luma([90])));
        for kind in [BlurType::Gaussian, BlurType::Motion, BlurType::Box] {
            assert_eq!(blur(&flat, kind, 5, 30.0).unwrap(), flat, "{kind} changed a flat plane");
        }
    }

    #[test]
    fn test_motion_blur_smears_along_the_angle() {
        let mut plane = GrayImage::new(9, 9);
        plane.put_pixel(4, 4, Luma([250]));
        let smeared = blur(&DynamicImage::ImageLuma8(plane), BlurType::Motion, 5, 0.0).unwrap().to_luma8();
        assert_eq!(smeared.get_pixel(5, 4)[0], 50);
        assert_eq!(smeared.get_pixel(4, 5)[0], 0);
    }

    #[test]
    fn test_bilateral_keeps_flat_regions() {
        let flat = DynamicImage::ImageRgb8(RgbImage::from_pixel(8, 8, Rgb([40, 80, 120])));
        let output = filter(&flat, FilterType::Bilateral, &FilterParams::default()).unwrap();
        assert_eq!(output, flat);
    }
}
