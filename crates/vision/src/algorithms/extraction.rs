use std::path::{Path, PathBuf};

use image::{DynamicImage, GrayImage, Rgb, RgbImage};
use imageproc::{
    contours::BorderType,
    drawing::{draw_filled_circle_mut, draw_hollow_rect_mut, draw_line_segment_mut},
    rect::Rect,
};

use crate::{
    algorithms::{ThresholdType, threshold},
    error::Result,
    traits::ContourExtractor,
    types::{BlobDescriptor, Contour},
};

const CONTOUR_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const CENTER_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
const BBOX_COLOR: Rgb<u8> = Rgb([0, 0, 255]);

/// Imageproc-based extractor returning only the outermost borders
#[derive(Debug, Clone, Default)]
pub struct ImageprocContourExtractor;

impl ContourExtractor for ImageprocContourExtractor {
    fn extract_contours(&self, binary_image: &GrayImage) -> Result<Vec<Contour>> {
        let contours = imageproc::contours::find_contours::<i32>(binary_image);

        let result = contours
            .into_iter()
            .filter(|contour| matches!(contour.border_type, BorderType::Outer) && contour.parent.is_none())
            .map(|contour| {
                Contour::new(
                    contour.points
                        .iter()
                        .map(|p| [f64::from(p.x), f64::from(p.y)])
                        .collect(),
                )
            })
            .collect();

        Ok(result)
    }
}

/// Area and circularity bounds; `None` disables a bound
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContourFilter {
    pub min_area: f64,
    pub max_area: Option<f64>,
    pub min_circularity: Option<f64>,
    pub max_circularity: Option<f64>,
}

impl Default for ContourFilter {
    fn default() -> Self {
        Self::from_bounds(100.0, -1.0, 0.0, 1.0)
    }
}

impl ContourFilter {
    /// `max_area <= 0` means unlimited; a negative circularity bound is ignored
    pub fn from_bounds(min_area: f64, max_area: f64, min_circularity: f64, max_circularity: f64) -> Self {
        Self {
            min_area,
            max_area: (max_area > 0.0).then_some(max_area),
            min_circularity: (min_circularity >= 0.0).then_some(min_circularity),
            max_circularity: (max_circularity >= 0.0).then_some(max_circularity),
        }
    }

    pub fn accepts(&self, blob: &BlobDescriptor) -> bool {
        if blob.area < self.min_area {
            return false;
        }
        if self.max_area.is_some_and(|max| blob.area > max) {
            return false;
        }
        if self.min_circularity.is_some_and(|min| blob.circularity < min) {
            return false;
        }
        if self.max_circularity.is_some_and(|max| blob.circularity > max) {
            return false;
        }
        true
    }
}

/// Blobs that survived the filter, with the contour each was measured from
#[derive(Debug, Clone)]
pub struct ContourAnalysis {
    pub contours: Vec<Contour>,
    pub blobs: Vec<BlobDescriptor>,
}

/// Threshold at 127, trace external contours and keep those within bounds
pub fn detect_blobs(image: &DynamicImage, filter: &ContourFilter) -> Result<ContourAnalysis> {
    let binary = threshold(&image.to_luma8(), 127.0, ThresholdType::Binary);
    let mut analysis = ContourAnalysis { contours: Vec::new(), blobs: Vec::new() };

    for contour in ImageprocContourExtractor.extract_contours(&binary)? {
        let blob = contour.descriptor();
        if filter.accepts(&blob) {
            analysis.contours.push(contour);
            analysis.blobs.push(blob);
        }
    }
    Ok(analysis)
}

/// Draw contours, centroids and bounding boxes over a color copy of the image
pub fn visualize(image: &DynamicImage, analysis: &ContourAnalysis) -> RgbImage {
    let mut canvas = image.to_rgb8();

    for (contour, blob) in analysis.contours.iter().zip(&analysis.blobs) {
        if blob.bbox.width > 0 && blob.bbox.height > 0 {
            draw_hollow_rect_mut(
                &mut canvas,
                Rect::at(blob.bbox.x, blob.bbox.y).of_size(blob.bbox.width, blob.bbox.height),
                BBOX_COLOR,
            );
        }

        let points = &contour.points;
        for (i, start) in points.iter().enumerate() {
            let end = points[(i + 1) % points.len()];
            draw_line_segment_mut(
                &mut canvas,
                (start[0] as f32, start[1] as f32),
                (end[0] as f32, end[1] as f32),
                CONTOUR_COLOR,
            );
        }

        draw_filled_circle_mut(
            &mut canvas,
            (blob.center_x.round() as i32, blob.center_y.round() as i32),
            3,
            CENTER_COLOR,
        );
    }
    canvas
}

/// Crop one region of `source` per external contour of `mask`
pub fn extract_regions(source: &DynamicImage, mask: &DynamicImage) -> Result<Vec<DynamicImage>> {
    let binary = mask.to_luma8();
    let contours = ImageprocContourExtractor.extract_contours(&binary)?;
    let (width, height) = (source.width(), source.height());

    let regions = contours
        .iter()
        .filter_map(|contour| {
            let bbox = contour.bounding_box();
            let x = u32::try_from(bbox.x.max(0)).ok()?;
            let y = u32::try_from(bbox.y.max(0)).ok()?;
            if x >= width || y >= height {
                return None;
            }
            let w = bbox.width.min(width - x);
            let h = bbox.height.min(height - y);
            (w > 0 && h > 0).then(|| source.crop_imm(x, y, w, h))
        })
        .collect();
    Ok(regions)
}

/// `<dir>/<stem>_region_<index:03><ext>`, with `.png` when `base` has no extension
pub fn numbered_region_path(base: &Path, index: usize) -> PathBuf {
    let stem = base
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("segmented_output");
    let extension = base
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("png");
    base.with_file_name(format!("{stem}_region_{index:03}.{extension}"))
}
