use std::fmt;

use serde::{Deserialize, Serialize};
use geo_types::{Coord, LineString, Polygon};

/// A closed contour traced along the border pixels of a region
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contour {
    pub points: Vec<[f64; 2]>,
}

impl Contour {
    pub fn new(points: Vec<[f64; 2]>) -> Self {
        Self { points }
    }

    /// Convert to geo-types Polygon for geometric operations
    pub fn to_geo_polygon(&self) -> Polygon<f64> {
        let coords: Vec<Coord<f64>> = self.points
            .iter()
            .map(|&[x, y]| Coord { x, y })
            .collect();

        Polygon::new(LineString::new(coords), vec![])
    }

    /// Enclosed area of the contour polygon
    pub fn area(&self) -> f64 {
        use geo::Area;
        if self.points.len() < 3 {
            return 0.0;
        }
        self.to_geo_polygon().unsigned_area()
    }

    /// Length of the closed contour, including the segment back to the first point
    pub fn perimeter(&self) -> f64 {
        if self.points.len() < 2 {
            return 0.0;
        }

        let mut total = 0.0;
        for window in self.points.windows(2) {
            total += distance(window[0], window[1]);
        }
        if let (Some(&first), Some(&last)) = (self.points.first(), self.points.last()) {
            total += distance(last, first);
        }
        total
    }

    /// 4π·area / perimeter², in [0, 1]; degenerate contours score 0
    pub fn circularity(&self) -> f64 {
        let perimeter = self.perimeter();
        if perimeter <= 0.0 {
            return 0.0;
        }
        (4.0 * std::f64::consts::PI * self.area() / (perimeter * perimeter)).clamp(0.0, 1.0)
    }

    /// Smallest pixel-aligned box containing every contour point
    pub fn bounding_box(&self) -> BoundingBox {
        let mut min_x = f64::INFINITY;
        let mut min_y = f64::INFINITY;
        let mut max_x = f64::NEG_INFINITY;
        let mut max_y = f64::NEG_INFINITY;

        for &[x, y] in &self.points {
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
        }

        if self.points.is_empty() {
            return BoundingBox { x: 0, y: 0, width: 0, height: 0 };
        }

        BoundingBox {
            x: min_x as i32,
            y: min_y as i32,
            width: (max_x - min_x) as u32 + 1,
            height: (max_y - min_y) as u32 + 1,
        }
    }

    /// Area centroid of the contour, falling back to the bounding box center
    pub fn centroid(&self) -> [f64; 2] {
        use geo::Centroid;
        if self.area() > 0.0 {
            if let Some(centroid) = self.to_geo_polygon().centroid() {
                return [centroid.x(), centroid.y()];
            }
        }
        let bbox = self.bounding_box();
        [
            f64::from(bbox.x) + f64::from(bbox.width.saturating_sub(1)) / 2.0,
            f64::from(bbox.y) + f64::from(bbox.height.saturating_sub(1)) / 2.0,
        ]
    }

    pub fn descriptor(&self) -> BlobDescriptor {
        let [center_x, center_y] = self.centroid();
        BlobDescriptor {
            center_x,
            center_y,
            circularity: self.circularity(),
            bbox: self.bounding_box(),
            area: self.area(),
        }
    }
}

fn distance(a: [f64; 2], b: [f64; 2]) -> f64 {
    let dx = b[0] - a[0];
    let dy = b[1] - a[1];
    (dx * dx + dy * dy).sqrt()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

/// Geometry of one detected region
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlobDescriptor {
    pub center_x: f64,
    pub center_y: f64,
    pub circularity: f64,
    pub bbox: BoundingBox,
    pub area: f64,
}

pub const BLOB_CSV_HEADER: &str = "center_x,center_y,circularity,bbox_x,bbox_y,bbox_width,bbox_height,area";

impl BlobDescriptor {
    pub fn csv_row(&self) -> String {
        format!(
            "{:.2},{:.2},{:.4},{},{},{},{},{:.2}",
            self.center_x,
            self.center_y,
            self.circularity,
            self.bbox.x,
            self.bbox.y,
            self.bbox.width,
            self.bbox.height,
            self.area
        )
    }
}

/// Render blobs as CSV with a header line
pub fn blobs_to_csv(blobs: &[BlobDescriptor]) -> String {
    let mut csv = String::from(BLOB_CSV_HEADER);
    csv.push('\n');
    for blob in blobs {
        csv.push_str(&blob.csv_row());
        csv.push('\n');
    }
    csv
}

/// Dimensions and layout of a decoded image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageInfo {
    pub width: u32,
    pub height: u32,
    pub channels: u8,
    pub depth_bits: u8,
}

impl ImageInfo {
    pub fn of(image: &image::DynamicImage) -> Self {
        let color = image.color();
        let channels = color.channel_count();
        Self {
            width: image.width(),
            height: image.height(),
            channels,
            depth_bits: (color.bits_per_pixel() / u16::from(channels)) as u8,
        }
    }
}

impl fmt::Display for ImageInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "- Width: {}\n- Height: {}\n- Channels: {}\n- Depth: {}-bit",
            self.width, self.height, self.channels, self.depth_bits
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(side: f64) -> Contour {
        Contour::new(vec![[0.0, 0.0], [side, 0.0], [side, side], [0.0, side]])
    }

    #[test]
    fn test_square_geometry() {
        let contour = square(10.0);
        assert!((contour.area() - 100.0).abs() < 1e-9);
        assert!((contour.perimeter() - 40.0).abs() < 1e-9);
        let [cx, cy] = contour.centroid();
        assert!((cx - 5.0).abs() < 1e-9 && (cy - 5.0).abs() < 1e-9);
        assert_eq!(contour.bounding_box(), BoundingBox { x: 0, y: 0, width: 11, height: 11 });
        assert!((contour.circularity() - std::f64::consts::PI / 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_degenerate_contour_has_zero_circularity() {
        let contour = Contour::new(vec![[3.0, 4.0]]);
        assert_eq!(contour.area(), 0.0);
        assert_eq!(contour.circularity(), 0.0);
        assert_eq!(contour.centroid(), [3.0, 4.0]);
    }

    #[test]
    fn test_csv_formatting() {
        let blob = square(10.0).descriptor();
        let csv = blobs_to_csv(&[blob]);
        let mut lines = csv.lines();
        assert_eq!(lines.next(), Some(BLOB_CSV_HEADER));
        assert_eq!(lines.next(), Some("5.00,5.00,0.7854,0,0,11,11,100.00"));
    }
}
