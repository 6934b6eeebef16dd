//! Decoding images from the supported sources and encoding results.

use std::io::{Cursor, Read};
use std::path::Path;

use base64::{Engine as _, engine::general_purpose::STANDARD};
use image::{DynamicImage, ImageFormat};

use crate::error::{Result, VisionError};

/// Largest payload accepted from a remote URL.
const MAX_FETCH_BYTES: u64 = 64 * 1024 * 1024;

/// Where to read an image from when it is not already cached
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageSource<'a> {
    /// Base64 payload, optionally wrapped in a `data:` URI
    Data(&'a str),
    Url(&'a str),
    Path(&'a Path),
}

impl ImageSource<'_> {
    pub fn load(&self) -> Result<DynamicImage> {
        match self {
            ImageSource::Data(data) => decode_base64(data),
            ImageSource::Url(url) => fetch_url(url),
            ImageSource::Path(path) => load_path(path),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ImageSource::Data(_) => "data",
            ImageSource::Url(_) => "url",
            ImageSource::Path(_) => "path",
        }
    }
}

pub fn load_path(path: &Path) -> Result<DynamicImage> {
    let bytes = std::fs::read(path).map_err(|e| {
        VisionError::Io(std::io::Error::new(
            e.kind(),
            format!("cannot read {}: {e}", path.display()),
        ))
    })?;
    decode_bytes(&bytes)
}

pub fn fetch_url(url: &str) -> Result<DynamicImage> {
    tracing::debug!("Fetching image from {}", url);
    let response = ureq::get(url).call().map_err(|e| fetch_failed(url, e))?;
    let mut bytes = Vec::new();
    response
        .into_reader()
        .take(MAX_FETCH_BYTES)
        .read_to_end(&mut bytes)
        .map_err(|e| fetch_failed(url, e))?;
    decode_bytes(&bytes)
}

/// Network failures surface as IO errors, like unreadable files
fn fetch_failed(url: &str, err: impl std::fmt::Display) -> VisionError {
    VisionError::Io(std::io::Error::other(format!("failed to fetch {url}: {err}")))
}

pub fn decode_base64(data: &str) -> Result<DynamicImage> {
    let payload = match data.split_once(";base64,") {
        Some((prefix, rest)) if prefix.starts_with("data:") => rest,
        _ => data,
    };
    let cleaned: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = STANDARD.decode(cleaned)?;
    decode_bytes(&bytes)
}

pub fn decode_bytes(bytes: &[u8]) -> Result<DynamicImage> {
    let image = image::load_from_memory(bytes)?;
    Ok(normalize(image))
}

/// Reduce any decoded layout to 8-bit Luma, RGB or RGBA
pub fn normalize(image: DynamicImage) -> DynamicImage {
    match image {
        DynamicImage::ImageLuma8(_) | DynamicImage::ImageRgb8(_) | DynamicImage::ImageRgba8(_) => image,
        other => {
            let color = other.color();
            if color.has_alpha() && color.has_color() {
                DynamicImage::ImageRgba8(other.to_rgba8())
            } else if color.has_color() {
                DynamicImage::ImageRgb8(other.to_rgb8())
            } else {
                DynamicImage::ImageLuma8(other.to_luma8())
            }
        }
    }
}

pub fn encode_png(image: &DynamicImage) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    image.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
    Ok(bytes)
}

pub fn encode_png_base64(image: &DynamicImage) -> Result<String> {
    Ok(STANDARD.encode(encode_png(image)?))
}

/// Write the image to disk, choosing the format from the file extension
pub fn save(image: &DynamicImage, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let is_jpeg = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("jpg") || ext.eq_ignore_ascii_case("jpeg"));

    if is_jpeg && image.color().has_alpha() {
        DynamicImage::ImageRgb8(image.to_rgb8()).save(path)?;
    } else {
        image.save(path)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage, Rgba, RgbaImage};

    #[test]
    fn test_base64_round_trip_through_data_uri() {
        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(4, 3, Rgb([255, 0, 0])));
        let encoded = encode_png_base64(&image).expect("Should encode");

        let decoded = decode_base64(&format!("data:image/png;base64,{encoded}"))
            .expect("Should decode data URI");
        assert_eq!((decoded.width(), decoded.height()), (4, 3));
        assert_eq!(decoded.to_rgb8().get_pixel(0, 0), &Rgb([255, 0, 0]));
    }

    #[test]
    fn test_invalid_base64_is_rejected() {
        let err = decode_base64("not base64 !!").unwrap_err();
        assert!(matches!(err, VisionError::Base64(_)));
    }

    #[test]
    fn test_missing_path_reports_io_error() {
        let err = ImageSource::Path(Path::new("/definitely/not/here.png")).load().unwrap_err();
        assert!(matches!(err, VisionError::Io(_)));
        assert!(err.to_string().contains("/definitely/not/here.png"));
    }

    #[test]
    fn test_unreachable_url_reports_io_error() {
        let err = ImageSource::Url("http://127.0.0.1:1/cells.png").load().unwrap_err();
        assert!(matches!(err, VisionError::Io(_)));
        assert!(err.to_string().starts_with("IO error: failed to fetch http://127.0.0.1:1/cells.png"));
    }

    #[test]
    fn test_save_jpeg_drops_alpha() {
        let dir = tempfile::tempdir().expect("Should create temp dir");
        let path = dir.path().join("nested/out.jpg");
        let image = DynamicImage::ImageRgba8(RgbaImage::from_pixel(8, 8, Rgba([10, 20, 30, 128])));

        save(&image, &path).expect("Should save jpeg");
        let reloaded = load_path(&path).expect("Should reload");
        assert_eq!(reloaded.color().channel_count(), 3);
    }

}
