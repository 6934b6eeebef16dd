//! # Vision
//!
//! Image operations behind the imaging MCP tools: resizing, thresholding,
//! smoothing and denoising filters, contour analysis and region extraction,
//! plus decoding from paths, URLs and base64 payloads.
//!
//! Every operation works on [`image::DynamicImage`] values normalized to
//! 8-bit Luma, RGB or RGBA by [`io::normalize`], and leaves its input untouched.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::path::Path;
//! use vision::{ContourFilter, ImageSource, detect_blobs, blobs_to_csv};
//!
//! let image = ImageSource::Path(Path::new("cells.png")).load()?;
//! let analysis = detect_blobs(&image, &ContourFilter::default())?;
//! println!("{}", blobs_to_csv(&analysis.blobs));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Filters
//!
//! ```rust,no_run
//! use vision::{ImageFilter, MotionBlur, NonLocalMeans, odd_kernel_size};
//! # let image = image::DynamicImage::new_rgb8(32, 32);
//!
//! let motion = MotionBlur { kernel_size: odd_kernel_size(8)?, angle: 45.0 };
//! let blurred = motion.apply(&image)?;
//! let cleaned = NonLocalMeans::default().apply(&blurred)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod error;
pub mod types;
pub mod traits;
pub mod algorithms;
pub mod io;

pub use error::{VisionError, Result};
pub use types::{BlobDescriptor, BoundingBox, Contour, ImageInfo, blobs_to_csv};
pub use traits::*;
pub use algorithms::*;
pub use io::ImageSource;
