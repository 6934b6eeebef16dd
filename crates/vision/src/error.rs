use thiserror::Error;

#[derive(Error, Debug)]
pub enum VisionError {
    #[error("Failed to decode image: {0}")]
    Image(#[from] image::ImageError),

    #[error("Invalid base64 image data: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Unknown {kind}: {name}")]
    UnknownVariant { kind: &'static str, name: String },

    #[error("Image processing error: {0}")]
    ImageProcessing(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, VisionError>;
