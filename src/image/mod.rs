//! Image normalization for on-chain metadata.

pub mod avatar;
pub mod normalizer;

use std::io::Cursor;

use ::image::{codecs::jpeg::JpegEncoder, imageops::FilterType, DynamicImage, ExtendedColorType};

pub use avatar::{fit_or_placeholder, placeholder_avatar};
pub use normalizer::{ImageNormalizer, Normalized};

#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    #[error("failed to decode image: {0}")]
    Decode(String),
    #[error("failed to encode image: {0}")]
    Encode(String),
    #[error("malformed data URI: {0}")]
    DataUri(String),
}

/// Size limits for one kind of image. Byte budgets are compared against
/// the base64 data URI, which runs about 35% larger than the raw bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageLimits {
    /// Longest side after downscaling, in pixels.
    pub max_dimension: u32,
    /// First JPEG quality tried, in percent.
    pub start_quality: u8,
    pub budget_kb: u32,
    /// Above this the caller should fall back to a generated avatar.
    pub fallback_kb: u32,
}

impl ImageLimits {
    /// Chatbot avatars embedded in the prompt template.
    pub const fn avatar() -> Self {
        Self {
            max_dimension: 800,
            start_quality: 90,
            budget_kb: 100,
            fallback_kb: 150,
        }
    }

    /// Larger images shown on the chatbot detail page.
    pub const fn detail() -> Self {
        Self {
            max_dimension: 1024,
            start_quality: 85,
            budget_kb: 200,
            fallback_kb: 300,
        }
    }

    pub fn budget_bytes(&self) -> usize {
        encoded_limit(self.budget_kb)
    }

    pub fn fallback_bytes(&self) -> usize {
        encoded_limit(self.fallback_kb)
    }
}

impl Default for ImageLimits {
    fn default() -> Self {
        Self::avatar()
    }
}

impl From<ImageError> for crate::error::GatewayError {
    fn from(err: ImageError) -> Self {
        crate::error::GatewayError::InvalidInput(err.to_string())
    }
}

/// Largest image file accepted for normalization, before downscaling.
pub const MAX_UPLOAD_BYTES: usize = 12 * 1024 * 1024;

/// Request body limit for routes that carry an upload as a base64 data URI,
/// with room for the surrounding JSON.
pub const fn upload_body_limit() -> usize {
    (MAX_UPLOAD_BYTES + 2) / 3 * 4 + 64 * 1024
}

fn encoded_limit(kb: u32) -> usize {
    kb as usize * 1024 * 135 / 100
}

/// The raster operations the normalizer needs.
pub trait ImageCodec {
    type Image;

    fn decode(&self, bytes: &[u8]) -> Result<Self::Image, ImageError>;
    fn dimensions(&self, image: &Self::Image) -> (u32, u32);
    fn resize(&self, image: &Self::Image, width: u32, height: u32) -> Self::Image;
    /// Encode as JPEG at `quality` percent.
    fn encode_jpeg(&self, image: &Self::Image, quality: u8) -> Result<Vec<u8>, ImageError>;
}

/// [`ImageCodec`] backed by the `image` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct RasterCodec;

impl ImageCodec for RasterCodec {
    type Image = DynamicImage;

    fn decode(&self, bytes: &[u8]) -> Result<DynamicImage, ImageError> {
        ::image::load_from_memory(bytes).map_err(|e| ImageError::Decode(e.to_string()))
    }

    fn dimensions(&self, image: &DynamicImage) -> (u32, u32) {
        (image.width(), image.height())
    }

    fn resize(&self, image: &DynamicImage, width: u32, height: u32) -> DynamicImage {
        image.resize_exact(width, height, FilterType::Triangle)
    }

    fn encode_jpeg(&self, image: &DynamicImage, quality: u8) -> Result<Vec<u8>, ImageError> {
        // JPEG has no alpha channel.
        let rgb = image.to_rgb8();
        let mut buf = Cursor::new(Vec::new());
        JpegEncoder::new_with_quality(&mut buf, quality)
            .encode(rgb.as_raw(), rgb.width(), rgb.height(), ExtendedColorType::Rgb8)
            .map_err(|e| ImageError::Encode(e.to_string()))?;
        Ok(buf.into_inner())
    }
}
