use base64::{engine::general_purpose::STANDARD as BASE64, Engine};

use super::{ImageCodec, ImageError, ImageLimits, RasterCodec};

/// Upper bound on encode passes.
pub const MAX_PASSES: u32 = 10;
/// Quality reduction per pass, in percent.
pub const QUALITY_STEP: u8 = 10;
/// Lowest quality tried, in percent.
pub const QUALITY_FLOOR: u8 = 10;

const JPEG_PREFIX: &str = "data:image/jpeg;base64,";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Normalized {
    pub data_uri: String,
    /// Quality of the returned encoding, in percent.
    pub quality: u8,
    pub passes: u32,
    /// Whether the data URI fits the budget. Best effort: the last encoding is
    /// returned either way.
    pub within_budget: bool,
    pub width: u32,
    pub height: u32,
}

pub struct ImageNormalizer<C = RasterCodec> {
    codec: C,
    limits: ImageLimits,
}

impl ImageNormalizer<RasterCodec> {
    pub fn new(limits: ImageLimits) -> Self {
        Self::with_codec(RasterCodec, limits)
    }
}

impl<C: ImageCodec> ImageNormalizer<C> {
    pub fn with_codec(codec: C, limits: ImageLimits) -> Self {
        Self { codec, limits }
    }

    pub fn limits(&self) -> &ImageLimits {
        &self.limits
    }

    /// Downscale and re-encode a `data:` URI image as JPEG.
    pub fn normalize(&self, data_uri: &str) -> Result<Normalized, ImageError> {
        let bytes = decode_data_uri(data_uri)?;
        self.normalize_bytes(&bytes)
    }

    /// Downscale so the longest side is at most `max_dimension`, then lower
    /// the quality until the data URI fits the budget, the quality floor is
    /// reached, or [`MAX_PASSES`] encodes have run.
    pub fn normalize_bytes(&self, bytes: &[u8]) -> Result<Normalized, ImageError> {
        if bytes.is_empty() {
            return Err(ImageError::Decode("image is empty".into()));
        }
        let image = self.codec.decode(bytes)?;

        let (width, height) = self.codec.dimensions(&image);
        let (target_w, target_h) = fit_within(width, height, self.limits.max_dimension);
        let image = if (target_w, target_h) != (width, height) {
            tracing::debug!(width, height, target_w, target_h, "downscaling image");
            self.codec.resize(&image, target_w, target_h)
        } else {
            image
        };

        let limit = self.limits.budget_bytes();
        let mut quality = self.limits.start_quality.clamp(QUALITY_FLOOR, 100);
        let mut passes = 0;
        loop {
            let data_uri = to_data_uri(&self.codec.encode_jpeg(&image, quality)?);
            passes += 1;

            let within_budget = data_uri.len() <= limit;
            if within_budget || quality <= QUALITY_FLOOR || passes >= MAX_PASSES {
                if !within_budget {
                    tracing::warn!(size = data_uri.len(), limit, quality, passes, "image still over budget");
                }
                return Ok(Normalized {
                    data_uri,
                    quality,
                    passes,
                    within_budget,
                    width: target_w,
                    height: target_h,
                });
            }

            quality = quality.saturating_sub(QUALITY_STEP).max(QUALITY_FLOOR);
        }
    }
}

/// Scale `(width, height)` so the longer side equals `max`, keeping the
/// aspect ratio. Images already within `max` are unchanged.
pub fn fit_within(width: u32, height: u32, max: u32) -> (u32, u32) {
    if width <= max && height <= max {
        return (width, height);
    }
    let scale = |side: u32, long: u32| -> u32 {
        ((side as u64 * max as u64 + long as u64 / 2) / long as u64).max(1) as u32
    };
    if width >= height {
        (max, scale(height, width))
    } else {
        (scale(width, height), max)
    }
}

pub fn to_data_uri(jpeg: &[u8]) -> String {
    format!("{}{}", JPEG_PREFIX, BASE64.encode(jpeg))
}

/// Payload bytes of a base64 `data:` URI.
pub fn decode_data_uri(data_uri: &str) -> Result<Vec<u8>, ImageError> {
    let rest = data_uri
        .strip_prefix("data:")
        .ok_or_else(|| ImageError::DataUri("missing data: scheme".into()))?;
    let (_, payload) = rest
        .split_once(";base64,")
        .ok_or_else(|| ImageError::DataUri("expected base64 encoding".into()))?;
    BASE64
        .decode(payload.trim())
        .map_err(|e| ImageError::DataUri(e.to_string()))
}
