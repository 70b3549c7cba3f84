//! Generated fallback avatars.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};

use super::{normalizer::ImageNormalizer, ImageCodec, ImageError};

const PALETTE: [&str; 8] = [
    "#6366f1", "#8b5cf6", "#ec4899", "#f43f5e", "#f97316", "#14b8a6", "#0ea5e9", "#22c55e",
];

/// SVG data URI showing up to two initials of `name` on a colored circle.
/// The color is stable for a given name.
pub fn placeholder_avatar(name: &str) -> String {
    let initials: String = name
        .split_whitespace()
        .filter_map(|w| w.chars().find(|c| c.is_alphanumeric()))
        .flat_map(char::to_uppercase)
        .take(2)
        .collect();
    let initials = if initials.is_empty() { "?".to_string() } else { initials };

    let hash = name
        .bytes()
        .fold(0u32, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u32));
    let color = PALETTE[hash as usize % PALETTE.len()];

    let svg = format!(
        r##"<svg xmlns="http://www.w3.org/2000/svg" width="256" height="256" viewBox="0 0 256 256"><circle cx="128" cy="128" r="128" fill="{color}"/><text x="50%" y="50%" dy=".35em" text-anchor="middle" font-family="sans-serif" font-size="96" fill="#ffffff">{initials}</text></svg>"##
    );
    format!("data:image/svg+xml;base64,{}", BASE64.encode(svg))
}

/// Normalize an uploaded avatar, or replace it with a placeholder when even
/// the normalized image exceeds the fallback size.
pub fn fit_or_placeholder<C: ImageCodec>(
    name: &str,
    data_uri: &str,
    normalizer: &ImageNormalizer<C>,
) -> Result<String, ImageError> {
    let normalized = normalizer.normalize(data_uri)?;
    let fallback = normalizer.limits().fallback_bytes();
    if normalized.data_uri.len() > fallback {
        tracing::warn!(
            size = normalized.data_uri.len(),
            fallback,
            "image too large after compression, using generated avatar"
        );
        return Ok(placeholder_avatar(name));
    }
    Ok(normalized.data_uri)
}
