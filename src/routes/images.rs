use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, State},
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::{
    error::{CallResult, Envelope, GatewayError},
    image::{fit_or_placeholder, upload_body_limit, ImageLimits, ImageNormalizer},
    state::AppState,
};

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
enum Preset {
    #[default]
    Avatar,
    Detail,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct NormalizeBody {
    data_uri: String,
    #[serde(default)]
    preset: Option<Preset>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct NormalizeResponse {
    data_uri: String,
    quality: u8,
    passes: u32,
    within_budget: bool,
    width: u32,
    height: u32,
}

/// `POST /api/images/normalize`: downscale and recompress a data URI image.
async fn normalize(
    State(state): State<Arc<AppState>>,
    Json(body): Json<NormalizeBody>,
) -> Envelope<NormalizeResponse> {
    let limits = match body.preset {
        Some(Preset::Avatar) => ImageLimits::avatar(),
        Some(Preset::Detail) => ImageLimits::detail(),
        None => state.image_limits,
    };
    run_blocking(move || {
        let out = ImageNormalizer::new(limits).normalize(&body.data_uri)?;
        Ok(NormalizeResponse {
            data_uri: out.data_uri,
            quality: out.quality,
            passes: out.passes,
            within_budget: out.within_budget,
            width: out.width,
            height: out.height,
        })
    })
    .await
    .into()
}

/// Normalized avatar for `name`, or a generated one when the upload is too large.
pub(super) async fn avatar_for(limits: ImageLimits, name: String, data_uri: String) -> CallResult<String> {
    run_blocking(move || {
        let normalizer = ImageNormalizer::new(limits);
        Ok(fit_or_placeholder(&name, &data_uri, &normalizer)?)
    })
    .await
}

async fn run_blocking<T, F>(f: F) -> CallResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> CallResult<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f).await.unwrap_or_else(|e| {
        tracing::error!(error = %e, "image task failed");
        Err(GatewayError::InvalidInput("image processing failed".into()))
    })
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route(
        "/images/normalize",
        post(normalize).layer(DefaultBodyLimit::max(upload_body_limit())),
    )
}
