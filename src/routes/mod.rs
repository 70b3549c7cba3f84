mod chatbots;
mod config_routes;
mod health;
mod images;
mod nft;
mod tokens;
mod wallet;
pub mod ws;

use std::sync::Arc;

use axum::Router;
use tower_http::cors::CorsLayer;

use crate::state::AppState;

/// Build the `/api` sub-router with all API routes.
pub fn api_router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(health::router())
        .merge(config_routes::router())
        .merge(wallet::router())
        .merge(chatbots::router())
        .merge(nft::router())
        .merge(tokens::router())
        .merge(images::router())
        .with_state(state)
}

/// `/api`, `/ws` and, when the directory exists, the static UI.
pub fn build_router(state: Arc<AppState>) -> Router {
    let api = api_router(state.clone());

    let mut app = Router::new()
        .nest("/api", api)
        .merge(ws::router().with_state(state.clone()));

    if state.ui_dir.is_dir() {
        let serve_dir = tower_http::services::ServeDir::new(&state.ui_dir).fallback(
            tower_http::services::ServeFile::new(state.ui_dir.join("index.html")),
        );
        app = app.fallback_service(serve_dir);
    }

    app.layer(CorsLayer::very_permissive())
}
