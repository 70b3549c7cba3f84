use std::sync::Arc;

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};

use crate::{error::Envelope, state::AppState, wallet::WalletStatus};

/// `GET /api/wallet`: current status, re-derived from the wallet unless it
/// was disconnected here.
async fn status(State(state): State<Arc<AppState>>) -> Json<WalletStatus> {
    Json(state.wallet.refresh().await)
}

/// `POST /api/wallet/connect`: request accounts and switch to the configured chain.
async fn connect(State(state): State<Arc<AppState>>) -> Envelope<WalletStatus> {
    state.wallet.connect().await.into()
}

/// `POST /api/wallet/disconnect`
async fn disconnect(State(state): State<Arc<AppState>>) -> Json<WalletStatus> {
    state.wallet.disconnect();
    Json(state.wallet.status())
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/wallet", get(status))
        .route("/wallet/connect", post(connect))
        .route("/wallet/disconnect", post(disconnect))
}
