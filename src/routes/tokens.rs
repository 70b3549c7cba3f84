use std::sync::Arc;

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::{
    error::{Envelope, GatewayError},
    gateway::{parse_address_input, TxOutcome},
    state::AppState,
};

#[derive(Serialize)]
struct BalanceResponse {
    balance: String,
}

/// `GET /api/tokens/{address}/balance`: decimal balance at 18 decimals.
async fn balance(
    State(state): State<Arc<AppState>>,
    Path(address): Path<String>,
) -> Envelope<BalanceResponse> {
    async {
        let owner = parse_address_input(&address)?;
        let balance = state.gateway.token_balance(owner).await?;
        Ok::<_, GatewayError>(BalanceResponse { balance })
    }
    .await
    .into()
}

#[derive(Deserialize)]
struct MintBody {
    to: String,
    amount: String,
}

/// `POST /api/tokens/mint`
async fn mint(State(state): State<Arc<AppState>>, Json(body): Json<MintBody>) -> Envelope<TxOutcome> {
    async {
        let to = parse_address_input(&body.to)?;
        state.gateway.mint_tokens(to, &body.amount).await
    }
    .await
    .into()
}

#[derive(Serialize, Deserialize)]
struct Threshold {
    threshold: String,
}

async fn threshold(State(state): State<Arc<AppState>>) -> Envelope<Threshold> {
    state
        .gateway
        .super_chat_threshold()
        .await
        .map(|threshold| Threshold { threshold })
        .into()
}

async fn update_threshold(
    State(state): State<Arc<AppState>>,
    Json(body): Json<Threshold>,
) -> Envelope<TxOutcome> {
    state
        .gateway
        .update_super_chat_threshold(&body.threshold)
        .await
        .into()
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CanUseResponse {
    can_use: bool,
}

/// `GET /api/superchat/{address}`: whether `address` holds enough tokens.
async fn can_use(
    State(state): State<Arc<AppState>>,
    Path(address): Path<String>,
) -> Envelope<CanUseResponse> {
    async {
        let user = parse_address_input(&address)?;
        let can_use = state.gateway.can_use_super_chat(user).await?;
        Ok::<_, GatewayError>(CanUseResponse { can_use })
    }
    .await
    .into()
}

/// `POST /api/superchat/use`
async fn use_super_chat(State(state): State<Arc<AppState>>) -> Envelope<TxOutcome> {
    state.gateway.use_super_chat().await.into()
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/tokens/{address}/balance", get(balance))
        .route("/tokens/mint", post(mint))
        .route("/superchat/threshold", get(threshold).put(update_threshold))
        .route("/superchat/use", post(use_super_chat))
        .route("/superchat/{address}", get(can_use))
}
