use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};
use chatbot_abi::format_address;
use serde::Serialize;

use crate::{config::NetworkConfig, state::AppState};

/// `GET /api/config`: network, contract addresses and enabled features.
async fn get_config(State(state): State<Arc<AppState>>) -> Json<ConfigResponse> {
    let addresses = state.gateway.addresses();
    Json(ConfigResponse {
        version: env!("CARGO_PKG_VERSION"),
        network: state.network.clone(),
        contracts: ContractsResponse {
            nft: format_address(&addresses.nft),
            token: format_address(&addresses.token),
            factory: format_address(&addresses.factory),
        },
        wallet_installed: state.wallet.is_installed(),
        chat_enabled: state.completion.is_some(),
        image_budget_kb: state.image_limits.budget_kb,
    })
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ConfigResponse {
    version: &'static str,
    network: NetworkConfig,
    contracts: ContractsResponse,
    wallet_installed: bool,
    chat_enabled: bool,
    image_budget_kb: u32,
}

#[derive(Serialize)]
struct ContractsResponse {
    nft: String,
    token: String,
    factory: String,
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/config", get(get_config))
}
