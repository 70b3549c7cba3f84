//! Default NFT deployment.

use std::sync::Arc;

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use chatbot_abi::format_address;
use serde::{Deserialize, Serialize};

use crate::{
    error::{Envelope, GatewayError},
    gateway::{parse_address_input, TxOutcome},
    state::AppState,
};

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptTemplate {
    prompt_template: String,
}

async fn get_prompt(State(state): State<Arc<AppState>>) -> Envelope<PromptTemplate> {
    state
        .gateway
        .prompt_template()
        .await
        .map(|prompt_template| PromptTemplate { prompt_template })
        .into()
}

async fn set_prompt(
    State(state): State<Arc<AppState>>,
    Json(body): Json<PromptTemplate>,
) -> Envelope<TxOutcome> {
    state.gateway.set_prompt_template(&body.prompt_template).await.into()
}

#[derive(Serialize)]
struct OwnerResponse {
    owner: String,
}

async fn owner(State(state): State<Arc<AppState>>) -> Envelope<OwnerResponse> {
    state
        .gateway
        .nft_owner()
        .await
        .map(|owner| OwnerResponse {
            owner: format_address(&owner),
        })
        .into()
}

async fn mint(State(state): State<Arc<AppState>>) -> Envelope<TxOutcome> {
    state.gateway.mint_initial_nft().await.into()
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TransferBody {
    to: String,
    token_id: String,
}

/// `POST /api/nft/transfer`: move a token out of the wallet's account.
async fn transfer(
    State(state): State<Arc<AppState>>,
    Json(body): Json<TransferBody>,
) -> Envelope<TxOutcome> {
    async {
        let to = parse_address_input(&body.to)?;
        let token_id = body
            .token_id
            .trim()
            .parse::<u128>()
            .map_err(|_| GatewayError::InvalidInput(format!("invalid token id: {}", body.token_id)))?;
        state.gateway.transfer_nft(to, token_id).await
    }
    .await
    .into()
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateNftBody {
    metadata_uri: String,
}

/// `POST /api/nft/create`: mint, then store the metadata as the prompt.
async fn create(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateNftBody>,
) -> Envelope<TxOutcome> {
    state.gateway.create_chatbot_nft(&body.metadata_uri).await.into()
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/nft/prompt", get(get_prompt).put(set_prompt))
        .route("/nft/owner", get(owner))
        .route("/nft/mint", post(mint))
        .route("/nft/transfer", post(transfer))
        .route("/nft/create", post(create))
}
