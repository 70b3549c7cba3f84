use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, Path, Query, State},
    routing::{get, post, put},
    Json, Router,
};
use chatbot_abi::Address;
use serde::{Deserialize, Serialize};

use super::images::avatar_for;
use crate::{
    chat::{ChatMessage, ChatSession},
    error::{CallResult, Envelope, GatewayError},
    gateway::{
        factory::MAX_PROMPT_TEMPLATE_CHARS, parse_address_input, ChatbotCreation, CreateChatbotRequest,
        CreateOptions, TxOutcome,
    },
    image::upload_body_limit,
    metadata::{ChatbotContractRef, ChatbotMetadata},
    state::AppState,
};

#[derive(Deserialize)]
struct ListQuery {
    creator: Option<String>,
}

#[derive(Serialize)]
struct ChatbotList {
    chatbots: Vec<String>,
}

/// `GET /api/chatbots?creator=0x..`: chatbots deployed by `creator`
/// (the wallet's account when omitted).
async fn list(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Envelope<ChatbotList> {
    async {
        let creator = match query.creator {
            Some(ref c) => parse_address_input(c)?,
            None => state.gateway.signer_address().await?,
        };
        let chatbots = state.gateway.user_chatbots(creator).await?;
        Ok::<_, GatewayError>(ChatbotList { chatbots })
    }
    .await
    .into()
}

#[derive(Serialize)]
struct TotalResponse {
    total: u128,
}

/// `GET /api/chatbots/total`
async fn total(State(state): State<Arc<AppState>>) -> Envelope<TotalResponse> {
    state
        .gateway
        .total_chatbots()
        .await
        .map(|total| TotalResponse { total })
        .into()
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateBody {
    name: String,
    #[serde(default)]
    symbol: Option<String>,
    initial_price: String,
    /// Structured metadata; serialized into the prompt template.
    #[serde(default)]
    metadata: Option<ChatbotMetadata>,
    /// Raw prompt template, used when `metadata` is absent.
    #[serde(default)]
    prompt_template: Option<String>,
    #[serde(default)]
    auto_mint: bool,
}

/// `POST /api/chatbots`: deploy a chatbot through the factory.
async fn create(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateBody>,
) -> Envelope<ChatbotCreation> {
    async {
        let prompt_template = match (body.metadata, body.prompt_template) {
            (Some(mut metadata), _) => {
                if metadata.name.is_empty() {
                    metadata.name = body.name.clone();
                }
                if metadata.image.starts_with("data:") {
                    metadata.image =
                        avatar_for(state.image_limits, metadata.name.clone(), metadata.image).await?;
                }
                metadata
                    .to_prompt_template_within(MAX_PROMPT_TEMPLATE_CHARS)
                    .map_err(|e| GatewayError::InvalidInput(e.to_string()))?
                    .ok_or_else(|| {
                        GatewayError::InvalidInput(format!(
                            "chatbot metadata does not fit in {} characters",
                            MAX_PROMPT_TEMPLATE_CHARS
                        ))
                    })?
            }
            (None, Some(raw)) => raw,
            (None, None) => {
                return Err(GatewayError::InvalidInput(
                    "either metadata or promptTemplate is required".into(),
                ))
            }
        };

        let request = CreateChatbotRequest {
            name: body.name,
            symbol: body.symbol,
            prompt_template,
            initial_price: body.initial_price,
        };
        let options = CreateOptions {
            auto_mint: body.auto_mint,
        };
        state.gateway.create_chatbot(&request, options).await
    }
    .await
    .into()
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ChatbotDetail {
    #[serde(flatten)]
    contract: ChatbotContractRef,
    prompt_template: String,
    metadata: ChatbotMetadata,
}

/// `GET /api/chatbots/{address}`: metadata, owner and mint status.
async fn detail(
    State(state): State<Arc<AppState>>,
    Path(address): Path<String>,
) -> Envelope<ChatbotDetail> {
    async {
        let chatbot = parse_address_input(&address)?;
        let prompt_template = state.gateway.chatbot_prompt_template(chatbot).await?;
        let contract = state.gateway.chatbot_ref(chatbot).await?;
        Ok::<_, GatewayError>(ChatbotDetail {
            contract,
            metadata: ChatbotMetadata::from_prompt_template(&prompt_template),
            prompt_template,
        })
    }
    .await
    .into()
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptBody {
    prompt_template: String,
}

/// `PUT /api/chatbots/{address}/prompt`: NFT owner only.
async fn update_prompt(
    State(state): State<Arc<AppState>>,
    Path(address): Path<String>,
    Json(body): Json<PromptBody>,
) -> Envelope<TxOutcome> {
    async {
        let chatbot = parse_address_input(&address)?;
        state
            .gateway
            .update_chatbot_prompt(chatbot, &body.prompt_template)
            .await
    }
    .await
    .into()
}

/// `POST /api/chatbots/{address}/mint`
async fn mint(
    State(state): State<Arc<AppState>>,
    Path(address): Path<String>,
) -> Envelope<TxOutcome> {
    async {
        let chatbot = parse_address_input(&address)?;
        state.gateway.mint_chatbot_nft(chatbot).await
    }
    .await
    .into()
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChatBody {
    message: String,
    #[serde(default)]
    history: Vec<ChatMessage>,
    /// Must match the connected wallet account when given.
    #[serde(default)]
    user: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ChatResponse {
    reply: Option<ChatMessage>,
    free_messages_remaining: u32,
}

/// `POST /api/chatbots/{address}/chat`: one turn of a conversation. The
/// client keeps the history and sends it back with each message; the free
/// allowance is charged on the server per chatbot and wallet account.
async fn chat(
    State(state): State<Arc<AppState>>,
    Path(address): Path<String>,
    Json(body): Json<ChatBody>,
) -> Envelope<ChatResponse> {
    chat_turn(&state, &address, body).await.into()
}

async fn chat_turn(state: &AppState, address: &str, body: ChatBody) -> CallResult<ChatResponse> {
    let chatbot = parse_address_input(address)?;
    let client = state
        .completion
        .clone()
        .ok_or_else(|| GatewayError::Network("chat completion API is not configured".into()))?;
    let user = chat_account(state, body.user.as_deref()).await?;

    let raw = state.gateway.chatbot_prompt_template(chatbot).await?;
    let used = state.chat_usage.reserve(chatbot, user);
    let mut session = ChatSession::new(ChatbotMetadata::from_prompt_template(&raw), client)
        .with_history(body.history)
        .with_usage(used);
    if let Some(user) = user {
        session = session.with_access(user, state.gateway.clone());
    }

    let reply = match session.send(&body.message).await {
        Ok(Some(reply)) => Some(reply),
        Ok(None) => {
            state.chat_usage.refund(chatbot, user);
            None
        }
        Err(e) => {
            state.chat_usage.refund(chatbot, user);
            return Err(e.into());
        }
    };
    Ok(ChatResponse {
        reply,
        free_messages_remaining: session.free_messages_remaining(),
    })
}

/// Account chat turns are charged to: the wallet's connected account, or
/// `None` when no wallet is connected.
async fn chat_account(state: &AppState, claimed: Option<&str>) -> CallResult<Option<Address>> {
    let signer = match state.gateway.signer_address().await {
        Ok(account) => Some(account),
        Err(GatewayError::NotConnected | GatewayError::ProviderMissing) => None,
        Err(e) => return Err(e),
    };
    if let Some(claimed) = claimed {
        if signer != Some(parse_address_input(claimed)?) {
            return Err(GatewayError::Unauthorized(
                "Chat access is checked against the connected wallet account.".into(),
            ));
        }
    }
    Ok(signer)
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/chatbots",
            get(list).post(create).layer(DefaultBodyLimit::max(upload_body_limit())),
        )
        .route("/chatbots/total", get(total))
        .route("/chatbots/{address}", get(detail))
        .route("/chatbots/{address}/prompt", put(update_prompt))
        .route("/chatbots/{address}/mint", post(mint))
        .route("/chatbots/{address}/chat", post(chat))
}
