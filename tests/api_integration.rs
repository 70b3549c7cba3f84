//! Integration tests for the HTTP API.
//!
//! These tests start a real Axum server on a random port, backed by the
//! in-memory chain, and hit the endpoints with an HTTP client.

mod common;

use std::{
    io::{Cursor, Write},
    net::SocketAddr,
    path::PathBuf,
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chatbot_abi::{decode, encode, format_address, Address, ParamType, Token};
use chatbot_market::{
    chat::{ChatError, ChatMessage, ChatUsage, CompletionClient},
    config::{ContractAddresses, NetworkConfig},
    events::EventBus,
    gateway::{contracts, factory::MAX_PROMPT_TEMPLATE_CHARS},
    image::ImageLimits,
    metadata::ChatbotMetadata,
    routes,
    state::AppState,
    Gateway, Provider, WalletConnector,
};
use common::{address_topic, log_json, FakeChain, FakeReceipt, ALICE, BOB};
use serde_json::{json, Value};

const FACTORY: Address = [0xfa; 20];
const CHATBOT: Address = [0xc4; 20];
const XRPL: &str = "0x15f3a2";

/// Replies with the system prompt and the number of messages it saw.
struct EchoCompletion;

#[async_trait]
impl CompletionClient for EchoCompletion {
    async fn complete(&self, system_prompt: &str, history: &[ChatMessage]) -> Result<String, ChatError> {
        Ok(format!("{} ({} messages)", system_prompt, history.len()))
    }
}

struct TestServer {
    base: String,
    chain: Arc<FakeChain>,
    client: reqwest::Client,
}

impl TestServer {
    async fn start(chain: Arc<FakeChain>, ui_dir: PathBuf) -> Self {
        let provider: Arc<dyn Provider> = chain.clone();
        let events = EventBus::new(16);
        let network = NetworkConfig::xrpl_evm();
        let wallet = WalletConnector::new(Some(provider.clone()), network.clone(), Some(events.clone()));
        let gateway = Gateway::new(
            provider.clone(),
            Some(provider),
            ContractAddresses {
                nft: [0x0f; 20],
                token: [0x70; 20],
                factory: FACTORY,
            },
        )
        .with_poll_interval(Duration::from_millis(1))
        .with_events(events.clone());

        let completion: Arc<dyn CompletionClient> = Arc::new(EchoCompletion);
        let state = Arc::new(AppState {
            ui_dir,
            network,
            events,
            wallet,
            gateway: Arc::new(gateway),
            completion: Some(completion),
            chat_usage: ChatUsage::new(),
            image_limits: ImageLimits::avatar(),
        });

        let listener = tokio::net::TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0)))
            .await
            .unwrap();
        let addr = listener.local_addr().unwrap();
        let app = routes::build_router(state);
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base: format!("http://{}", addr),
            chain,
            client: reqwest::Client::new(),
        }
    }

    async fn get(&self, path: &str) -> Value {
        self.client
            .get(format!("{}{}", self.base, path))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap()
    }

    async fn post(&self, path: &str, body: Value) -> Value {
        self.client
            .post(format!("{}{}", self.base, path))
            .json(&body)
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap()
    }

    async fn put(&self, path: &str, body: Value) -> Value {
        self.client
            .put(format!("{}{}", self.base, path))
            .json(&body)
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap()
    }
}

fn no_ui() -> PathBuf {
    PathBuf::from("/nonexistent/chatbot-market-ui")
}

/// PNG of deterministic noise, which compresses badly in any format.
fn noise_png(width: u32, height: u32) -> Vec<u8> {
    let mut seed: u32 = 0x2545_f491;
    let img = image::RgbImage::from_fn(width, height, |_, _| {
        seed = seed.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
        let [r, g, b, _] = seed.to_le_bytes();
        image::Rgb([r, g, b])
    });
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, image::ImageFormat::Png).unwrap();
    buf.into_inner()
}

fn png_data_uri(png: &[u8]) -> String {
    format!("data:image/png;base64,{}", BASE64.encode(png))
}

fn stored_metadata(free_messages: u32) -> String {
    json!({
        "name": "Helper",
        "description": "Answers questions",
        "category": "General",
        "systemPrompt": "You are helpful",
        "image": "",
        "freeMessages": free_messages,
    })
    .to_string()
}

#[tokio::test]
async fn health_and_config() {
    let server = TestServer::start(FakeChain::new(XRPL), no_ui()).await;

    let health = server.get("/api/health").await;
    assert_eq!(health["status"], "ok");
    assert_eq!(health["chainId"], 1_440_002);

    let config = server.get("/api/config").await;
    assert_eq!(config["network"]["name"], "XRPL EVM Sidechain Devnet");
    assert_eq!(config["contracts"]["factory"], format_address(&FACTORY));
    assert_eq!(config["walletInstalled"], true);
    assert_eq!(config["chatEnabled"], true);
    assert_eq!(config["imageBudgetKb"], 100);
}

#[tokio::test]
async fn wallet_connect_and_disconnect() {
    let server = TestServer::start(FakeChain::new(XRPL), no_ui()).await;

    let status = server.get("/api/wallet").await;
    assert_eq!(status["connected"], false);

    let connected = server.post("/api/wallet/connect", json!({})).await;
    assert_eq!(connected["success"], true);
    assert_eq!(connected["connected"], true);
    assert_eq!(connected["address"], format_address(&ALICE));
    assert_eq!(connected["balanceDisplay"], "0.0");

    let status = server.post("/api/wallet/disconnect", json!({})).await;
    assert_eq!(status["connected"], false);

    let status = server.get("/api/wallet").await;
    assert_eq!(status["connected"], false, "{}", status);

    let reconnected = server.post("/api/wallet/connect", json!({})).await;
    assert_eq!(reconnected["connected"], true);
    assert_eq!(server.get("/api/wallet").await["connected"], true);
}

#[tokio::test]
async fn rejected_connect_is_an_error_envelope() {
    let chain = FakeChain::new(XRPL);
    chain.with_state(|s| s.reject_requests = true);
    let server = TestServer::start(chain, no_ui()).await;

    let body = server.post("/api/wallet/connect", json!({})).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["kind"], "userRejected");
    assert_eq!(body["error"], "The request was cancelled in your wallet.");
}

#[tokio::test]
async fn create_chatbot_from_metadata() {
    let chain = FakeChain::connected(XRPL);
    chain.on_send(contracts::CREATE_CHATBOT, |_| {
        Ok(FakeReceipt::with_logs(vec![log_json(
            FACTORY,
            &[contracts::CHATBOT_CREATED.topic0(), address_topic(ALICE)],
            &encode(&[Token::Address(CHATBOT), Token::String("Helper".into())]),
        )]))
    });
    chain.on_call(contracts::IS_NFT_MINTED, |_| Ok(encode(&[Token::Bool(false)])));
    chain.on_send(contracts::MINT_INITIAL_NFT, |_| Ok(FakeReceipt::ok()));
    let server = TestServer::start(chain, no_ui()).await;

    let body = server
        .post(
            "/api/chatbots",
            json!({
                "name": "Helper",
                "initialPrice": "0.01",
                "autoMint": true,
                "metadata": {
                    "description": "Answers questions",
                    "category": "General",
                    "systemPrompt": "You are helpful",
                },
            }),
        )
        .await;

    assert_eq!(body["success"], true, "{}", body);
    assert_eq!(body["chatbotAddress"], format_address(&CHATBOT));
    assert_eq!(body["autoMint"]["status"], "minted");
    assert_eq!(server.chain.sent_with(contracts::CREATE_CHATBOT), 1);
    assert_eq!(server.chain.sent_with(contracts::MINT_INITIAL_NFT), 1);
}

#[tokio::test]
async fn large_avatar_is_swapped_for_a_generated_one() {
    let chain = FakeChain::connected(XRPL);
    let template = Arc::new(Mutex::new(None));
    let sink = template.clone();
    chain.on_send(contracts::CREATE_CHATBOT, move |args| {
        let tokens = decode(
            &[ParamType::String, ParamType::String, ParamType::String, ParamType::Uint256],
            args,
        )
        .unwrap();
        *sink.lock().unwrap() = tokens[2].as_str().map(str::to_string);
        Ok(FakeReceipt::ok())
    });
    let server = TestServer::start(chain, no_ui()).await;

    let body = server
        .post(
            "/api/chatbots",
            json!({
                "name": "Helper",
                "initialPrice": "0.01",
                "metadata": {
                    "systemPrompt": "You are helpful",
                    "image": png_data_uri(&noise_png(300, 300)),
                },
            }),
        )
        .await;
    assert_eq!(body["success"], true, "{}", body);

    let template = template.lock().unwrap().clone().expect("createChatbot was sent");
    assert!(template.chars().count() <= MAX_PROMPT_TEMPLATE_CHARS);
    let stored: Value = serde_json::from_str(&template).unwrap();
    assert_eq!(stored["name"], "Helper");
    assert_eq!(stored["systemPrompt"], "You are helpful");
    let metadata = ChatbotMetadata::from_prompt_template(&template);
    assert!(metadata.image.starts_with("data:image/svg+xml"), "{}", metadata.image);
}

#[tokio::test]
async fn oversized_metadata_is_rejected_before_sending() {
    let server = TestServer::start(FakeChain::connected(XRPL), no_ui()).await;

    let body = server
        .post(
            "/api/chatbots",
            json!({
                "name": "Helper",
                "initialPrice": "0.01",
                "metadata": {"systemPrompt": "be brief. ".repeat(1_200)},
            }),
        )
        .await;
    assert_eq!(body["success"], false);
    assert_eq!(body["kind"], "invalidInput");
    assert!(server.chain.sent().is_empty());
}

#[tokio::test]
async fn create_chatbot_needs_a_prompt() {
    let server = TestServer::start(FakeChain::connected(XRPL), no_ui()).await;

    let body = server
        .post("/api/chatbots", json!({"name": "Helper", "initialPrice": "0.01"}))
        .await;
    assert_eq!(body["success"], false);
    assert_eq!(body["kind"], "invalidInput");
    assert!(server.chain.sent().is_empty());
}

#[tokio::test]
async fn chatbot_detail_parses_metadata() {
    let chain = FakeChain::connected(XRPL);
    let stored = stored_metadata(3);
    chain.on_call(contracts::GET_PROMPT_TEMPLATE, move |_| {
        Ok(encode(&[Token::String(stored.clone())]))
    });
    chain.on_call(contracts::IS_NFT_MINTED, |_| Ok(encode(&[Token::Bool(true)])));
    chain.on_call(contracts::GET_NFT_OWNER, |_| Ok(encode(&[Token::Address(ALICE)])));
    let server = TestServer::start(chain, no_ui()).await;

    let body = server.get(&format!("/api/chatbots/{}", format_address(&CHATBOT))).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["isNFTMinted"], true);
    assert_eq!(body["ownerAddress"], format_address(&ALICE));
    assert_eq!(body["metadata"]["name"], "Helper");
    assert_eq!(body["metadata"]["freeMessages"], 3);

    let bad = server.get("/api/chatbots/not-an-address").await;
    assert_eq!(bad["success"], false);
    assert_eq!(bad["kind"], "invalidInput");
}

#[tokio::test]
async fn chat_turn_within_free_messages() {
    let chain = FakeChain::connected(XRPL);
    let stored = stored_metadata(2);
    chain.on_call(contracts::GET_PROMPT_TEMPLATE, move |_| {
        Ok(encode(&[Token::String(stored.clone())]))
    });
    let server = TestServer::start(chain, no_ui()).await;
    let path = format!("/api/chatbots/{}/chat", format_address(&CHATBOT));

    let first = server.post(&path, json!({"message": "hi"})).await;
    assert_eq!(first["success"], true, "{}", first);
    assert_eq!(first["reply"]["content"], "You are helpful (1 messages)");
    assert_eq!(first["reply"]["sender"], "bot");
    assert_eq!(first["reply"]["botName"], "Helper");
    assert_eq!(first["freeMessagesRemaining"], 1);

    let history = json!([
        {"id": 1, "content": "hi", "sender": "user", "timestamp": "2026-01-01T00:00:00Z"},
        first["reply"].clone(),
    ]);
    let second = server.post(&path, json!({"message": "again", "history": history})).await;
    assert_eq!(second["reply"]["content"], "You are helpful (3 messages)");
    assert_eq!(second["freeMessagesRemaining"], 0);
}

#[tokio::test]
async fn chat_past_the_allowance_checks_super_chat() {
    let chain = FakeChain::connected(XRPL);
    let stored = stored_metadata(0);
    chain.on_call(contracts::GET_PROMPT_TEMPLATE, move |_| {
        Ok(encode(&[Token::String(stored.clone())]))
    });
    chain.on_call(contracts::CAN_USE_SUPER_CHAT, |_| Ok(encode(&[Token::Bool(false)])));
    let server = TestServer::start(chain, no_ui()).await;
    let path = format!("/api/chatbots/{}/chat", format_address(&CHATBOT));

    let anonymous = server.post(&path, json!({"message": "hi"})).await;
    assert_eq!(anonymous["success"], false);
    assert_eq!(anonymous["kind"], "unauthorized");

    let denied = server
        .post(&path, json!({"message": "hi", "user": format_address(&ALICE)}))
        .await;
    assert_eq!(denied["kind"], "unauthorized");

    server
        .chain
        .on_call(contracts::CAN_USE_SUPER_CHAT, |_| Ok(encode(&[Token::Bool(true)])));
    let allowed = server
        .post(&path, json!({"message": "hi", "user": format_address(&ALICE)}))
        .await;
    assert_eq!(allowed["success"], true, "{}", allowed);
    assert_eq!(allowed["freeMessagesRemaining"], 0);
}

#[tokio::test]
async fn allowance_is_counted_without_history() {
    let chain = FakeChain::connected(XRPL);
    let stored = stored_metadata(1);
    chain.on_call(contracts::GET_PROMPT_TEMPLATE, move |_| {
        Ok(encode(&[Token::String(stored.clone())]))
    });
    chain.on_call(contracts::CAN_USE_SUPER_CHAT, |_| Ok(encode(&[Token::Bool(false)])));
    let server = TestServer::start(chain, no_ui()).await;
    let path = format!("/api/chatbots/{}/chat", format_address(&CHATBOT));

    let blank = server.post(&path, json!({"message": "   "})).await;
    assert_eq!(blank["success"], true);
    assert!(blank["reply"].is_null());
    assert_eq!(blank["freeMessagesRemaining"], 1);

    let first = server.post(&path, json!({"message": "hi"})).await;
    assert_eq!(first["success"], true, "{}", first);
    assert_eq!(first["freeMessagesRemaining"], 0);

    for _ in 0..4 {
        let again = server.post(&path, json!({"message": "hi", "history": []})).await;
        assert_eq!(again["success"], false, "{}", again);
        assert_eq!(again["kind"], "unauthorized");
    }
}

#[tokio::test]
async fn chat_user_must_be_the_connected_account() {
    let chain = FakeChain::connected(XRPL);
    let stored = stored_metadata(5);
    chain.on_call(contracts::GET_PROMPT_TEMPLATE, move |_| {
        Ok(encode(&[Token::String(stored.clone())]))
    });
    let server = TestServer::start(chain, no_ui()).await;
    let path = format!("/api/chatbots/{}/chat", format_address(&CHATBOT));

    let spoofed = server
        .post(&path, json!({"message": "hi", "user": format_address(&BOB)}))
        .await;
    assert_eq!(spoofed["success"], false);
    assert_eq!(spoofed["kind"], "unauthorized");

    let own = server
        .post(&path, json!({"message": "hi", "user": format_address(&ALICE)}))
        .await;
    assert_eq!(own["success"], true, "{}", own);
    assert_eq!(own["freeMessagesRemaining"], 4);
}

#[tokio::test]
async fn turns_without_a_wallet_share_one_allowance() {
    let chain = FakeChain::new(XRPL);
    let stored = stored_metadata(1);
    chain.on_call(contracts::GET_PROMPT_TEMPLATE, move |_| {
        Ok(encode(&[Token::String(stored.clone())]))
    });
    let server = TestServer::start(chain, no_ui()).await;
    let path = format!("/api/chatbots/{}/chat", format_address(&CHATBOT));

    let first = server.post(&path, json!({"message": "hi"})).await;
    assert_eq!(first["success"], true, "{}", first);

    let second = server.post(&path, json!({"message": "hi"})).await;
    assert_eq!(second["kind"], "unauthorized");
}

#[tokio::test]
async fn prompt_update_by_non_owner_sends_nothing() {
    let chain = FakeChain::connected(XRPL);
    chain.on_call(contracts::CAN_UPDATE_PROMPT, |_| Ok(encode(&[Token::Bool(false)])));
    chain.on_call(contracts::GET_NFT_OWNER, |_| Ok(encode(&[Token::Address([0xb0; 20])])));
    let server = TestServer::start(chain, no_ui()).await;

    let body = server
        .put(
            &format!("/api/chatbots/{}/prompt", format_address(&CHATBOT)),
            json!({"promptTemplate": "new"}),
        )
        .await;
    assert_eq!(body["success"], false);
    assert_eq!(body["kind"], "unauthorized");
    assert!(server.chain.sent().is_empty());
}

#[tokio::test]
async fn token_routes() {
    let chain = FakeChain::connected(XRPL);
    chain.on_call(contracts::BALANCE_OF, |_| Ok(encode(&[Token::Uint(42_000_000_000_000_000_000)])));
    chain.on_call(contracts::CAN_USE_SUPER_CHAT, |_| Ok(encode(&[Token::Bool(true)])));
    chain.on_call(contracts::GET_SUPER_CHAT_THRESHOLD, |_| {
        Ok(encode(&[Token::Uint(10_000_000_000_000_000_000)]))
    });
    chain.on_send(contracts::USE_SUPER_CHAT, |_| Ok(FakeReceipt::ok()));
    let server = TestServer::start(chain, no_ui()).await;
    let alice = format_address(&ALICE);

    let balance = server.get(&format!("/api/tokens/{}/balance", alice)).await;
    assert_eq!(balance["balance"], "42.0");

    let can_use = server.get(&format!("/api/superchat/{}", alice)).await;
    assert_eq!(can_use["canUse"], true);

    let threshold = server.get("/api/superchat/threshold").await;
    assert_eq!(threshold["threshold"], "10.0");

    let used = server.post("/api/superchat/use", json!({})).await;
    assert_eq!(used["success"], true);
    assert!(used["transactionHash"].as_str().unwrap().starts_with("0x"));
}

#[tokio::test]
async fn nft_transfer_validates_token_id() {
    let server = TestServer::start(FakeChain::connected(XRPL), no_ui()).await;

    let body = server
        .post(
            "/api/nft/transfer",
            json!({"to": format_address(&ALICE), "tokenId": "first"}),
        )
        .await;
    assert_eq!(body["success"], false);
    assert_eq!(body["kind"], "invalidInput");
}

#[tokio::test]
async fn normalize_rejects_garbage() {
    let server = TestServer::start(FakeChain::new(XRPL), no_ui()).await;

    let body = server
        .post("/api/images/normalize", json!({"dataUri": "data:image/png;base64,AAAA"}))
        .await;
    assert_eq!(body["success"], false);
    assert_eq!(body["kind"], "invalidInput");
}

#[tokio::test]
async fn multi_megabyte_upload_is_accepted() {
    let server = TestServer::start(FakeChain::new(XRPL), no_ui()).await;
    let png = noise_png(1000, 1000);
    assert!(png.len() > 2 * 1024 * 1024);

    let resp = server
        .client
        .post(format!("{}/api/images/normalize", server.base))
        .json(&json!({"dataUri": png_data_uri(&png)}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], true, "{}", body["error"]);
    assert_eq!(body["width"], 800);
    assert_eq!(body["height"], 800);
}

#[tokio::test]
async fn serves_ui_with_index_fallback() {
    let dir = tempfile::tempdir().unwrap();
    let mut index = std::fs::File::create(dir.path().join("index.html")).unwrap();
    index.write_all(b"<html>marketplace</html>").unwrap();

    let server = TestServer::start(FakeChain::new(XRPL), dir.path().to_path_buf()).await;

    for path in ["/", "/chatbots/0xabc"] {
        let resp = server
            .client
            .get(format!("{}{}", server.base, path))
            .send()
            .await
            .unwrap();
        assert!(resp.status().is_success(), "{} -> {}", path, resp.status());
        assert_eq!(resp.text().await.unwrap(), "<html>marketplace</html>");
    }
}
