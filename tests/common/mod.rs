//! In-memory chain and wallet used by the integration tests.

#![allow(dead_code)]

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use chatbot_abi::{format_address, parse_hex, selector, to_hex, Address};
use chatbot_market::{Provider, ProviderError, WalletEvent};
use serde_json::{json, Value};
use tokio::sync::broadcast;

pub type CallHandler = Box<dyn Fn(&[u8]) -> Result<Vec<u8>, ProviderError> + Send + Sync>;
pub type SendHandler = Box<dyn Fn(&[u8]) -> Result<FakeReceipt, ProviderError> + Send + Sync>;

pub const ALICE: Address = [0xa1; 20];
pub const BOB: Address = [0xb0; 20];

pub struct FakeReceipt {
    pub status: bool,
    pub logs: Vec<Value>,
}

impl FakeReceipt {
    pub fn ok() -> Self {
        Self {
            status: true,
            logs: Vec::new(),
        }
    }

    pub fn with_logs(logs: Vec<Value>) -> Self {
        Self { status: true, logs }
    }
}

#[derive(Debug, Clone)]
pub struct SentTx {
    pub from: String,
    pub to: String,
    pub selector: [u8; 4],
    pub gas: Option<String>,
}

pub struct ChainState {
    /// Returned by `eth_accounts`.
    pub authorized: Vec<String>,
    /// Granted by `eth_requestAccounts`.
    pub grantable: Vec<String>,
    pub reject_requests: bool,
    pub chain_id: String,
    pub known_chains: Vec<String>,
    pub added_chains: Vec<Value>,
    pub balance: u128,
    /// Receipt polls answered with `null` before each receipt appears.
    pub pending_polls: u32,
    pub sent: Vec<SentTx>,
    pub methods: Vec<String>,
    receipts: HashMap<String, (u32, Value)>,
    calls: HashMap<[u8; 4], CallHandler>,
    sends: HashMap<[u8; 4], SendHandler>,
}

pub struct FakeChain {
    state: Mutex<ChainState>,
    events: broadcast::Sender<WalletEvent>,
}

impl FakeChain {
    pub fn new(chain_id: &str) -> Arc<Self> {
        let (events, _) = broadcast::channel(16);
        Arc::new(Self {
            state: Mutex::new(ChainState {
                authorized: Vec::new(),
                grantable: vec![format_address(&ALICE)],
                reject_requests: false,
                chain_id: chain_id.to_string(),
                known_chains: vec![chain_id.to_string()],
                added_chains: Vec::new(),
                balance: 0,
                pending_polls: 1,
                sent: Vec::new(),
                methods: Vec::new(),
                receipts: HashMap::new(),
                calls: HashMap::new(),
                sends: HashMap::new(),
            }),
            events,
        })
    }

    /// A chain where ALICE is already connected.
    pub fn connected(chain_id: &str) -> Arc<Self> {
        let chain = Self::new(chain_id);
        chain.with_state(|s| s.authorized = vec![format_address(&ALICE)]);
        chain
    }

    pub fn with_state<R>(&self, f: impl FnOnce(&mut ChainState) -> R) -> R {
        f(&mut self.state.lock().unwrap())
    }

    pub fn on_call<F>(&self, signature: &str, handler: F)
    where
        F: Fn(&[u8]) -> Result<Vec<u8>, ProviderError> + Send + Sync + 'static,
    {
        self.with_state(|s| s.calls.insert(selector(signature), Box::new(handler)));
    }

    pub fn on_send<F>(&self, signature: &str, handler: F)
    where
        F: Fn(&[u8]) -> Result<FakeReceipt, ProviderError> + Send + Sync + 'static,
    {
        self.with_state(|s| s.sends.insert(selector(signature), Box::new(handler)));
    }

    pub fn sent(&self) -> Vec<SentTx> {
        self.with_state(|s| s.sent.clone())
    }

    pub fn sent_with(&self, signature: &str) -> usize {
        let sel = selector(signature);
        self.with_state(|s| s.sent.iter().filter(|t| t.selector == sel).count())
    }

    pub fn emit(&self, event: WalletEvent) {
        let _ = self.events.send(event);
    }

    fn handle(&self, method: &str, params: &Value) -> Result<Value, ProviderError> {
        let mut s = self.state.lock().unwrap();
        s.methods.push(method.to_string());
        match method {
            "eth_accounts" => Ok(json!(s.authorized)),
            "eth_requestAccounts" => {
                if s.reject_requests {
                    return Err(ProviderError::rpc(4001, "User rejected the request."));
                }
                s.authorized = s.grantable.clone();
                Ok(json!(s.authorized))
            }
            "eth_chainId" => Ok(json!(s.chain_id)),
            "eth_getBalance" => Ok(json!(format!("0x{:x}", s.balance))),
            "wallet_switchEthereumChain" => {
                let wanted = params[0]["chainId"].as_str().unwrap_or_default().to_string();
                if s.reject_requests {
                    return Err(ProviderError::rpc(4001, "User rejected the request."));
                }
                if s.known_chains.iter().any(|c| c.eq_ignore_ascii_case(&wanted)) {
                    s.chain_id = wanted;
                    Ok(Value::Null)
                } else {
                    Err(ProviderError::rpc(4902, "Unrecognized chain ID"))
                }
            }
            "wallet_addEthereumChain" => {
                let added = params[0].clone();
                let id = added["chainId"].as_str().unwrap_or_default().to_string();
                s.known_chains.push(id.clone());
                s.chain_id = id;
                s.added_chains.push(added);
                Ok(Value::Null)
            }
            "eth_call" => {
                let data = tx_data(params)?;
                let (sel, args) = split_selector(&data)?;
                match s.calls.get(&sel) {
                    Some(handler) => handler(args).map(|out| json!(to_hex(&out))),
                    // No code at the address.
                    None => Ok(json!("0x")),
                }
            }
            "eth_sendTransaction" => {
                let data = tx_data(params)?;
                let (sel, args) = split_selector(&data)?;
                let handler = s
                    .sends
                    .get(&sel)
                    .ok_or_else(|| ProviderError::rpc(3, "execution reverted"))?;
                let receipt = handler(args)?;

                let hash = format!("0x{:064x}", s.sent.len() + 1);
                let tx = &params[0];
                s.sent.push(SentTx {
                    from: tx["from"].as_str().unwrap_or_default().to_string(),
                    to: tx["to"].as_str().unwrap_or_default().to_string(),
                    selector: sel,
                    gas: tx["gas"].as_str().map(str::to_string),
                });
                let body = json!({
                    "transactionHash": hash,
                    "blockNumber": "0x1",
                    "status": if receipt.status { "0x1" } else { "0x0" },
                    "logs": receipt.logs,
                });
                let pending = s.pending_polls;
                s.receipts.insert(hash.clone(), (pending, body));
                Ok(json!(hash))
            }
            "eth_getTransactionReceipt" => {
                let hash = params[0].as_str().unwrap_or_default();
                match s.receipts.get_mut(hash) {
                    Some((pending, _)) if *pending > 0 => {
                        *pending -= 1;
                        Ok(Value::Null)
                    }
                    Some((_, body)) => Ok(body.clone()),
                    None => Ok(Value::Null),
                }
            }
            other => Err(ProviderError::rpc(-32601, format!("method {} not found", other))),
        }
    }
}

fn tx_data(params: &Value) -> Result<Vec<u8>, ProviderError> {
    let data = params[0]["data"]
        .as_str()
        .ok_or_else(|| ProviderError::rpc(-32602, "missing data"))?;
    parse_hex(data).map_err(|e| ProviderError::rpc(-32602, e.to_string()))
}

fn split_selector(data: &[u8]) -> Result<([u8; 4], &[u8]), ProviderError> {
    if data.len() < 4 {
        return Err(ProviderError::rpc(-32602, "calldata shorter than a selector"));
    }
    Ok(([data[0], data[1], data[2], data[3]], &data[4..]))
}

#[async_trait]
impl Provider for FakeChain {
    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError> {
        self.handle(method, &params)
    }

    fn subscribe(&self) -> Option<broadcast::Receiver<WalletEvent>> {
        Some(self.events.subscribe())
    }
}

/// A 32-byte topic holding `address`.
pub fn address_topic(address: Address) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[12..].copy_from_slice(&address);
    word
}

/// A receipt log as the node returns it.
pub fn log_json(address: Address, topics: &[[u8; 32]], data: &[u8]) -> Value {
    json!({
        "address": format_address(&address),
        "topics": topics.iter().map(|t| to_hex(t)).collect::<Vec<_>>(),
        "data": to_hex(data),
    })
}
