//! JSON-RPC provider over HTTP.
//!
//! Used both as the read-only network connection and as the signing wallet
//! (a node or wallet daemon that holds unlocked accounts and answers
//! `eth_sendTransaction`).

use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Weak,
    },
    time::Duration,
};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::{sync::broadcast, task::JoinHandle};

use super::{eth_accounts, eth_chain_id, Provider, ProviderError, WalletEvent};

/// JSON-RPC request wrapper.
#[derive(Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

/// JSON-RPC response wrapper. A missing or `null` result is valid
/// (e.g. a receipt that is not mined yet).
#[derive(Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Value,
    error: Option<RpcError>,
}

#[derive(Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

pub struct HttpProvider {
    http: reqwest::Client,
    url: String,
    next_id: AtomicU64,
    event_tx: broadcast::Sender<WalletEvent>,
}

impl HttpProvider {
    pub fn new(url: impl Into<String>) -> Self {
        let (event_tx, _) = broadcast::channel(16);
        Self {
            http: reqwest::Client::new(),
            url: url.into(),
            next_id: AtomicU64::new(1),
            event_tx,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Poll `eth_accounts` / `eth_chainId` and emit [`WalletEvent`]s on change.
    ///
    /// The first poll only records a baseline. The task ends once the last
    /// strong reference to the provider is dropped.
    pub fn watch(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let weak: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut last: Option<(Vec<String>, String)> = None;
            loop {
                let Some(provider) = weak.upgrade() else {
                    break;
                };

                match provider.snapshot().await {
                    Ok((accounts, chain_id)) => {
                        if let Some((ref prev_accounts, ref prev_chain)) = last {
                            if *prev_chain != chain_id {
                                let _ = provider
                                    .event_tx
                                    .send(WalletEvent::ChainChanged(chain_id.clone()));
                            }
                            if *prev_accounts != accounts {
                                let _ = provider
                                    .event_tx
                                    .send(WalletEvent::AccountsChanged(accounts.clone()));
                            }
                        }
                        last = Some((accounts, chain_id));
                    }
                    Err(e) => {
                        tracing::debug!(error = %e, url = %provider.url, "wallet poll failed");
                    }
                }

                drop(provider);
                tokio::time::sleep(interval).await;
            }
        })
    }

    async fn snapshot(&self) -> Result<(Vec<String>, String), ProviderError> {
        let accounts = eth_accounts(self).await?;
        let chain_id = eth_chain_id(self).await?;
        Ok((accounts, chain_id))
    }
}

#[async_trait]
impl Provider for HttpProvider {
    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError> {
        let req = RpcRequest {
            jsonrpc: "2.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method,
            params,
        };

        let resp: RpcResponse = self
            .http
            .post(&self.url)
            .json(&req)
            .send()
            .await
            .map_err(|e| ProviderError::Transport(format!("{} request failed: {}", method, e)))?
            .json()
            .await
            .map_err(|e| {
                ProviderError::InvalidResponse(format!("failed to parse {} response: {}", method, e))
            })?;

        if let Some(err) = resp.error {
            return Err(ProviderError::Rpc {
                code: err.code,
                message: err.message,
            });
        }

        Ok(resp.result)
    }

    fn subscribe(&self) -> Option<broadcast::Receiver<WalletEvent>> {
        Some(self.event_tx.subscribe())
    }
}
