//! Wallet connection state.
//!
//! Status is derived from the provider, never prompted for, except by an
//! explicit [`WalletConnector::connect`]. A chain change discards everything
//! cached and rebuilds the status from scratch.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use chatbot_abi::{format_units, TOKEN_DECIMALS};
use serde::Serialize;
use tokio::{
    sync::{broadcast, watch},
    task::JoinHandle,
};

use crate::{
    config::NetworkConfig,
    error::{CallResult, GatewayError},
    events::EventBus,
    provider::{
        eth_accounts, eth_chain_id, eth_get_balance, eth_request_accounts, Provider,
        ProviderError, WalletEvent,
    },
};

/// Digits kept after the decimal point in the balance display.
const BALANCE_DISPLAY_DIGITS: usize = 4;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletStatus {
    pub connected: bool,
    pub address: Option<String>,
    pub chain_id: Option<String>,
    pub balance_display: Option<String>,
}

pub struct WalletConnector {
    provider: Option<Arc<dyn Provider>>,
    network: NetworkConfig,
    status_tx: watch::Sender<WalletStatus>,
    events: Option<EventBus>,
    /// Set by [`WalletConnector::disconnect`] until the next `connect`.
    disconnected_by_user: AtomicBool,
}

/// Keeps the wallet event listener alive; dropping it unsubscribes.
pub struct WalletSubscription {
    task: JoinHandle<()>,
}

impl Drop for WalletSubscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl WalletConnector {
    pub fn new(
        provider: Option<Arc<dyn Provider>>,
        network: NetworkConfig,
        events: Option<EventBus>,
    ) -> Arc<Self> {
        let (status_tx, _) = watch::channel(WalletStatus::default());
        Arc::new(Self {
            provider,
            network,
            status_tx,
            events,
            disconnected_by_user: AtomicBool::new(false),
        })
    }

    pub fn is_installed(&self) -> bool {
        self.provider.is_some()
    }

    pub fn network(&self) -> &NetworkConfig {
        &self.network
    }

    /// Last known status.
    pub fn status(&self) -> WalletStatus {
        self.status_tx.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<WalletStatus> {
        self.status_tx.subscribe()
    }

    /// Query already-authorized accounts and the active chain without prompting.
    ///
    /// A missing provider or a failed query reads as disconnected.
    pub async fn connection_status(&self) -> WalletStatus {
        let Some(provider) = self.provider.as_deref() else {
            return WalletStatus::default();
        };

        let result = async {
            let accounts = eth_accounts(provider).await?;
            let chain_id = eth_chain_id(provider).await?;
            Ok::<_, ProviderError>((accounts, chain_id))
        }
        .await;

        match result {
            Ok((accounts, chain_id)) => WalletStatus {
                connected: !accounts.is_empty(),
                address: accounts.into_iter().next(),
                chain_id: Some(chain_id),
                balance_display: None,
            },
            Err(e) => {
                tracing::warn!(error = %e, "failed to check wallet connection status");
                WalletStatus::default()
            }
        }
    }

    /// Re-derive the status (including balance) and publish it.
    ///
    /// After a local [`disconnect`](Self::disconnect) this keeps reporting
    /// disconnected, even though the wallet still authorizes the account.
    pub async fn refresh(&self) -> WalletStatus {
        if self.disconnected_by_user.load(Ordering::Acquire) {
            self.publish(WalletStatus::default());
            return WalletStatus::default();
        }
        let status = self.connection_status().await;
        let status = match (status.connected, status.address.clone(), self.provider.as_deref()) {
            (true, Some(address), Some(provider)) => {
                match self.wallet_info(provider, &address).await {
                    Ok(full) => full,
                    Err(e) => {
                        tracing::warn!(error = %e, address = %address, "failed to load wallet info");
                        status
                    }
                }
            }
            _ => status,
        };
        self.publish(status.clone());
        status
    }

    /// Ask the wallet for account access and make sure it is on the
    /// configured chain. The status only becomes connected if both succeed.
    pub async fn connect(&self) -> CallResult<WalletStatus> {
        let provider = self.provider.as_deref().ok_or(GatewayError::ProviderMissing)?;

        let accounts = eth_request_accounts(provider).await.map_err(|e| {
            tracing::warn!(error = %e, "wallet connection request failed");
            GatewayError::from(e)
        })?;
        let address = accounts.into_iter().next().ok_or(GatewayError::NotConnected)?;

        self.ensure_chain().await?;

        self.disconnected_by_user.store(false, Ordering::Release);
        let status = self.wallet_info(provider, &address).await?;
        self.publish(status.clone());
        self.emit(serde_json::json!({
            "type": "wallet:connected",
            "address": address,
        }));
        tracing::info!(address = %address, chain_id = ?status.chain_id, "wallet connected");
        Ok(status)
    }

    /// Switch the wallet to the configured chain, registering it first if the
    /// wallet does not know it.
    pub async fn ensure_chain(&self) -> CallResult<()> {
        let provider = self.provider.as_deref().ok_or(GatewayError::ProviderMissing)?;

        let current = eth_chain_id(provider).await?;
        let wanted = self.network.hex_chain_id();
        if current.eq_ignore_ascii_case(&wanted) {
            return Ok(());
        }

        tracing::info!(current = %current, wanted = %wanted, "switching wallet chain");
        let switched = provider
            .request(
                "wallet_switchEthereumChain",
                serde_json::json!([{ "chainId": wanted }]),
            )
            .await;

        match switched {
            Ok(_) => Ok(()),
            Err(e) if e.code() == Some(ProviderError::UNRECOGNIZED_CHAIN) => {
                tracing::info!(chain = %self.network.name, "chain unknown to wallet, adding it");
                provider
                    .request(
                        "wallet_addEthereumChain",
                        serde_json::json!([self.network.add_chain_params()]),
                    )
                    .await?;
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to switch wallet chain");
                Err(e.into())
            }
        }
    }

    /// Forget the connection locally. It stays forgotten until the next
    /// [`connect`](Self::connect).
    pub fn disconnect(&self) {
        self.disconnected_by_user.store(true, Ordering::Release);
        self.clear();
    }

    fn clear(&self) {
        self.publish(WalletStatus::default());
        self.emit(serde_json::json!({"type": "wallet:disconnected"}));
    }

    /// Subscribe to wallet events for as long as the returned guard lives.
    ///
    /// Returns `None` when there is no provider or it emits no events.
    pub fn attach(self: &Arc<Self>) -> Option<WalletSubscription> {
        let mut rx = self.provider.as_ref()?.subscribe()?;
        let this = Arc::clone(self);
        let task = tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => this.handle_event(event).await,
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(skipped = n, "wallet listener lagged, skipping events");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
        Some(WalletSubscription { task })
    }

    pub async fn handle_event(&self, event: WalletEvent) {
        match event {
            WalletEvent::AccountsChanged(accounts) => {
                let Some(address) = accounts.into_iter().next() else {
                    tracing::info!("wallet accounts cleared");
                    self.clear();
                    return;
                };
                if self.disconnected_by_user.load(Ordering::Acquire) {
                    tracing::debug!(address = %address, "ignoring account change while disconnected");
                    return;
                }
                let Some(provider) = self.provider.as_deref() else {
                    return;
                };
                match self.wallet_info(provider, &address).await {
                    Ok(status) => {
                        self.publish(status);
                        self.emit(serde_json::json!({
                            "type": "wallet:accountsChanged",
                            "address": address,
                        }));
                    }
                    Err(e) => {
                        tracing::error!(error = %e, address = %address, "failed to update wallet info");
                    }
                }
            }
            WalletEvent::ChainChanged(chain_id) => {
                tracing::info!(chain_id = %chain_id, "wallet chain changed, reloading");
                self.reload().await;
                self.emit(serde_json::json!({
                    "type": "wallet:reload",
                    "chainId": chain_id,
                }));
            }
        }
    }

    /// Drop every cached value and rebuild the status from the provider.
    pub async fn reload(&self) -> WalletStatus {
        self.publish(WalletStatus::default());
        self.refresh().await
    }

    async fn wallet_info(
        &self,
        provider: &dyn Provider,
        address: &str,
    ) -> Result<WalletStatus, ProviderError> {
        let chain_id = eth_chain_id(provider).await?;
        let balance = eth_get_balance(provider, address).await?;
        Ok(WalletStatus {
            connected: true,
            address: Some(address.to_string()),
            chain_id: Some(chain_id),
            balance_display: Some(format_balance(balance)),
        })
    }

    fn publish(&self, status: WalletStatus) {
        self.status_tx.send_replace(status);
    }

    fn emit(&self, event: serde_json::Value) {
        if let Some(ref bus) = self.events {
            bus.emit(event);
        }
    }
}

/// Wei → decimal string truncated to four fractional digits.
pub fn format_balance(wei: u128) -> String {
    let full = format_units(wei, TOKEN_DECIMALS);
    match full.split_once('.') {
        Some((whole, fraction)) if fraction.len() > BALANCE_DISPLAY_DIGITS => {
            format!("{}.{}", whole, &fraction[..BALANCE_DISPLAY_DIGITS])
        }
        _ => full,
    }
}
