//! Wallet / node provider capability.
//!
//! Everything that talks to a chain goes through a [`Provider`] handle passed in
//! by the caller, so tests can substitute an in-memory double.

pub mod http;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::broadcast;

pub use http::HttpProvider;

/// Events a wallet emits while a connector is attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalletEvent {
    /// The set of authorized accounts changed; empty means disconnected.
    AccountsChanged(Vec<String>),
    /// The active chain changed (hex chain id).
    ChainChanged(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    #[error("RPC error ({code}): {message}")]
    Rpc { code: i64, message: String },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl ProviderError {
    /// EIP-1193: the user rejected the request.
    pub const USER_REJECTED: i64 = 4001;
    /// EIP-3326: the requested chain has not been added to the wallet.
    pub const UNRECOGNIZED_CHAIN: i64 = 4902;

    pub fn code(&self) -> Option<i64> {
        match self {
            ProviderError::Rpc { code, .. } => Some(*code),
            _ => None,
        }
    }

    pub fn rpc(code: i64, message: impl Into<String>) -> Self {
        ProviderError::Rpc {
            code,
            message: message.into(),
        }
    }
}

/// An EIP-1193 style request/subscribe handle.
#[async_trait]
pub trait Provider: Send + Sync {
    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError>;

    /// Wallet event stream, if this provider emits events.
    fn subscribe(&self) -> Option<broadcast::Receiver<WalletEvent>> {
        None
    }
}

/// `eth_accounts`: already-authorized accounts, never prompts.
pub async fn eth_accounts(provider: &dyn Provider) -> Result<Vec<String>, ProviderError> {
    let result = provider.request("eth_accounts", serde_json::json!([])).await?;
    string_list(result, "eth_accounts")
}

/// `eth_requestAccounts`: prompts the user for access.
pub async fn eth_request_accounts(provider: &dyn Provider) -> Result<Vec<String>, ProviderError> {
    let result = provider
        .request("eth_requestAccounts", serde_json::json!([]))
        .await?;
    string_list(result, "eth_requestAccounts")
}

/// `eth_chainId` as the hex string the wallet reports.
pub async fn eth_chain_id(provider: &dyn Provider) -> Result<String, ProviderError> {
    let result = provider.request("eth_chainId", serde_json::json!([])).await?;
    result
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| ProviderError::InvalidResponse("eth_chainId: expected string".into()))
}

/// `eth_getBalance` at `latest`, in wei.
pub async fn eth_get_balance(provider: &dyn Provider, address: &str) -> Result<u128, ProviderError> {
    let result = provider
        .request("eth_getBalance", serde_json::json!([address, "latest"]))
        .await?;
    let hex_balance = result
        .as_str()
        .ok_or_else(|| ProviderError::InvalidResponse("eth_getBalance: expected string".into()))?;
    parse_quantity(hex_balance)
}

/// Parse a JSON-RPC hex quantity (`0x1a`).
pub fn parse_quantity(hex_str: &str) -> Result<u128, ProviderError> {
    let stripped = hex_str
        .strip_prefix("0x")
        .or_else(|| hex_str.strip_prefix("0X"))
        .unwrap_or(hex_str);
    if stripped.is_empty() {
        return Ok(0);
    }
    u128::from_str_radix(stripped, 16)
        .map_err(|_| ProviderError::InvalidResponse(format!("invalid quantity: {}", hex_str)))
}

fn string_list(value: Value, method: &str) -> Result<Vec<String>, ProviderError> {
    let items = value
        .as_array()
        .ok_or_else(|| ProviderError::InvalidResponse(format!("{}: expected array", method)))?;
    items
        .iter()
        .map(|v| {
            v.as_str()
                .map(str::to_string)
                .ok_or_else(|| ProviderError::InvalidResponse(format!("{}: expected string", method)))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_quantity_values() {
        assert_eq!(parse_quantity("0x0").unwrap(), 0);
        assert_eq!(parse_quantity("0x").unwrap(), 0);
        assert_eq!(parse_quantity("0xde0b6b3a7640000").unwrap(), 1_000_000_000_000_000_000);
        assert!(parse_quantity("0xnothex").is_err());
    }

    #[test]
    fn string_list_rejects_non_strings() {
        assert_eq!(
            string_list(serde_json::json!(["0xabc"]), "eth_accounts").unwrap(),
            vec!["0xabc".to_string()]
        );
        assert!(string_list(serde_json::json!([1]), "eth_accounts").is_err());
        assert!(string_list(serde_json::json!("0xabc"), "eth_accounts").is_err());
    }

    #[test]
    fn error_codes() {
        assert_eq!(
            ProviderError::rpc(ProviderError::USER_REJECTED, "denied").code(),
            Some(4001)
        );
        assert_eq!(ProviderError::Transport("down".into()).code(), None);
    }
}
