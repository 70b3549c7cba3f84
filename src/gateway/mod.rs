//! Contract gateway: typed handles over the NFT, token and factory contracts.
//!
//! Reads go through a read-only network provider; state-changing calls go
//! through the wallet, are awaited to one confirmation, and report their
//! lifecycle on the event bus.

pub mod contracts;
pub mod factory;
pub mod nft;
pub mod token;

use std::{sync::Arc, time::Duration};

use chatbot_abi::{
    decode_one, encode_call, format_address, parse_address, parse_hex, parse_word, Address,
    LogEntry, ParamType, Token,
};
use serde::Serialize;
use serde_json::Value;

use crate::{
    config::{ContractAddresses, DEFAULT_CONFIRM_POLL},
    error::{CallResult, GatewayError},
    events::{EventBus, TxStatus},
    provider::{eth_accounts, parse_quantity, Provider},
};

pub use factory::{AutoMint, ChatbotCreation, CreateChatbotRequest, CreateOptions};

/// Which connection a contract handle is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    ReadOnly,
    Signer,
}

/// Outcome of a confirmed state-changing call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TxOutcome {
    pub transaction_hash: String,
}

/// The subset of a transaction receipt the gateway uses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxReceipt {
    pub transaction_hash: String,
    pub block_number: Option<u64>,
    pub status: bool,
    pub logs: Vec<LogEntry>,
}

pub struct Gateway {
    reader: Arc<dyn Provider>,
    wallet: Option<Arc<dyn Provider>>,
    addresses: ContractAddresses,
    poll_interval: Duration,
    events: Option<EventBus>,
}

impl Gateway {
    pub fn new(
        reader: Arc<dyn Provider>,
        wallet: Option<Arc<dyn Provider>>,
        addresses: ContractAddresses,
    ) -> Self {
        Self {
            reader,
            wallet,
            addresses,
            poll_interval: DEFAULT_CONFIRM_POLL,
            events: None,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    pub fn addresses(&self) -> &ContractAddresses {
        &self.addresses
    }

    pub fn contract(&self, address: Address, access: Access) -> ContractHandle<'_> {
        ContractHandle {
            gateway: self,
            address,
            access,
        }
    }

    fn wallet(&self) -> CallResult<&dyn Provider> {
        self.wallet.as_deref().ok_or(GatewayError::ProviderMissing)
    }

    /// First account the wallet has authorized.
    pub async fn signer_address(&self) -> CallResult<Address> {
        let accounts = eth_accounts(self.wallet()?).await?;
        let first = accounts.first().ok_or(GatewayError::NotConnected)?;
        Ok(parse_address(first)?)
    }

    /// Poll until the receipt is available. There is no timeout: the wait
    /// ends when the node returns the receipt or the request fails.
    async fn wait_for_receipt(&self, tx_hash: &str) -> CallResult<TxReceipt> {
        let wallet = self.wallet()?;
        loop {
            let result = wallet
                .request("eth_getTransactionReceipt", serde_json::json!([tx_hash]))
                .await?;
            if !result.is_null() {
                return parse_receipt(&result);
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    fn emit_tx(&self, status: TxStatus, method: &str, hash: Option<&str>, error: Option<&str>) {
        if let Some(ref bus) = self.events {
            bus.emit_tx(status, method, hash, error);
        }
    }

    fn emit(&self, event: Value) {
        if let Some(ref bus) = self.events {
            bus.emit(event);
        }
    }
}

/// A contract address bound to a connection.
pub struct ContractHandle<'a> {
    gateway: &'a Gateway,
    address: Address,
    access: Access,
}

impl ContractHandle<'_> {
    pub fn address(&self) -> Address {
        self.address
    }

    fn provider(&self) -> CallResult<&dyn Provider> {
        match self.access {
            Access::ReadOnly => Ok(self.gateway.reader.as_ref()),
            Access::Signer => self.gateway.wallet(),
        }
    }

    /// `eth_call` a view function and decode its single return value.
    pub async fn call(&self, signature: &str, args: &[Token], returns: ParamType) -> CallResult<Token> {
        let provider = self.provider()?;
        let data = encode_call(signature, args);
        let result = provider
            .request(
                "eth_call",
                serde_json::json!([
                    {"to": format_address(&self.address), "data": chatbot_abi::to_hex(&data)},
                    "latest"
                ]),
            )
            .await?;

        let hex_result = result
            .as_str()
            .ok_or_else(|| GatewayError::Decode(format!("{}: expected hex string", signature)))?;
        let bytes = parse_hex(hex_result)?;
        if bytes.is_empty() {
            return Err(GatewayError::Decode(format!(
                "{} returned no data; is a contract deployed at {}?",
                signature,
                format_address(&self.address)
            )));
        }
        Ok(decode_one(returns, &bytes)?)
    }

    pub async fn call_string(&self, signature: &str, args: &[Token]) -> CallResult<String> {
        self.call(signature, args, ParamType::String)
            .await?
            .into_string()
            .ok_or_else(|| mismatch(signature))
    }

    pub async fn call_bool(&self, signature: &str, args: &[Token]) -> CallResult<bool> {
        self.call(signature, args, ParamType::Bool)
            .await?
            .as_bool()
            .ok_or_else(|| mismatch(signature))
    }

    pub async fn call_address(&self, signature: &str, args: &[Token]) -> CallResult<Address> {
        self.call(signature, args, ParamType::Address)
            .await?
            .as_address()
            .ok_or_else(|| mismatch(signature))
    }

    pub async fn call_uint(&self, signature: &str, args: &[Token]) -> CallResult<u128> {
        self.call(signature, args, ParamType::Uint256)
            .await?
            .as_uint()
            .ok_or_else(|| mismatch(signature))
    }

    pub async fn call_addresses(&self, signature: &str, args: &[Token]) -> CallResult<Vec<Address>> {
        self.call(signature, args, ParamType::AddressArray)
            .await?
            .into_address_array()
            .ok_or_else(|| mismatch(signature))
    }

    /// Submit a transaction from the wallet's account and wait for one
    /// confirmation. A mined-but-reverted transaction is an error.
    pub async fn send(&self, signature: &str, args: &[Token], gas: Option<u64>) -> CallResult<TxReceipt> {
        if self.access != Access::Signer {
            return Err(GatewayError::InvalidInput(format!(
                "{} needs a signer; handle is read-only",
                signature
            )));
        }
        let gateway = self.gateway;
        let wallet = gateway.wallet()?;
        let from = gateway.signer_address().await?;

        let data = encode_call(signature, args);
        let mut tx = serde_json::json!({
            "from": format_address(&from),
            "to": format_address(&self.address),
            "data": chatbot_abi::to_hex(&data),
        });
        if let Some(gas) = gas {
            tx["gas"] = Value::String(format!("0x{:x}", gas));
        }

        let hash = match wallet.request("eth_sendTransaction", serde_json::json!([tx])).await {
            Ok(v) => v
                .as_str()
                .map(str::to_string)
                .ok_or_else(|| GatewayError::Decode("eth_sendTransaction: expected hash".into()))?,
            Err(e) => {
                let err = GatewayError::from(e);
                gateway.emit_tx(TxStatus::Failed, signature, None, Some(&err.to_string()));
                return Err(err);
            }
        };

        tracing::info!(method = %signature, tx_hash = %hash, "transaction sent, waiting for confirmation");
        gateway.emit_tx(TxStatus::Pending, signature, Some(&hash), None);

        match gateway.wait_for_receipt(&hash).await {
            Ok(receipt) if receipt.status => {
                tracing::info!(method = %signature, tx_hash = %hash, block = ?receipt.block_number, "transaction confirmed");
                gateway.emit_tx(TxStatus::Confirmed, signature, Some(&hash), None);
                Ok(receipt)
            }
            Ok(_) => {
                let err = GatewayError::Reverted(format!("transaction {} reverted", hash));
                gateway.emit_tx(TxStatus::Failed, signature, Some(&hash), Some(&err.to_string()));
                Err(err)
            }
            Err(err) => {
                gateway.emit_tx(TxStatus::Failed, signature, Some(&hash), Some(&err.to_string()));
                Err(err)
            }
        }
    }

    /// [`send`](Self::send) reduced to the transaction hash.
    pub async fn transact(&self, signature: &str, args: &[Token]) -> CallResult<TxOutcome> {
        let receipt = self.send(signature, args, None).await?;
        Ok(TxOutcome {
            transaction_hash: receipt.transaction_hash,
        })
    }
}

fn mismatch(signature: &str) -> GatewayError {
    GatewayError::Decode(format!("{}: unexpected return type", signature))
}

/// Parse a user-supplied `0x` address.
pub fn parse_address_input(s: &str) -> CallResult<Address> {
    parse_address(s).map_err(|_| GatewayError::InvalidInput(format!("invalid address: {}", s)))
}

/// Parse an `eth_getTransactionReceipt` result.
pub fn parse_receipt(value: &Value) -> CallResult<TxReceipt> {
    let obj = value
        .as_object()
        .ok_or_else(|| GatewayError::Decode("receipt: expected object".into()))?;

    let transaction_hash = obj
        .get("transactionHash")
        .and_then(Value::as_str)
        .ok_or_else(|| GatewayError::Decode("receipt: missing transactionHash".into()))?
        .to_string();

    let block_number = match obj.get("blockNumber").and_then(Value::as_str) {
        Some(s) => Some(parse_quantity(s)? as u64),
        None => None,
    };

    // Pre-Byzantium receipts have no status field; treat them as successful.
    let status = match obj.get("status").and_then(Value::as_str) {
        Some(s) => parse_quantity(s)? == 1,
        None => true,
    };

    let logs = match obj.get("logs").and_then(Value::as_array) {
        Some(items) => items.iter().map(parse_log).collect::<CallResult<Vec<_>>>()?,
        None => Vec::new(),
    };

    Ok(TxReceipt {
        transaction_hash,
        block_number,
        status,
        logs,
    })
}

fn parse_log(value: &Value) -> CallResult<LogEntry> {
    let address = value
        .get("address")
        .and_then(Value::as_str)
        .ok_or_else(|| GatewayError::Decode("log: missing address".into()))?;
    let topics = value
        .get("topics")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .map(|t| {
                    t.as_str()
                        .ok_or_else(|| GatewayError::Decode("log: topic is not a string".into()))
                        .and_then(|s| Ok(parse_word(s)?))
                })
                .collect::<CallResult<Vec<_>>>()
        })
        .transpose()?
        .unwrap_or_default();
    let data = match value.get("data").and_then(Value::as_str) {
        Some(s) => parse_hex(s)?,
        None => Vec::new(),
    };

    Ok(LogEntry {
        address: parse_address(address)?,
        topics,
        data,
    })
}
