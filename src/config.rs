//! Network presets and deployed contract addresses.

use std::time::Duration;

use chatbot_abi::{parse_address, Address};
use serde::Serialize;

/// Interval between `eth_getTransactionReceipt` polls.
pub const DEFAULT_CONFIRM_POLL: Duration = Duration::from_secs(1);

/// Interval between wallet account/chain polls for HTTP wallets.
pub const DEFAULT_WALLET_POLL: Duration = Duration::from_secs(2);

/// Known networks the marketplace contracts are deployed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Network {
    /// XRPL EVM sidechain devnet.
    XrplEvm,
    /// Local Hardhat node.
    Hardhat,
}

/// Chain parameters, including what `wallet_addEthereumChain` needs.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkConfig {
    pub chain_id: u64,
    pub name: String,
    pub rpc_url: String,
    pub currency_name: String,
    pub currency_symbol: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explorer_url: Option<String>,
}

impl NetworkConfig {
    pub fn xrpl_evm() -> Self {
        Self {
            chain_id: 1_440_002,
            name: "XRPL EVM Sidechain Devnet".to_string(),
            rpc_url: "https://rpc-evm-sidechain.xrpl.org".to_string(),
            currency_name: "XRP".to_string(),
            currency_symbol: "XRP".to_string(),
            explorer_url: Some("https://evm-sidechain.xrpl.org".to_string()),
        }
    }

    pub fn hardhat() -> Self {
        Self {
            chain_id: 9_999_999,
            name: "Custom Hardhat Network".to_string(),
            rpc_url: "http://127.0.0.1:8545".to_string(),
            currency_name: "Ether".to_string(),
            currency_symbol: "ETH".to_string(),
            explorer_url: None,
        }
    }

    pub fn preset(network: Network) -> Self {
        match network {
            Network::XrplEvm => Self::xrpl_evm(),
            Network::Hardhat => Self::hardhat(),
        }
    }

    /// Chain id as the wallet reports it, e.g. `0x15f3a2`.
    pub fn hex_chain_id(&self) -> String {
        format!("0x{:x}", self.chain_id)
    }

    /// Parameters for `wallet_addEthereumChain`.
    pub fn add_chain_params(&self) -> serde_json::Value {
        let mut params = serde_json::json!({
            "chainId": self.hex_chain_id(),
            "chainName": self.name,
            "rpcUrls": [self.rpc_url],
            "nativeCurrency": {
                "name": self.currency_name,
                "symbol": self.currency_symbol,
                "decimals": 18,
            },
        });
        if let Some(ref explorer) = self.explorer_url {
            params["blockExplorerUrls"] = serde_json::json!([explorer]);
        }
        params
    }
}

const XRPL_NFT_ADDRESS: Address = hex_address("7f939e09dfc7e1aee009b50cb7e68ccd1d82a0c9");
const XRPL_TOKEN_ADDRESS: Address = hex_address("1fa7cf651292cfa4a0f89ef3dca6078e509d3ac8");
const XRPL_FACTORY_ADDRESS: Address = hex_address("6221f02562505f5038b5672ecc12d28dfcf05ee5");

/// Fixed addresses of the NFT, token and factory contracts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContractAddresses {
    pub nft: Address,
    pub token: Address,
    pub factory: Address,
}

impl ContractAddresses {
    /// Deployments on the XRPL EVM sidechain.
    pub fn xrpl_evm() -> Self {
        Self {
            nft: XRPL_NFT_ADDRESS,
            token: XRPL_TOKEN_ADDRESS,
            factory: XRPL_FACTORY_ADDRESS,
        }
    }

    /// Apply optional `0x`-hex overrides (CLI / environment).
    pub fn with_overrides(
        mut self,
        nft: Option<&str>,
        token: Option<&str>,
        factory: Option<&str>,
    ) -> anyhow::Result<Self> {
        use anyhow::Context;

        if let Some(a) = nft {
            self.nft = parse_address(a).map_err(anyhow::Error::msg).context("invalid NFT address")?;
        }
        if let Some(a) = token {
            self.token = parse_address(a).map_err(anyhow::Error::msg).context("invalid token address")?;
        }
        if let Some(a) = factory {
            self.factory = parse_address(a)
                .map_err(anyhow::Error::msg)
                .context("invalid factory address")?;
        }
        Ok(self)
    }
}

const fn hex_nibble(c: u8) -> u8 {
    match c {
        b'0'..=b'9' => c - b'0',
        b'a'..=b'f' => c - b'a' + 10,
        _ => panic!("invalid hex digit in address constant"),
    }
}

/// Compile-time parse of a 40-char lower-case hex address.
const fn hex_address(s: &str) -> Address {
    let bytes = s.as_bytes();
    let mut out = [0u8; 20];
    let mut i = 0;
    while i < 20 {
        out[i] = (hex_nibble(bytes[2 * i]) << 4) | hex_nibble(bytes[2 * i + 1]);
        i += 1;
    }
    out
}
