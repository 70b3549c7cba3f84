//! Chatbot factory: deploy a chatbot contract and recover its address.

use chatbot_abi::{format_address, parse_units, Address, LogEntry, Token, TOKEN_DECIMALS};
use serde::{Deserialize, Serialize};

use super::{contracts, Access, Gateway};
use crate::{
    error::{CallResult, GatewayError},
    metadata::{derive_symbol, truncate_chars},
};

/// Longest prompt template sent to the factory, in characters.
pub const MAX_PROMPT_TEMPLATE_CHARS: usize = 10_000;

/// Gas limit for `createChatbot`; the deployment is too large for estimates
/// to be reliable on every wallet.
pub const CREATE_GAS_LIMIT: u64 = 5_000_000;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateChatbotRequest {
    pub name: String,
    /// Derived from the name when absent or blank.
    #[serde(default)]
    pub symbol: Option<String>,
    pub prompt_template: String,
    /// Decimal amount in whole tokens, e.g. `"0.01"`.
    pub initial_price: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOptions {
    #[serde(default)]
    pub auto_mint: bool,
}

/// What happened to the optional mint after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum AutoMint {
    AlreadyMinted,
    Minted {
        #[serde(rename = "transactionHash")]
        transaction_hash: String,
    },
    Failed {
        error: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatbotCreation {
    /// Absent when the receipt carried no `ChatbotCreated` event; look the
    /// contract up with `getUserChatbots` instead.
    pub chatbot_address: Option<String>,
    pub transaction_hash: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_mint: Option<AutoMint>,
}

/// Address of the chatbot announced by the first decodable `ChatbotCreated`
/// log. Logs from other contracts or events are skipped.
pub fn extract_created_address(logs: &[LogEntry]) -> Option<Address> {
    contracts::FACTORY_INTERFACE
        .find_event(logs, contracts::CHATBOT_CREATED.name)
        .and_then(|event| event.arg("chatbotContract").and_then(Token::as_address))
}

impl Gateway {
    /// Deploy a chatbot through the factory and wait for one confirmation.
    ///
    /// A missing creation event is not an error. The optional auto-mint never
    /// fails the creation; its outcome is reported alongside.
    pub async fn create_chatbot(
        &self,
        request: &CreateChatbotRequest,
        options: CreateOptions,
    ) -> CallResult<ChatbotCreation> {
        let name = request.name.trim();
        if name.is_empty() {
            return Err(GatewayError::InvalidInput("chatbot name is required".into()));
        }
        let symbol = match request.symbol.as_deref().map(str::trim) {
            Some(s) if !s.is_empty() => s.to_string(),
            _ => derive_symbol(name),
        };
        let price = parse_units(request.initial_price.trim(), TOKEN_DECIMALS)?;

        let template = truncate_chars(&request.prompt_template, MAX_PROMPT_TEMPLATE_CHARS);
        if template.len() < request.prompt_template.len() {
            tracing::warn!(
                max_chars = MAX_PROMPT_TEMPLATE_CHARS,
                "prompt template too large, truncating"
            );
        }

        tracing::info!(name = %name, symbol = %symbol, price = %request.initial_price, "creating chatbot");
        let receipt = self
            .contract(self.addresses().factory, Access::Signer)
            .send(
                contracts::CREATE_CHATBOT,
                &[
                    Token::String(name.to_string()),
                    Token::String(symbol),
                    Token::String(template.to_string()),
                    Token::Uint(price),
                ],
                Some(CREATE_GAS_LIMIT),
            )
            .await?;

        let Some(chatbot) = extract_created_address(&receipt.logs) else {
            tracing::warn!(
                tx_hash = %receipt.transaction_hash,
                "ChatbotCreated event not found in receipt; query getUserChatbots for the address"
            );
            return Ok(ChatbotCreation {
                chatbot_address: None,
                transaction_hash: receipt.transaction_hash,
                auto_mint: None,
            });
        };

        let address = format_address(&chatbot);
        tracing::info!(chatbot = %address, tx_hash = %receipt.transaction_hash, "chatbot created");
        self.emit(serde_json::json!({
            "type": "chatbot:created",
            "chatbotAddress": address,
            "transactionHash": receipt.transaction_hash,
        }));

        let auto_mint = if options.auto_mint {
            Some(self.auto_mint(chatbot).await)
        } else {
            None
        };

        Ok(ChatbotCreation {
            chatbot_address: Some(address),
            transaction_hash: receipt.transaction_hash,
            auto_mint,
        })
    }

    async fn auto_mint(&self, chatbot: Address) -> AutoMint {
        let result = async {
            if self.is_nft_minted(chatbot).await? {
                return Ok(AutoMint::AlreadyMinted);
            }
            let minted = self.mint_chatbot_nft(chatbot).await?;
            Ok::<_, GatewayError>(AutoMint::Minted {
                transaction_hash: minted.transaction_hash,
            })
        }
        .await;

        result.unwrap_or_else(|e| {
            tracing::error!(chatbot = %format_address(&chatbot), error = %e, "automatic NFT mint failed");
            AutoMint::Failed {
                error: e.user_message(),
            }
        })
    }

    /// Chatbot contracts deployed by `creator`, in creation order.
    pub async fn user_chatbots(&self, creator: Address) -> CallResult<Vec<String>> {
        let chatbots = self
            .contract(self.addresses().factory, Access::ReadOnly)
            .call_addresses(contracts::GET_USER_CHATBOTS, &[Token::Address(creator)])
            .await?;
        Ok(chatbots.iter().map(format_address).collect())
    }

    pub async fn total_chatbots(&self) -> CallResult<u128> {
        self.contract(self.addresses().factory, Access::ReadOnly)
            .call_uint(contracts::GET_TOTAL_CHATBOTS, &[])
            .await
    }
}
