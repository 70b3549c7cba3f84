//! Chatbot NFT contract: prompt template storage and ownership.

use chatbot_abi::{format_address, Address, Token};

use super::{contracts, Access, Gateway, TxOutcome};
use crate::{
    error::{CallResult, GatewayError},
    metadata::ChatbotContractRef,
};

const NOT_OWNER: &str = "Only the NFT owner can update the prompt template.";

impl Gateway {
    /// Prompt template of the default NFT deployment.
    pub async fn prompt_template(&self) -> CallResult<String> {
        self.chatbot_prompt_template(self.addresses().nft).await
    }

    pub async fn chatbot_prompt_template(&self, chatbot: Address) -> CallResult<String> {
        self.contract(chatbot, Access::ReadOnly)
            .call_string(contracts::GET_PROMPT_TEMPLATE, &[])
            .await
    }

    /// Write the default deployment's prompt template. The contract enforces
    /// ownership.
    pub async fn set_prompt_template(&self, prompt: &str) -> CallResult<TxOutcome> {
        self.contract(self.addresses().nft, Access::Signer)
            .transact(contracts::UPDATE_PROMPT_TEMPLATE, &[Token::String(prompt.to_string())])
            .await
    }

    pub async fn mint_initial_nft(&self) -> CallResult<TxOutcome> {
        self.mint_chatbot_nft(self.addresses().nft).await
    }

    pub async fn mint_chatbot_nft(&self, chatbot: Address) -> CallResult<TxOutcome> {
        self.contract(chatbot, Access::Signer)
            .transact(contracts::MINT_INITIAL_NFT, &[])
            .await
    }

    pub async fn nft_owner(&self) -> CallResult<Address> {
        self.chatbot_owner(self.addresses().nft).await
    }

    /// Current holder of a chatbot's NFT. Fails with `Reverted` until the NFT
    /// has been minted.
    pub async fn chatbot_owner(&self, chatbot: Address) -> CallResult<Address> {
        self.contract(chatbot, Access::ReadOnly)
            .call_address(contracts::GET_NFT_OWNER, &[])
            .await
            .map_err(|e| match e {
                GatewayError::Reverted(reason) if reason.to_lowercase().contains("not yet minted") => {
                    GatewayError::Reverted("NFT not yet minted".into())
                }
                other => {
                    tracing::error!(chatbot = %format_address(&chatbot), error = %other, "failed to read chatbot owner");
                    other
                }
            })
    }

    pub async fn can_update_prompt(&self, chatbot: Address, user: Address) -> CallResult<bool> {
        self.contract(chatbot, Access::ReadOnly)
            .call_bool(contracts::CAN_UPDATE_PROMPT, &[Token::Address(user)])
            .await
    }

    pub async fn is_nft_minted(&self, chatbot: Address) -> CallResult<bool> {
        self.contract(chatbot, Access::ReadOnly)
            .call_bool(contracts::IS_NFT_MINTED, &[])
            .await
    }

    /// Transfer a token of the default deployment from the wallet's account.
    pub async fn transfer_nft(&self, to: Address, token_id: u128) -> CallResult<TxOutcome> {
        let from = self.signer_address().await?;
        self.contract(self.addresses().nft, Access::Signer)
            .transact(
                contracts::TRANSFER_FROM,
                &[Token::Address(from), Token::Address(to), Token::Uint(token_id)],
            )
            .await
    }

    /// Update a chatbot's prompt template. Nothing is sent unless the
    /// contract says the wallet's account may update it.
    pub async fn update_chatbot_prompt(&self, chatbot: Address, prompt: &str) -> CallResult<TxOutcome> {
        let signer = self.signer_address().await?;
        if !self.can_update_prompt(chatbot, signer).await? {
            match self.chatbot_owner(chatbot).await {
                Ok(owner) => tracing::warn!(
                    chatbot = %format_address(&chatbot),
                    signer = %format_address(&signer),
                    owner = %format_address(&owner),
                    "prompt update refused: signer is not the NFT owner"
                ),
                Err(e) => tracing::warn!(
                    chatbot = %format_address(&chatbot),
                    error = %e,
                    "prompt update refused and owner lookup failed"
                ),
            }
            return Err(GatewayError::Unauthorized(NOT_OWNER.into()));
        }

        self.contract(chatbot, Access::Signer)
            .transact(contracts::UPDATE_PROMPT_TEMPLATE, &[Token::String(prompt.to_string())])
            .await
    }

    /// Mint the default deployment's NFT, then store `metadata_uri` as its
    /// prompt template. Returns the mint transaction.
    pub async fn create_chatbot_nft(&self, metadata_uri: &str) -> CallResult<TxOutcome> {
        let minted = self.mint_initial_nft().await?;
        if let Err(e) = self.set_prompt_template(metadata_uri).await {
            tracing::error!(error = %e, tx_hash = %minted.transaction_hash, "NFT minted but prompt update failed");
            return Err(GatewayError::Reverted(format!(
                "NFT was created but prompt update failed: {}",
                e
            )));
        }
        Ok(minted)
    }

    /// Address, owner and mint status of a chatbot, read live.
    pub async fn chatbot_ref(&self, chatbot: Address) -> CallResult<ChatbotContractRef> {
        let is_nft_minted = self.is_nft_minted(chatbot).await?;
        let owner_address = if is_nft_minted {
            Some(format_address(&self.chatbot_owner(chatbot).await?))
        } else {
            None
        };
        Ok(ChatbotContractRef {
            address: format_address(&chatbot),
            owner_address,
            is_nft_minted,
        })
    }
}
