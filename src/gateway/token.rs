//! Chatbot token: balances and the super-chat allowance.
//!
//! Amounts cross this boundary as decimal strings at 18 decimals.

use chatbot_abi::{format_units, parse_units, Address, Token, TOKEN_DECIMALS};

use super::{contracts, Access, Gateway, TxOutcome};
use crate::error::CallResult;

impl Gateway {
    pub async fn token_balance(&self, owner: Address) -> CallResult<String> {
        let raw = self
            .contract(self.addresses().token, Access::ReadOnly)
            .call_uint(contracts::BALANCE_OF, &[Token::Address(owner)])
            .await?;
        Ok(format_units(raw, TOKEN_DECIMALS))
    }

    pub async fn mint_tokens(&self, to: Address, amount: &str) -> CallResult<TxOutcome> {
        let amount = parse_units(amount, TOKEN_DECIMALS)?;
        self.contract(self.addresses().token, Access::Signer)
            .transact(contracts::MINT, &[Token::Address(to), Token::Uint(amount)])
            .await
    }

    pub async fn can_use_super_chat(&self, user: Address) -> CallResult<bool> {
        self.contract(self.addresses().token, Access::ReadOnly)
            .call_bool(contracts::CAN_USE_SUPER_CHAT, &[Token::Address(user)])
            .await
    }

    pub async fn use_super_chat(&self) -> CallResult<TxOutcome> {
        self.contract(self.addresses().token, Access::Signer)
            .transact(contracts::USE_SUPER_CHAT, &[])
            .await
    }

    pub async fn super_chat_threshold(&self) -> CallResult<String> {
        let raw = self
            .contract(self.addresses().token, Access::ReadOnly)
            .call_uint(contracts::GET_SUPER_CHAT_THRESHOLD, &[])
            .await?;
        Ok(format_units(raw, TOKEN_DECIMALS))
    }

    pub async fn update_super_chat_threshold(&self, threshold: &str) -> CallResult<TxOutcome> {
        let threshold = parse_units(threshold, TOKEN_DECIMALS)?;
        self.contract(self.addresses().token, Access::Signer)
            .transact(contracts::UPDATE_SUPER_CHAT_THRESHOLD, &[Token::Uint(threshold)])
            .await
    }
}
