//! Chatbot metadata stored on-chain as the prompt template.

use serde::{Deserialize, Serialize};

use crate::image::placeholder_avatar;

/// Free messages per session when the metadata does not say.
pub const DEFAULT_FREE_MESSAGES: u32 = 10;

/// Characters of the description kept on-chain.
pub const DESCRIPTION_MAX_CHARS: usize = 100;

const SYMBOL_MAX_CHARS: usize = 5;
const FALLBACK_SYMBOL: &str = "BOT";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChatbotMetadata {
    pub name: String,
    pub description: String,
    pub category: String,
    pub system_prompt: String,
    /// Data URI or URL.
    pub image: String,
    pub free_messages: u32,
}

impl Default for ChatbotMetadata {
    fn default() -> Self {
        Self {
            name: String::new(),
            description: String::new(),
            category: String::new(),
            system_prompt: String::new(),
            image: String::new(),
            free_messages: DEFAULT_FREE_MESSAGES,
        }
    }
}

impl ChatbotMetadata {
    /// Serialize for storage. The description is cut to
    /// [`DESCRIPTION_MAX_CHARS`] characters.
    pub fn to_prompt_template(&self) -> serde_json::Result<String> {
        let mut stored = self.clone();
        stored.description = truncate_chars(&self.description, DESCRIPTION_MAX_CHARS).to_string();
        serde_json::to_string(&stored)
    }

    /// Serialize for storage in at most `max_chars` characters. An image that
    /// does not fit is replaced by the generated avatar; `None` when the
    /// metadata is too long even then.
    pub fn to_prompt_template_within(&self, max_chars: usize) -> serde_json::Result<Option<String>> {
        let template = self.to_prompt_template()?;
        if template.chars().count() <= max_chars {
            return Ok(Some(template));
        }

        let avatar = placeholder_avatar(&self.name);
        if self.image == avatar {
            return Ok(None);
        }
        tracing::warn!(
            len = template.chars().count(),
            max_chars,
            "metadata too long for the prompt template, using generated avatar"
        );
        let with_avatar = Self {
            image: avatar,
            ..self.clone()
        }
        .to_prompt_template()?;
        Ok((with_avatar.chars().count() <= max_chars).then_some(with_avatar))
    }

    /// Parse a stored prompt template. Anything that is not a JSON object is
    /// taken to be a bare system prompt.
    pub fn from_prompt_template(raw: &str) -> Self {
        match serde_json::from_str::<serde_json::Value>(raw) {
            Ok(value @ serde_json::Value::Object(_)) => serde_json::from_value(value)
                .unwrap_or_else(|e| {
                    tracing::debug!(error = %e, "prompt template object has unexpected fields");
                    Self::bare(raw)
                }),
            _ => Self::bare(raw),
        }
    }

    fn bare(raw: &str) -> Self {
        Self {
            system_prompt: raw.to_string(),
            ..Self::default()
        }
    }
}

/// Prefix of `s` holding at most `max` characters.
pub fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Token symbol from a chatbot name: the upper-cased initial of each word.
pub fn derive_symbol(name: &str) -> String {
    let symbol: String = name
        .split_whitespace()
        .filter_map(|word| word.chars().find(|c| c.is_alphanumeric()))
        .flat_map(char::to_uppercase)
        .take(SYMBOL_MAX_CHARS)
        .collect();
    if symbol.is_empty() {
        FALLBACK_SYMBOL.to_string()
    } else {
        symbol
    }
}

/// A chatbot contract as seen right now.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatbotContractRef {
    pub address: String,
    /// `None` until the NFT is minted.
    pub owner_address: Option<String>,
    #[serde(rename = "isNFTMinted")]
    pub is_nft_minted: bool,
}
