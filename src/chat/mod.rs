//! Chat sessions against a chatbot's on-chain system prompt.

pub mod completion;
pub mod session;
pub mod usage;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::GatewayError;

pub use completion::{CompletionClient, OpenAiCompletionClient};
pub use session::{AccessGate, ChatSession};
pub use usage::ChatUsage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Bot,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: u64,
    pub content: String,
    pub sender: Sender,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bot_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bot_image: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("free messages are used up; holding enough tokens for super chat is required")]
    AllowanceExhausted,
    #[error("access check failed: {0}")]
    Access(#[from] GatewayError),
    #[error("chat completion request failed: {0}")]
    Http(String),
    #[error("chat completion API returned {status}: {message}")]
    Api { status: u16, message: String },
    #[error("chat completion response had no content")]
    EmptyResponse,
}

impl From<ChatError> for GatewayError {
    fn from(err: ChatError) -> Self {
        match err {
            ChatError::AllowanceExhausted => GatewayError::Unauthorized(
                "Free messages are used up. Hold enough tokens to use super chat.".into(),
            ),
            ChatError::Access(e) => e,
            other => GatewayError::Network(other.to_string()),
        }
    }
}
