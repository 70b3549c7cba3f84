//! Third-party chat completion API (OpenAI-compatible).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{ChatError, ChatMessage, Sender};

#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// One reply for `history`, which ends with the newest user message.
    async fn complete(&self, system_prompt: &str, history: &[ChatMessage]) -> Result<String, ChatError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApiMessage {
    pub role: &'static str,
    pub content: String,
}

/// System prompt first, then the history in order.
pub fn build_messages(system_prompt: &str, history: &[ChatMessage]) -> Vec<ApiMessage> {
    std::iter::once(ApiMessage {
        role: "system",
        content: system_prompt.to_string(),
    })
    .chain(history.iter().map(|m| ApiMessage {
        role: match m.sender {
            Sender::User => "user",
            Sender::Bot => "assistant",
        },
        content: m.content.clone(),
    }))
    .collect()
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ApiMessage>,
}

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

pub struct OpenAiCompletionClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
}

impl OpenAiCompletionClient {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>, model: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            model: model.into(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

#[async_trait]
impl CompletionClient for OpenAiCompletionClient {
    async fn complete(&self, system_prompt: &str, history: &[ChatMessage]) -> Result<String, ChatError> {
        let body = CompletionRequest {
            model: &self.model,
            messages: build_messages(system_prompt, history),
        };

        let mut req = self.http.post(self.endpoint()).json(&body);
        if let Some(ref key) = self.api_key {
            req = req.bearer_auth(key);
        }

        let resp = req.send().await.map_err(|e| ChatError::Http(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            tracing::error!(status = status.as_u16(), body = %message, "chat completion failed");
            return Err(ChatError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: CompletionResponse = resp
            .json()
            .await
            .map_err(|e| ChatError::Http(format!("failed to parse completion response: {}", e)))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or(ChatError::EmptyResponse)
    }
}
