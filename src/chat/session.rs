use std::sync::Arc;

use async_trait::async_trait;
use chatbot_abi::{format_address, Address};
use chrono::Utc;

use super::{ChatError, ChatMessage, CompletionClient, Sender};
use crate::{error::CallResult, metadata::ChatbotMetadata, Gateway};

/// Decides whether a user may keep chatting once the free messages are spent.
#[async_trait]
pub trait AccessGate: Send + Sync {
    async fn can_use_super_chat(&self, user: Address) -> CallResult<bool>;
}

#[async_trait]
impl AccessGate for Gateway {
    async fn can_use_super_chat(&self, user: Address) -> CallResult<bool> {
        Gateway::can_use_super_chat(self, user).await
    }
}

/// In-memory conversation with one chatbot. Nothing is persisted.
pub struct ChatSession {
    metadata: ChatbotMetadata,
    client: Arc<dyn CompletionClient>,
    access: Option<(Address, Arc<dyn AccessGate>)>,
    messages: Vec<ChatMessage>,
    next_id: u64,
    /// Turns charged against the free allowance so far.
    used: u32,
}

impl ChatSession {
    pub fn new(metadata: ChatbotMetadata, client: Arc<dyn CompletionClient>) -> Self {
        Self {
            metadata,
            client,
            access: None,
            messages: Vec::new(),
            next_id: 1,
            used: 0,
        }
    }

    /// Check `user` against `gate` once the free messages run out. Without
    /// this, a session ends at the free allowance.
    pub fn with_access(mut self, user: Address, gate: Arc<dyn AccessGate>) -> Self {
        self.access = Some((user, gate));
        self
    }

    /// Resume from messages exchanged earlier. Their user messages count
    /// against the allowance unless [`with_usage`](Self::with_usage) says
    /// otherwise.
    pub fn with_history(mut self, history: Vec<ChatMessage>) -> Self {
        self.next_id = history.iter().map(|m| m.id).max().map_or(1, |id| id + 1);
        self.used = count_user_messages(&history);
        self.messages = history;
        self
    }

    /// Charge the allowance from a count kept outside the session.
    pub fn with_usage(mut self, used: u32) -> Self {
        self.used = used;
        self
    }

    pub fn metadata(&self) -> &ChatbotMetadata {
        &self.metadata
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn free_messages_remaining(&self) -> u32 {
        self.metadata.free_messages.saturating_sub(self.used)
    }

    /// Send `text` and return the bot's reply. Blank input is ignored.
    ///
    /// The user message stays in the history even when the access check or
    /// the completion call fails.
    pub async fn send(&mut self, text: &str) -> Result<Option<ChatMessage>, ChatError> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(None);
        }

        let over_allowance = self.free_messages_remaining() == 0;
        let message = self.message(text.to_string(), Sender::User);
        self.messages.push(message);
        self.used = self.used.saturating_add(1);

        if over_allowance {
            self.check_access().await?;
        }

        let reply = self
            .client
            .complete(&self.metadata.system_prompt, &self.messages)
            .await?;

        let mut reply = self.message(reply, Sender::Bot);
        if !self.metadata.name.is_empty() {
            reply.bot_name = Some(self.metadata.name.clone());
        }
        if !self.metadata.image.is_empty() {
            reply.bot_image = Some(self.metadata.image.clone());
        }
        self.messages.push(reply.clone());
        Ok(Some(reply))
    }

    async fn check_access(&self) -> Result<(), ChatError> {
        let Some((user, ref gate)) = self.access else {
            return Err(ChatError::AllowanceExhausted);
        };
        if gate.can_use_super_chat(user).await? {
            Ok(())
        } else {
            tracing::info!(user = %format_address(&user), "super chat denied");
            Err(ChatError::AllowanceExhausted)
        }
    }

    fn message(&mut self, content: String, sender: Sender) -> ChatMessage {
        let id = self.next_id;
        self.next_id += 1;
        ChatMessage {
            id,
            content,
            sender,
            timestamp: Utc::now(),
            bot_name: None,
            bot_image: None,
        }
    }
}

fn count_user_messages(messages: &[ChatMessage]) -> u32 {
    let count = messages.iter().filter(|m| m.sender == Sender::User).count();
    u32::try_from(count).unwrap_or(u32::MAX)
}
