//! Conversational assistant for the dashboard.

pub mod history;

pub use history::{Chat, ChatEntry, ChatHistoryStore, Speaker};

use std::sync::Arc;

use tracing::{info, warn};

use crate::error::AssistantError;
use crate::llm::{ChatMessage, CompletionRequest, ImagePart, LlmProvider};

/// First message of every chat, and the model's priming reply.
pub const GREETING: &str = "Hello! I'm Nina, your AI assistant. How can I help you today?";

/// Sent back when the model returns nothing.
pub const EMPTY_REPLY: &str = "I'm sorry, I don't have a response for that.";

const MAX_OUTPUT_TOKENS: u32 = 2048;

const PERSONA_PROMPT: &str = "You are Nina, a friendly and helpful AI assistant for the SyncFlo \
Email Agent dashboard. Your goal is to assist users with their questions about the dashboard, \
their emails, and their analytics. You should only answer questions about the email dashboard. \
You are also a specialized email drafter who writes subject lines and email bodies. \
Be concise and to the point, but also friendly and approachable.";

pub struct Assistant {
    llm: Arc<dyn LlmProvider>,
    history: Arc<ChatHistoryStore>,
}

impl Assistant {
    pub fn new(llm: Arc<dyn LlmProvider>, history: Arc<ChatHistoryStore>) -> Self {
        Self { llm, history }
    }

    pub fn history(&self) -> &Arc<ChatHistoryStore> {
        &self.history
    }

    /// Answer `message` within chat `chat_id`.
    ///
    /// The exchange is recorded only when the model call succeeds.
    pub async fn respond(
        &self,
        chat_id: &str,
        message: &str,
        images: Vec<ImagePart>,
    ) -> Result<String, AssistantError> {
        let chat = self
            .history
            .chat(chat_id)
            .await
            .ok_or_else(|| AssistantError::ChatNotFound(chat_id.to_string()))?;

        let mut messages = vec![
            ChatMessage::user(PERSONA_PROMPT),
            ChatMessage::assistant(GREETING),
        ];
        messages.extend(chat.entries.iter().map(|entry| match entry.speaker {
            Speaker::User => ChatMessage::user(entry.text.as_str()),
            Speaker::Assistant => ChatMessage::assistant(entry.text.as_str()),
        }));
        messages.push(ChatMessage::user(message).with_images(images));

        let request = CompletionRequest::new(messages).with_max_tokens(MAX_OUTPUT_TOKENS);
        let response = self.llm.complete(request).await?;

        let reply = if response.content.trim().is_empty() {
            EMPTY_REPLY.to_string()
        } else {
            response.content
        };

        let recorded = self
            .history
            .append(chat_id, vec![ChatEntry::user(message), ChatEntry::assistant(reply.as_str())])
            .await?;
        if !recorded {
            warn!(chat_id = %chat_id, "Chat deleted while the assistant was answering");
        }

        info!(chat_id = %chat_id, reply_len = reply.len(), "Assistant replied");
        Ok(reply)
    }
}
