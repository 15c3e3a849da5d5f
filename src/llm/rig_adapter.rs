//! Bridges rig's `CompletionModel` to our `LlmProvider` trait.
//!
//! The last message of a request becomes the rig prompt, everything before
//! it the chat history. Images ride along as base64 user content.

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use rig::OneOrMany;
use rig::completion::CompletionModel;
use rig::message::{AssistantContent, ImageMediaType, Message, UserContent};
use tracing::debug;

use super::provider::{
    ChatMessage, CompletionRequest, CompletionResponse, ImagePart, LlmProvider, Role,
};
use crate::error::LlmError;

pub struct RigAdapter<M> {
    model: M,
    model_name: String,
    provider: &'static str,
}

impl<M: CompletionModel> RigAdapter<M> {
    pub fn new(model: M, model_name: &str, provider: &'static str) -> Self {
        Self {
            model,
            model_name: model_name.to_string(),
            provider,
        }
    }

    fn invalid(&self, reason: impl Into<String>) -> LlmError {
        LlmError::InvalidRequest {
            provider: self.provider.to_string(),
            reason: reason.into(),
        }
    }

    fn to_rig_message(&self, message: ChatMessage) -> Result<Message, LlmError> {
        match message.role {
            Role::Assistant => Ok(Message::assistant(message.content)),
            Role::User if message.images.is_empty() => Ok(Message::user(message.content)),
            Role::User => {
                let mut content = Vec::with_capacity(1 + message.images.len());
                if !message.content.is_empty() {
                    content.push(UserContent::text(message.content));
                }
                for image in &message.images {
                    content.push(self.to_image_content(image)?);
                }
                let content =
                    OneOrMany::many(content).map_err(|_| self.invalid("empty user message"))?;
                Ok(Message::User { content })
            }
        }
    }

    fn to_image_content(&self, image: &ImagePart) -> Result<UserContent, LlmError> {
        let media_type = image_media_type(&image.mime_type)
            .ok_or_else(|| self.invalid(format!("unsupported image type {}", image.mime_type)))?;
        Ok(UserContent::image_base64(
            BASE64.encode(&image.data),
            Some(media_type),
            None,
        ))
    }
}

fn image_media_type(mime_type: &str) -> Option<ImageMediaType> {
    match mime_type.to_ascii_lowercase().as_str() {
        "image/png" => Some(ImageMediaType::PNG),
        "image/jpeg" | "image/jpg" => Some(ImageMediaType::JPEG),
        "image/gif" => Some(ImageMediaType::GIF),
        "image/webp" => Some(ImageMediaType::WEBP),
        "image/heic" => Some(ImageMediaType::HEIC),
        "image/heif" => Some(ImageMediaType::HEIF),
        _ => None,
    }
}

#[async_trait]
impl<M> LlmProvider for RigAdapter<M>
where
    M: CompletionModel + Send + Sync + 'static,
{
    fn model_name(&self) -> &str {
        &self.model_name
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let mut history = request
            .messages
            .into_iter()
            .map(|m| self.to_rig_message(m))
            .collect::<Result<Vec<_>, _>>()?;
        let prompt = history.pop().ok_or_else(|| self.invalid("no messages"))?;

        debug!(model = %self.model_name, turns = history.len() + 1, "Sending completion request");

        let mut builder = self.model.completion_request(prompt).messages(history);
        if let Some(temperature) = request.temperature {
            builder = builder.temperature(f64::from(temperature));
        }
        if let Some(max_tokens) = request.max_tokens {
            builder = builder.max_tokens(u64::from(max_tokens));
        }

        let response = builder.send().await.map_err(|e| LlmError::RequestFailed {
            provider: self.provider.to_string(),
            reason: e.to_string(),
        })?;

        let content = response
            .choice
            .iter()
            .filter_map(|c| match c {
                AssistantContent::Text(text) => Some(text.text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("");

        Ok(CompletionResponse { content })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_types_map_case_insensitively() {
        assert!(matches!(image_media_type("image/PNG"), Some(ImageMediaType::PNG)));
        assert!(matches!(image_media_type("image/jpg"), Some(ImageMediaType::JPEG)));
        assert!(image_media_type("application/pdf").is_none());
    }
}
