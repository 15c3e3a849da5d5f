//! Reply drafting: asks the LLM for a `{subject, body}` reply to one email.
//!
//! The model is told to answer with a bare JSON object, but often wraps it in
//! a markdown code fence. Fences are stripped before parsing; anything that is
//! still not an object with string `subject` and `body` fields is an error,
//! never a half-filled draft.

use std::sync::{Arc, LazyLock};

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::GenerationError;
use crate::feed::Email;
use crate::llm::{ChatMessage, CompletionRequest, LlmProvider};

static CODE_FENCE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)```(?:json)?").unwrap());

/// The parts of an email a reply is written against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DraftInput {
    pub sender: String,
    pub subject: String,
    pub body: String,
}

impl From<&Email> for DraftInput {
    fn from(email: &Email) -> Self {
        Self {
            sender: email.sender.clone(),
            subject: email.subject.clone(),
            body: email.body.clone(),
        }
    }
}

/// A generated reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Draft {
    pub subject: String,
    pub body: String,
}

#[derive(Debug, Clone)]
pub struct DraftConfig {
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for DraftConfig {
    fn default() -> Self {
        Self {
            temperature: 0.4,
            max_tokens: 1024,
        }
    }
}

pub struct DraftGenerator {
    llm: Arc<dyn LlmProvider>,
    config: DraftConfig,
}

impl DraftGenerator {
    pub fn new(llm: Arc<dyn LlmProvider>, config: DraftConfig) -> Self {
        Self { llm, config }
    }

    /// Draft a reply to `input`. Does not touch the source email.
    pub async fn generate_reply(&self, input: &DraftInput) -> Result<Draft, GenerationError> {
        info!(
            model = %self.llm.model_name(),
            sender = %input.sender,
            subject = %input.subject,
            "Generating reply draft"
        );

        let request = CompletionRequest::new(vec![ChatMessage::user(build_prompt(input))])
            .with_temperature(self.config.temperature)
            .with_max_tokens(self.config.max_tokens);

        let response = self.llm.complete(request).await?;
        let draft = parse_draft(&response.content).inspect_err(|e| {
            warn!(error = %e, response = %response.content, "Unusable draft from LLM");
        })?;

        debug!(subject = %draft.subject, "Draft generated");
        Ok(draft)
    }
}

/// Prompt asking for a JSON reply to `input`.
pub fn build_prompt(input: &DraftInput) -> String {
    format!(
        "You are an AI assistant for an email client.\n\
         Your task is to generate a professional and helpful reply to the following email.\n\n\
         Email details:\n\
         - Sender: {sender}\n\
         - Subject: {subject}\n\
         - Body:\n\"\"\"\n{body}\n\"\"\"\n\n\
         Instructions:\n\
         1. Write a concise, relevant subject line prefixed with \"Re:\".\n\
         2. Write a professional and helpful email body.\n\
         3. Address the sender by name (the part of their address before the @).\n\
         4. Keep the tone friendly and professional.\n\
         5. Sign off with \"Best regards,\".\n\n\
         Output format: return only a JSON object with two string keys, \"subject\" and \"body\".\n\
         Example:\n\
         {{\"subject\": \"Re: Your question about Project X\", \
           \"body\": \"Hi [Sender Name],\\n\\nThank you for your email...\\n\\nBest regards,\"}}",
        sender = input.sender,
        subject = input.subject,
        body = input.body,
    )
}

/// Parse model output into a draft, tolerating markdown code fences.
pub fn parse_draft(text: &str) -> Result<Draft, GenerationError> {
    let stripped = CODE_FENCE.replace_all(text, "");
    let stripped = stripped.trim();

    let value: serde_json::Value =
        serde_json::from_str(stripped).map_err(|e| GenerationError::Malformed(e.to_string()))?;
    let Some(object) = value.as_object() else {
        return Err(GenerationError::Malformed(format!(
            "expected an object, got {}",
            json_kind(&value)
        )));
    };

    let field = |name: &'static str| {
        object
            .get(name)
            .and_then(serde_json::Value::as_str)
            .map(str::to_string)
            .ok_or(GenerationError::MissingField(name))
    };

    Ok(Draft {
        subject: field("subject")?,
        body: field("body")?,
    })
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::error::LlmError;
    use crate::llm::CompletionResponse;

    /// Returns a canned reply and remembers the last prompt.
    struct CannedLlm {
        reply: Result<String, ()>,
        last_prompt: Mutex<Option<String>>,
    }

    impl CannedLlm {
        fn replying(text: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Ok(text.to_string()),
                last_prompt: Mutex::new(None),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                reply: Err(()),
                last_prompt: Mutex::new(None),
            })
        }
    }

    #[async_trait]
    impl LlmProvider for CannedLlm {
        fn model_name(&self) -> &str {
            "canned"
        }

        async fn complete(
            &self,
            request: CompletionRequest,
        ) -> Result<CompletionResponse, LlmError> {
            *self.last_prompt.lock().unwrap() = request.messages.last().map(|m| m.content.clone());
            match &self.reply {
                Ok(text) => Ok(CompletionResponse {
                    content: text.clone(),
                }),
                Err(()) => Err(LlmError::RequestFailed {
                    provider: "canned".into(),
                    reason: "connection reset".into(),
                }),
            }
        }
    }

    fn question() -> DraftInput {
        DraftInput {
            sender: "jane@acme.io".into(),
            subject: "Question".into(),
            body: "Can we move the call?".into(),
        }
    }

    #[tokio::test]
    async fn fenced_json_reply_becomes_draft() {
        let llm = CannedLlm::replying("```json\n{\"subject\":\"Re: Question\",\"body\":\"Hi...\"}\n```");
        let generator = DraftGenerator::new(llm.clone(), DraftConfig::default());

        let draft = generator.generate_reply(&question()).await.unwrap();
        assert_eq!(
            draft,
            Draft {
                subject: "Re: Question".into(),
                body: "Hi...".into(),
            }
        );

        let prompt = llm.last_prompt.lock().unwrap().clone().unwrap();
        assert!(prompt.contains("Sender: jane@acme.io"));
        assert!(prompt.contains("Subject: Question"));
        assert!(prompt.contains("Can we move the call?"));
        assert!(prompt.contains("\"Re:\""));
        assert!(prompt.contains("Best regards,"));
    }

    #[tokio::test]
    async fn non_json_reply_is_a_generation_error() {
        let generator = DraftGenerator::new(CannedLlm::replying("not json"), DraftConfig::default());
        let err = generator.generate_reply(&question()).await.unwrap_err();
        assert!(matches!(err, GenerationError::Malformed(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn provider_failure_is_a_generation_error() {
        let generator = DraftGenerator::new(CannedLlm::failing(), DraftConfig::default());
        let err = generator.generate_reply(&question()).await.unwrap_err();
        assert!(matches!(err, GenerationError::Llm(_)), "got {err:?}");
    }

    #[test]
    fn missing_or_non_string_fields_are_rejected() {
        assert!(matches!(
            parse_draft(r#"{"subject": "Re: x"}"#),
            Err(GenerationError::MissingField("body"))
        ));
        assert!(matches!(
            parse_draft(r#"{"subject": 7, "body": "hi"}"#),
            Err(GenerationError::MissingField("subject"))
        ));
        assert!(matches!(
            parse_draft(r#"["Re: x", "hi"]"#),
            Err(GenerationError::Malformed(_))
        ));
    }

    #[test]
    fn bare_and_uppercase_fences_are_stripped() {
        let draft = parse_draft("```JSON\n{\"subject\":\"Re: a\",\"body\":\"b\"}```").unwrap();
        assert_eq!(draft.subject, "Re: a");

        let draft = parse_draft("  {\"subject\":\"Re: a\",\"body\":\"b\",\"tone\":\"warm\"}  ").unwrap();
        assert_eq!(draft.body, "b");
    }

    #[test]
    fn draft_input_copies_email_fields() {
        let email = Email {
            id: "email-1".into(),
            sender: "a@x.com".into(),
            subject: "Hi".into(),
            body: "Sum".into(),
            label: "Work".into(),
            category: Default::default(),
            processed_at: chrono::Utc::now(),
            sync_status: Default::default(),
        };
        let input = DraftInput::from(&email);
        assert_eq!(input.sender, "a@x.com");
        assert_eq!(input.body, "Sum");
    }
}
