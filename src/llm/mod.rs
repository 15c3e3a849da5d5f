//! LLM integration for SyncFlo.
//!
//! Draft generation and the assistant talk to an `LlmProvider`. Gemini is
//! reached through rig-core, and `RigAdapter` bridges rig's `CompletionModel`
//! trait to ours. Tests substitute stubs.

pub mod provider;
mod rig_adapter;

pub use provider::*;
pub use rig_adapter::RigAdapter;

use std::sync::Arc;

use rig::client::CompletionClient;
use secrecy::ExposeSecret;

use crate::config::LlmConfig;
use crate::error::LlmError;

/// Create an LLM provider from configuration.
pub fn create_provider(config: &LlmConfig) -> Result<Arc<dyn LlmProvider>, LlmError> {
    use rig::providers::gemini;

    let client: rig::client::Client<gemini::client::GeminiExt> = gemini::Client::builder()
        .api_key(config.api_key.expose_secret())
        .base_url(&config.base_url)
        .build()
        .map_err(|e| LlmError::RequestFailed {
            provider: "gemini".to_string(),
            reason: format!("Failed to create Gemini client: {}", e),
        })?;

    let model = client.completion_model(&config.model);
    tracing::info!("Using Gemini (model: {})", config.model);
    Ok(Arc::new(RigAdapter::new(model, &config.model, "gemini")))
}
