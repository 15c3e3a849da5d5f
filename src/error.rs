//! Error types for SyncFlo.

/// Top-level error type for the service.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Feed error: {0}")]
    Feed(#[from] FeedError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Generation error: {0}")]
    Generation(#[from] GenerationError),

    #[error("Assistant error: {0}")]
    Assistant(#[from] AssistantError),

    #[error("History error: {0}")]
    History(#[from] HistoryError),

    #[error("Export error: {0}")]
    Export(#[from] ExportError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Failures of one ingestion cycle.
///
/// `Network` and `Transport` are both network errors; `Parse` means the body
/// arrived but was structurally broken. In every case the cycle is aborted and
/// whatever snapshot was served before stays in place.
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    #[error("Failed to fetch CSV: {status} {status_text}")]
    Network { status: u16, status_text: String },

    #[error("Failed to reach CSV source: {0}")]
    Transport(String),

    #[error("CSV parsing error: {0}")]
    Parse(String),
}

/// LLM provider errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Invalid request for {provider}: {reason}")]
    InvalidRequest { provider: String, reason: String },
}

/// Draft generation failures.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("Text generation call failed: {0}")]
    Llm(#[from] LlmError),

    #[error("Generated reply is not a JSON object: {0}")]
    Malformed(String),

    #[error("Generated reply is missing string field `{0}`")]
    MissingField(&'static str),
}

/// Assistant chat failures.
#[derive(Debug, thiserror::Error)]
pub enum AssistantError {
    #[error("Chat {0} not found")]
    ChatNotFound(String),

    #[error("Assistant call failed: {0}")]
    Llm(#[from] LlmError),

    #[error("Chat history error: {0}")]
    History(#[from] HistoryError),
}

/// Chat history persistence errors.
#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// CSV export errors.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("CSV export failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("CSV export produced invalid UTF-8")]
    Encoding,
}

/// Result type alias for the service.
pub type Result<T> = std::result::Result<T, Error>;
