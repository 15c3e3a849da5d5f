//! Configuration types.
//!
//! Everything is read from the environment with typed defaults; only the
//! Gemini API key is mandatory.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;

/// Published spreadsheet the dashboard reads when no URL is configured.
pub const DEFAULT_FEED_URL: &str = "https://docs.google.com/spreadsheets/d/e/2PACX-1vSUAnIOlKL3bZBeFw_FwAxjAjjaa7SlESBPzJGLs3ShXfPsHlhMh9eNrsMpiBzMfwRFMOoMv-CQADnO/pub?output=csv";

/// Default text-generation model.
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Default Gemini REST endpoint.
pub const DEFAULT_LLM_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// CSV feed settings.
#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// URL of the published CSV export.
    pub url: String,
    /// Interval between scheduled ingestion cycles.
    pub refresh_interval: Duration,
    /// Per-request timeout for the CSV fetch.
    pub fetch_timeout: Duration,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_FEED_URL.to_string(),
            refresh_interval: Duration::from_secs(60),
            fetch_timeout: Duration::from_secs(30),
        }
    }
}

impl FeedConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let url = std::env::var("SYNCFLO_FEED_URL").unwrap_or(defaults.url);
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(ConfigError::InvalidValue {
                key: "SYNCFLO_FEED_URL".into(),
                message: format!("expected an http(s) URL, got {url:?}"),
            });
        }

        let refresh_interval =
            secs_from_env("SYNCFLO_REFRESH_SECS")?.unwrap_or(defaults.refresh_interval);
        let fetch_timeout =
            secs_from_env("SYNCFLO_FETCH_TIMEOUT_SECS")?.unwrap_or(defaults.fetch_timeout);

        Ok(Self {
            url,
            refresh_interval,
            fetch_timeout,
        })
    }
}

/// Text-generation provider settings.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: SecretString,
    pub model: String,
    pub base_url: String,
}

impl LlmConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_key = std::env::var("GEMINI_API_KEY")
            .map_err(|_| ConfigError::MissingEnvVar("GEMINI_API_KEY".into()))?;

        let model = std::env::var("SYNCFLO_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        let base_url = std::env::var("SYNCFLO_LLM_BASE_URL")
            .unwrap_or_else(|_| DEFAULT_LLM_BASE_URL.to_string());

        Ok(Self {
            api_key: SecretString::from(api_key),
            model,
            base_url,
        })
    }
}

/// HTTP server settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    /// Where assistant chat history is kept. `None` keeps it in memory only.
    pub history_path: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            history_path: None,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let port = match std::env::var("SYNCFLO_PORT") {
            Ok(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue {
                key: "SYNCFLO_PORT".into(),
                message: format!("not a port number: {raw:?}"),
            })?,
            Err(_) => Self::default().port,
        };

        let history_path = std::env::var("SYNCFLO_HISTORY_PATH")
            .ok()
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from);

        Ok(Self { port, history_path })
    }
}

/// Complete service configuration.
#[derive(Debug, Clone)]
pub struct DashboardConfig {
    pub feed: FeedConfig,
    pub llm: LlmConfig,
    pub server: ServerConfig,
}

impl DashboardConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            feed: FeedConfig::from_env()?,
            llm: LlmConfig::from_env()?,
            server: ServerConfig::from_env()?,
        })
    }
}

fn secs_from_env(key: &str) -> Result<Option<Duration>, ConfigError> {
    let Ok(raw) = std::env::var(key) else {
        return Ok(None);
    };
    match raw.trim().parse::<u64>() {
        Ok(0) => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: "must be at least 1 second".into(),
        }),
        Ok(secs) => Ok(Some(Duration::from_secs(secs))),
        Err(_) => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("not a number of seconds: {raw:?}"),
        }),
    }
}
