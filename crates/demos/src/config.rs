use parley_core::llm_client::{Endpoint, LLMClient, OpenAICompatibleClient};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Defines the supported backend providers for the language model.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Provider {
    OpenAI,
    Gemini,
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub data_dir: PathBuf,
    pub content_dir: PathBuf,
    pub fraud_db_path: PathBuf,
    pub provider: Provider,
    pub openai_api_key: Option<String>,
    pub gemini_api_key: Option<String>,
    pub chat_model: String,
    pub log_level: Level,
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let bind_address_str =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
        let bind_address = bind_address_str
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string()))?;

        let data_dir = std::env::var("PARLEY_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./data"));
        let content_dir = std::env::var("PARLEY_CONTENT_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./content"));
        let fraud_db_path = std::env::var("FRAUD_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_dir.join("fraud.db"));

        let provider_str = std::env::var("LLM_PROVIDER").unwrap_or_else(|_| "openai".to_string());
        let provider = match provider_str.to_lowercase().as_str() {
            "openai" => Provider::OpenAI,
            "gemini" => Provider::Gemini,
            other => {
                return Err(ConfigError::InvalidValue(
                    "LLM_PROVIDER".to_string(),
                    format!("'{}' is not a supported provider", other),
                ));
            }
        };

        let openai_api_key = std::env::var("OPENAI_API_KEY").ok();
        let gemini_api_key = std::env::var("GEMINI_API_KEY").ok();

        let chat_model = std::env::var("CHAT_MODEL").unwrap_or_else(|_| "gpt-4o".to_string());

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        Ok(Self {
            bind_address,
            data_dir,
            content_dir,
            fraud_db_path,
            provider,
            openai_api_key,
            gemini_api_key,
            chat_model,
            log_level,
        })
    }

    /// Builds the model client for the configured provider.
    ///
    /// Scripted demos never call this, so a missing key only matters once a
    /// tool-calling demo is started.
    pub fn llm_client(&self) -> Result<Arc<dyn LLMClient>, ConfigError> {
        let (endpoint, key, var) = match self.provider {
            Provider::OpenAI => (Endpoint::OpenAI, &self.openai_api_key, "OPENAI_API_KEY"),
            Provider::Gemini => (Endpoint::Gemini, &self.gemini_api_key, "GEMINI_API_KEY"),
        };
        let key = key.as_deref().ok_or_else(|| {
            ConfigError::MissingVar(format!(
                "{} must be set for '{}' provider",
                var,
                format!("{:?}", self.provider).to_lowercase()
            ))
        })?;
        Ok(Arc::new(OpenAICompatibleClient::new(
            endpoint.config(key),
            self.chat_model.clone(),
        )))
    }
}
