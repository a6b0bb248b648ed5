pub mod client;
pub mod gemini;
pub mod openai;

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::doc_processor::UploadedDocument;

pub use client::LlmClient;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Which hosted backend answers the questions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    /// Google Gemini `generateContent`.
    Gemini,
    /// OpenAI chat completions.
    OpenAi,
    /// xAI Grok, OpenAI-compatible chat completions.
    Grok,
}

impl ProviderKind {
    pub fn default_model(&self) -> &'static str {
        match self {
            ProviderKind::Gemini => "gemini-2.0-flash",
            ProviderKind::OpenAi => "gpt-3.5-turbo",
            ProviderKind::Grok => "grok-beta",
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            ProviderKind::Gemini => "https://generativelanguage.googleapis.com",
            ProviderKind::OpenAi => "https://api.openai.com/v1",
            ProviderKind::Grok => "https://api.x.ai/v1",
        }
    }
}

impl FromStr for ProviderKind {
    type Err = LlmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "gemini" => Ok(ProviderKind::Gemini),
            "openai" => Ok(ProviderKind::OpenAi),
            "grok" => Ok(ProviderKind::Grok),
            other => Err(LlmError::UnsupportedProvider(other.to_string())),
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProviderKind::Gemini => "gemini",
            ProviderKind::OpenAi => "openai",
            ProviderKind::Grok => "grok",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    pub api_key: String,
    pub model: Option<String>,
    /// Overrides [`ProviderKind::default_base_url`].
    pub base_url: Option<String>,
    pub timeout_secs: Option<u64>,
}

impl ProviderConfig {
    pub fn new(kind: ProviderKind, api_key: impl Into<String>) -> Self {
        Self {
            kind,
            api_key: api_key.into(),
            model: None,
            base_url: None,
            timeout_secs: None,
        }
    }
}

pub const TEMPERATURE: f32 = 0.7;
pub const GROK_MAX_TOKENS: u32 = 5000;

/// Unified LLM provider enum; dispatches to the Gemini or OpenAI-compatible backends.
#[derive(Debug, Clone)]
pub enum Provider {
    Gemini(gemini::GeminiConfig),
    OpenAi(openai::OpenAiConfig),
    Grok(openai::OpenAiConfig),
}

impl Provider {
    pub fn from_config(config: &ProviderConfig) -> Result<Self, LlmError> {
        if config.api_key.trim().is_empty() {
            return Err(LlmError::MissingApiKey(config.kind));
        }

        let mut builder = Client::builder();
        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder.build()?;

        let model = config
            .model
            .clone()
            .unwrap_or_else(|| config.kind.default_model().to_string());
        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| config.kind.default_base_url().to_string())
            .trim_end_matches('/')
            .to_string();

        Ok(match config.kind {
            ProviderKind::Gemini => Provider::Gemini(gemini::GeminiConfig {
                client,
                api_key: config.api_key.clone(),
                base_url,
                model,
            }),
            ProviderKind::OpenAi => Provider::OpenAi(openai::OpenAiConfig {
                client,
                api_key: config.api_key.clone(),
                base_url,
                model,
                temperature: TEMPERATURE,
                max_tokens: None,
            }),
            ProviderKind::Grok => Provider::Grok(openai::OpenAiConfig {
                client,
                api_key: config.api_key.clone(),
                base_url,
                model,
                temperature: TEMPERATURE,
                max_tokens: Some(GROK_MAX_TOKENS),
            }),
        })
    }

    pub fn kind(&self) -> ProviderKind {
        match self {
            Provider::Gemini(_) => ProviderKind::Gemini,
            Provider::OpenAi(_) => ProviderKind::OpenAi,
            Provider::Grok(_) => ProviderKind::Grok,
        }
    }

    pub fn model(&self) -> &str {
        match self {
            Provider::Gemini(config) => &config.model,
            Provider::OpenAi(config) | Provider::Grok(config) => &config.model,
        }
    }

    pub async fn chat(&self, messages: &[ChatMessage]) -> Result<String, LlmError> {
        match self {
            Provider::Gemini(config) => gemini::generate(config, messages).await,
            Provider::OpenAi(config) | Provider::Grok(config) => {
                openai::chat(config, messages).await
            }
        }
    }
}

/// Anything that can turn a conversation into a displayable answer.
///
/// Implementations must not fail: errors come back as text.
#[async_trait]
pub trait Responder: Send + Sync {
    async fn generate(
        &self,
        messages: &[ChatMessage],
        document: Option<&UploadedDocument>,
        identity: Option<&str>,
    ) -> String;
}

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Unsupported LLM provider: {0}")]
    UnsupportedProvider(String),
    #[error("missing API key for provider {0}")]
    MissingApiKey(ProviderKind),
    #[error("conversation has no user message")]
    NoQuery,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_kind_parses_case_insensitive() {
        assert_eq!("Gemini".parse::<ProviderKind>().unwrap(), ProviderKind::Gemini);
        assert_eq!(" openai ".parse::<ProviderKind>().unwrap(), ProviderKind::OpenAi);
        assert_eq!("GROK".parse::<ProviderKind>().unwrap(), ProviderKind::Grok);
    }

    #[test]
    fn test_unknown_provider_fails_fast() {
        let err = "claude".parse::<ProviderKind>().unwrap_err();
        assert!(matches!(err, LlmError::UnsupportedProvider(ref p) if p == "claude"));
        assert_eq!(err.to_string(), "Unsupported LLM provider: claude");
    }

    #[test]
    fn test_missing_key_is_config_error() {
        let err = Provider::from_config(&ProviderConfig::new(ProviderKind::OpenAi, "  ")).unwrap_err();
        assert!(matches!(err, LlmError::MissingApiKey(ProviderKind::OpenAi)));
    }

    #[test]
    fn test_grok_gets_bounded_output_and_defaults() {
        let provider = Provider::from_config(&ProviderConfig::new(ProviderKind::Grok, "xai-key")).unwrap();
        match provider {
            Provider::Grok(ref config) => {
                assert_eq!(config.max_tokens, Some(GROK_MAX_TOKENS));
                assert_eq!(config.temperature, TEMPERATURE);
                assert_eq!(config.base_url, "https://api.x.ai/v1");
            }
            other => panic!("unexpected provider {:?}", other.kind()),
        }
        assert_eq!(provider.model(), "grok-beta");
    }

    #[test]
    fn test_overrides_are_applied() {
        let mut config = ProviderConfig::new(ProviderKind::OpenAi, "sk-test");
        config.model = Some("gpt-4o-mini".into());
        config.base_url = Some("http://localhost:8080/v1/".into());

        let provider = Provider::from_config(&config).unwrap();
        match provider {
            Provider::OpenAi(ref c) => {
                assert_eq!(c.base_url, "http://localhost:8080/v1");
                assert_eq!(c.max_tokens, None);
            }
            other => panic!("unexpected provider {:?}", other.kind()),
        }
        assert_eq!(provider.model(), "gpt-4o-mini");
    }
}
