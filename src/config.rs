//! Startup configuration read from the process environment.
//!
//! # Environment variables
//!
//! Provider:
//! - `LLM_PROVIDER`     = `gemini` (default), `openai` or `grok`
//! - `GEMINI_API_KEY` / `OPENAI_API_KEY` / `GROK_API_KEY` (`XAI_API_KEY` fallback)
//! - `LLM_MODEL`, `LLM_BASE_URL`, `LLM_TIMEOUT_SECS` (optional)
//!
//! History (optional, first match wins):
//! - `SUPABASE_URL` + `SUPABASE_KEY`
//! - `HISTORY_DB_PATH`
//!
//! Session:
//! - `IDENTITY_GATE`, `USER_EMAIL`, `WELCOME_TEXT`, `BULLET_RESPONSES`
//!
//! Logging:
//! - `LOG_FORMAT` (`json` or text), `APP_ENV`

use std::path::PathBuf;

use crate::db::HistoryTarget;
use crate::llm::{LlmError, ProviderConfig, ProviderKind};
use crate::session::SessionOptions;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingVar(&'static str),
    #[error("invalid number in {var}: {reason}")]
    InvalidNumber {
        var: &'static str,
        reason: &'static str,
    },
    #[error("invalid boolean in {0}: expected true/false")]
    InvalidBool(&'static str),
    #[error(transparent)]
    Provider(#[from] LlmError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    pub environment: String,
    pub json_format: bool,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub provider: ProviderConfig,
    pub history: Option<HistoryTarget>,
    pub session: SessionOptions,
    pub user_email: Option<String>,
    pub log: LogConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(lookup);

        let kind: ProviderKind = env
            .get("LLM_PROVIDER")
            .as_deref()
            .unwrap_or("gemini")
            .parse()?;

        let api_key = match kind {
            ProviderKind::Gemini => env.must("GEMINI_API_KEY")?,
            ProviderKind::OpenAi => env.must("OPENAI_API_KEY")?,
            ProviderKind::Grok => env
                .get("GROK_API_KEY")
                .or_else(|| env.get("XAI_API_KEY"))
                .ok_or(ConfigError::MissingVar("GROK_API_KEY or XAI_API_KEY"))?,
        };

        let provider = ProviderConfig {
            kind,
            api_key,
            model: env.get("LLM_MODEL"),
            base_url: env.get("LLM_BASE_URL"),
            timeout_secs: env.opt_u64("LLM_TIMEOUT_SECS")?,
        };

        let history = match (env.get("SUPABASE_URL"), env.get("SUPABASE_KEY")) {
            (Some(url), Some(key)) => Some(HistoryTarget::Supabase { url, key }),
            _ => env.get("HISTORY_DB_PATH").map(|p| HistoryTarget::Sqlite(PathBuf::from(p))),
        };

        let mut session = SessionOptions {
            identity_gate: env.opt_bool("IDENTITY_GATE")?.unwrap_or(false),
            bullet_responses: env.opt_bool("BULLET_RESPONSES")?.unwrap_or(false),
            ..SessionOptions::default()
        };
        if let Some(welcome) = env.get("WELCOME_TEXT") {
            session.welcome_text = welcome;
        }

        let log = LogConfig {
            environment: env.get("APP_ENV").unwrap_or_else(|| "development".to_string()),
            json_format: env
                .get("LOG_FORMAT")
                .is_some_and(|v| v.eq_ignore_ascii_case("json")),
        };

        Ok(Self {
            provider,
            history,
            session,
            user_email: env.get("USER_EMAIL"),
            log,
        })
    }
}

struct Env<F>(F);

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    /// Non-empty value or `None`.
    fn get(&self, name: &str) -> Option<String> {
        (self.0)(name).filter(|v| !v.trim().is_empty())
    }

    fn must(&self, name: &'static str) -> Result<String, ConfigError> {
        self.get(name).ok_or(ConfigError::MissingVar(name))
    }

    fn opt_u64(&self, name: &'static str) -> Result<Option<u64>, ConfigError> {
        self.get(name)
            .map(|v| {
                v.trim().parse::<u64>().map_err(|_| ConfigError::InvalidNumber {
                    var: name,
                    reason: "expected u64",
                })
            })
            .transpose()
    }

    fn opt_bool(&self, name: &'static str) -> Result<Option<bool>, ConfigError> {
        self.get(name)
            .map(|v| match v.trim().to_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => Ok(true),
                "0" | "false" | "no" | "off" => Ok(false),
                _ => Err(ConfigError::InvalidBool(name)),
            })
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|name| map.get(name).cloned())
    }

    #[test]
    fn test_defaults_to_gemini() {
        let cfg = config(&[("GEMINI_API_KEY", "g-key")]).unwrap();
        assert_eq!(cfg.provider.kind, ProviderKind::Gemini);
        assert_eq!(cfg.provider.api_key, "g-key");
        assert_eq!(cfg.provider.timeout_secs, None);
        assert_eq!(cfg.history, None);
        assert!(!cfg.session.identity_gate);
        assert!(!cfg.log.json_format);
    }

    #[test]
    fn test_unknown_provider_is_rejected() {
        let err = config(&[("LLM_PROVIDER", "mistral")]).unwrap_err();
        assert!(matches!(err, ConfigError::Provider(LlmError::UnsupportedProvider(_))));
    }

    #[test]
    fn test_missing_credential_is_rejected() {
        let err = config(&[("LLM_PROVIDER", "openai"), ("OPENAI_API_KEY", " ")]).unwrap_err();
        assert!(matches!(err, ConfigError::MissingVar("OPENAI_API_KEY")));
    }

    #[test]
    fn test_grok_falls_back_to_xai_key() {
        let cfg = config(&[("LLM_PROVIDER", "grok"), ("XAI_API_KEY", "xai")]).unwrap();
        assert_eq!(cfg.provider.kind, ProviderKind::Grok);
        assert_eq!(cfg.provider.api_key, "xai");
    }

    #[test]
    fn test_supabase_needs_both_values() {
        let cfg = config(&[
            ("GEMINI_API_KEY", "k"),
            ("SUPABASE_URL", "https://x.supabase.co"),
            ("HISTORY_DB_PATH", "/tmp/h.db"),
        ])
        .unwrap();
        assert_eq!(cfg.history, Some(HistoryTarget::Sqlite(PathBuf::from("/tmp/h.db"))));

        let cfg = config(&[
            ("GEMINI_API_KEY", "k"),
            ("SUPABASE_URL", "https://x.supabase.co"),
            ("SUPABASE_KEY", "anon"),
        ])
        .unwrap();
        assert_eq!(
            cfg.history,
            Some(HistoryTarget::Supabase {
                url: "https://x.supabase.co".into(),
                key: "anon".into()
            })
        );
    }

    #[test]
    fn test_session_and_log_options() {
        let cfg = config(&[
            ("GEMINI_API_KEY", "k"),
            ("IDENTITY_GATE", "true"),
            ("BULLET_RESPONSES", "0"),
            ("WELCOME_TEXT", "Hello accountant"),
            ("USER_EMAIL", "me@firm.com"),
            ("LLM_TIMEOUT_SECS", "30"),
            ("LOG_FORMAT", "JSON"),
        ])
        .unwrap();
        assert!(cfg.session.identity_gate);
        assert!(!cfg.session.bullet_responses);
        assert_eq!(cfg.session.welcome_text, "Hello accountant");
        assert_eq!(cfg.user_email.as_deref(), Some("me@firm.com"));
        assert_eq!(cfg.provider.timeout_secs, Some(30));
        assert!(cfg.log.json_format);
    }

    #[test]
    fn test_bad_numbers_and_flags_are_rejected() {
        let err = config(&[("GEMINI_API_KEY", "k"), ("LLM_TIMEOUT_SECS", "soon")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidNumber { var: "LLM_TIMEOUT_SECS", .. }));

        let err = config(&[("GEMINI_API_KEY", "k"), ("IDENTITY_GATE", "maybe")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidBool("IDENTITY_GATE")));
    }
}
