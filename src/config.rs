//! Session configuration
//!
//! Loaded from YAML; every field has a default so an empty file is valid.

use crate::reference::SimilarityRange;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Environment variables consulted for the assistant API key, in order
pub const API_KEY_ENV_VARS: [&str; 2] = ["AUTHGRAPH_API_KEY", "DEEPSEEK_API_KEY"];

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// LLM providers the assistant client can talk to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LLMProvider {
    OpenAI,
    DeepSeek,
    Ollama,
    Gemini,
}

impl LLMProvider {
    pub fn default_base_url(&self) -> &'static str {
        match self {
            LLMProvider::OpenAI => "https://api.openai.com/v1",
            LLMProvider::DeepSeek => "https://api.deepseek.com",
            LLMProvider::Ollama => "http://localhost:11434",
            LLMProvider::Gemini => "https://generativelanguage.googleapis.com/v1beta",
        }
    }

    pub fn requires_api_key(&self) -> bool {
        !matches!(self, LLMProvider::Ollama)
    }
}

/// Configuration for the hosted assistant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NLQConfig {
    /// Enabled status
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// The LLM provider to use
    pub provider: LLMProvider,
    /// Model name (e.g., "deepseek-chat", "llama3")
    pub model: String,
    /// API Key (optional, can be loaded from env if None)
    #[serde(default)]
    pub api_key: Option<String>,
    /// API Base URL (defaults per provider)
    #[serde(default)]
    pub api_base_url: Option<String>,
    /// System prompt for the LLM
    #[serde(default)]
    pub system_prompt: Option<String>,
}

fn default_true() -> bool {
    true
}

impl NLQConfig {
    pub fn deepseek() -> Self {
        NLQConfig {
            enabled: true,
            provider: LLMProvider::DeepSeek,
            model: "deepseek-chat".to_string(),
            api_key: None,
            api_base_url: None,
            system_prompt: None,
        }
    }
}

/// Tunables for an `AuthSession`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Classifier results at or below this confidence fall back to keywords
    pub confidence_threshold: f64,
    /// Ledger capacity
    pub history_capacity: usize,
    /// Default segment similarity window
    pub similarity_range: SimilarityRange,
    /// Bound on each assistant call, in seconds
    pub request_timeout_secs: u64,
    /// Hosted assistant; `None` runs offline
    pub nlq: Option<NLQConfig>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.2,
            history_capacity: 5,
            similarity_range: SimilarityRange::default(),
            request_timeout_secs: 60,
            nlq: None,
        }
    }
}

impl SessionConfig {
    pub fn from_yaml_str(text: &str) -> ConfigResult<Self> {
        let config: SessionConfig = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }

    /// Fill a missing assistant API key from the environment
    pub fn apply_env(&mut self) {
        if let Some(nlq) = self.nlq.as_mut() {
            if nlq.api_key.is_none() {
                nlq.api_key = API_KEY_ENV_VARS
                    .iter()
                    .find_map(|var| std::env::var(var).ok().filter(|v| !v.is_empty()));
            }
        }
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(ConfigError::Invalid(format!(
                "confidence_threshold must be within [0, 1], got {}",
                self.confidence_threshold
            )));
        }
        if self.history_capacity == 0 {
            return Err(ConfigError::Invalid(
                "history_capacity must be at least 1".to_string(),
            ));
        }
        let range = self.similarity_range;
        if !range.is_well_formed() {
            return Err(ConfigError::Invalid(format!(
                "similarity_range must be finite with min <= max, got {}-{}",
                range.min, range.max
            )));
        }
        if let Some(nlq) = &self.nlq {
            if nlq.model.trim().is_empty() {
                return Err(ConfigError::Invalid("nlq.model must not be empty".to_string()));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.confidence_threshold, 0.2);
        assert_eq!(config.history_capacity, 5);
        assert_eq!(config.similarity_range, SimilarityRange::new(0.8, 1.0));
        assert!(config.nlq.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_yaml() {
        let yaml = r#"
confidence_threshold: 0.35
history_capacity: 3
similarity_range:
  min: 0.7
  max: 0.95
nlq:
  provider: deepseek
  model: deepseek-chat
"#;
        let config = SessionConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.confidence_threshold, 0.35);
        assert_eq!(config.history_capacity, 3);
        assert_eq!(config.request_timeout_secs, 60);
        let nlq = config.nlq.unwrap();
        assert_eq!(nlq.provider, LLMProvider::DeepSeek);
        assert!(nlq.enabled);
    }

    #[test]
    fn test_empty_yaml_uses_defaults() {
        let config = SessionConfig::from_yaml_str("{}").unwrap();
        assert_eq!(config, SessionConfig::default());
    }

    #[test]
    fn test_validation() {
        assert!(matches!(
            SessionConfig::from_yaml_str("confidence_threshold: 1.5"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            SessionConfig::from_yaml_str("history_capacity: 0"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            SessionConfig::from_yaml_str("similarity_range: {min: 0.9, max: 0.5}"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            SessionConfig::from_yaml_str("similarity_range: {min: .nan, max: 1.0}"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            SessionConfig::from_yaml_str("similarity_range: {min: 0.5, max: .inf}"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            SessionConfig::from_yaml_str("history_capacity: [1"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_apply_env_keeps_explicit_key() {
        let mut config = SessionConfig {
            nlq: Some(NLQConfig {
                api_key: Some("explicit".to_string()),
                ..NLQConfig::deepseek()
            }),
            ..SessionConfig::default()
        };
        config.apply_env();
        assert_eq!(config.nlq.unwrap().api_key.as_deref(), Some("explicit"));
    }
}
