//! Configuration management for the task extractor.
//!
//! Configuration can be set via environment variables:
//! - `HYPERCLOVA_API_KEY` - Optional. Without it every extraction uses the offline fallback.
//! - `CLOVA_API_BASE_URL` - Optional. Defaults to `https://clovastudio.stream.ntruss.com`.
//! - `CLOVA_FAST_MODEL` - Optional. Schema-constrained model. Defaults to `HCX-005`.
//! - `CLOVA_REASONING_MODEL` - Optional. Thinking model. Defaults to `HCX-007`.
//! - `LLM_TIMEOUT_SECS` - Optional. Per-call deadline. Defaults to `60`.
//! - `LLM_MAX_TOKENS` - Optional. Output token budget. Defaults to `4096`.
//! - `LLM_THINKING_EFFORT` - Optional. `none`, `low`, `medium` or `high`. Defaults to `low`.
//! - `JSON_REPAIR_MAX_ATTEMPTS` - Optional. Validation attempts. Defaults to `3`.

use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::llm::ThinkingEffort;

pub const DEFAULT_BASE_URL: &str = "https://clovastudio.stream.ntruss.com";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Extractor configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Model credential; `None` means offline
    pub api_key: Option<String>,

    /// API origin, without the `/v3/...` path
    pub base_url: String,

    /// Model used for schema-constrained repair calls
    pub fast_model: String,

    /// Model used for the initial extraction
    pub reasoning_model: String,

    /// Deadline for one model call, retries included
    pub timeout: Duration,

    /// Output token budget per call
    pub max_tokens: u32,

    /// Thinking effort for the reasoning model
    pub thinking_effort: ThinkingEffort,

    /// Parse attempts in the JSON repair loop
    pub max_repair_attempts: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            fast_model: "HCX-005".to_string(),
            reasoning_model: "HCX-007".to_string(),
            timeout: Duration::from_secs(60),
            max_tokens: 4096,
            thinking_effort: ThinkingEffort::Low,
            max_repair_attempts: 3,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if a numeric or enum variable does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let api_key = lookup("HYPERCLOVA_API_KEY")
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty());

        let base_url = lookup("CLOVA_API_BASE_URL").unwrap_or(defaults.base_url);
        let fast_model = lookup("CLOVA_FAST_MODEL").unwrap_or(defaults.fast_model);
        let reasoning_model = lookup("CLOVA_REASONING_MODEL").unwrap_or(defaults.reasoning_model);

        let timeout_secs: u64 = parse_var(&lookup, "LLM_TIMEOUT_SECS", 60)?;
        if timeout_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "LLM_TIMEOUT_SECS".to_string(),
                "must be at least 1".to_string(),
            ));
        }

        let max_tokens = parse_var(&lookup, "LLM_MAX_TOKENS", defaults.max_tokens)?;
        let thinking_effort =
            parse_var(&lookup, "LLM_THINKING_EFFORT", defaults.thinking_effort)?;

        let max_repair_attempts =
            parse_var(&lookup, "JSON_REPAIR_MAX_ATTEMPTS", defaults.max_repair_attempts)?;
        if max_repair_attempts == 0 {
            return Err(ConfigError::InvalidValue(
                "JSON_REPAIR_MAX_ATTEMPTS".to_string(),
                "must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            api_key,
            base_url,
            fast_model,
            reasoning_model,
            timeout: Duration::from_secs(timeout_secs),
            max_tokens,
            thinking_effort,
            max_repair_attempts,
        })
    }

    /// Create a config with an API key and default values (useful for testing).
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: Some(api_key.into()),
            ..Self::default()
        }
    }

    /// Whether a model credential is available.
    pub fn is_online(&self) -> bool {
        self.api_key.is_some()
    }
}

fn parse_var<F, T>(lookup: &F, name: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e: T::Err| ConfigError::InvalidValue(name.to_string(), e.to_string())),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn defaults_without_variables() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert!(!config.is_online());
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.fast_model, "HCX-005");
        assert_eq!(config.reasoning_model, "HCX-007");
        assert_eq!(config.timeout, Duration::from_secs(60));
        assert_eq!(config.max_tokens, 4096);
        assert_eq!(config.thinking_effort, ThinkingEffort::Low);
        assert_eq!(config.max_repair_attempts, 3);
    }

    #[test]
    fn reads_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("HYPERCLOVA_API_KEY", " nv-123 "),
            ("CLOVA_API_BASE_URL", "http://localhost:9000"),
            ("LLM_TIMEOUT_SECS", "5"),
            ("LLM_THINKING_EFFORT", "MEDIUM"),
            ("JSON_REPAIR_MAX_ATTEMPTS", "5"),
        ]))
        .unwrap();

        assert_eq!(config.api_key.as_deref(), Some("nv-123"));
        assert_eq!(config.base_url, "http://localhost:9000");
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.thinking_effort, ThinkingEffort::Medium);
        assert_eq!(config.max_repair_attempts, 5);
    }

    #[test]
    fn blank_api_key_means_offline() {
        let config = Config::from_lookup(lookup(&[("HYPERCLOVA_API_KEY", "   ")])).unwrap();
        assert!(!config.is_online());
    }

    #[test]
    fn rejects_invalid_numbers() {
        let err = Config::from_lookup(lookup(&[("LLM_MAX_TOKENS", "lots")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(ref name, _) if name == "LLM_MAX_TOKENS"));

        let err = Config::from_lookup(lookup(&[("JSON_REPAIR_MAX_ATTEMPTS", "0")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(..)));

        let err = Config::from_lookup(lookup(&[("LLM_THINKING_EFFORT", "max")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(..)));
    }
}
