//! Forge configuration.
//!
//! Retry policy and generation settings, loaded from defaults and
//! environment variables and validated before use.

use std::time::Duration;

use crate::error::ConfigError;
use crate::forge::{LlmServiceConfig, RetryPolicy, DEFAULT_INITIAL_DELAY, DEFAULT_MAX_RETRIES};
use crate::llm::DEFAULT_MODEL;

/// Configuration for a forge run.
#[derive(Debug, Clone, PartialEq)]
pub struct ForgeConfig {
    // Retry settings
    /// Total attempts per capability call.
    pub max_retries: u32,
    /// Wait before the first retry; doubles after each further failure.
    pub initial_delay: Duration,

    // LLM settings
    /// Model used for every capability.
    pub model: String,
    /// Maximum tokens per response.
    pub max_tokens: u32,
    /// Statement-generation temperature used when the request does not set one.
    pub temperature: f64,
}

impl Default for ForgeConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            initial_delay: DEFAULT_INITIAL_DELAY,
            model: DEFAULT_MODEL.to_string(),
            max_tokens: 4096,
            temperature: 0.7,
        }
    }
}

impl ForgeConfig {
    /// Creates a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `FORGE_MAX_RETRIES`: Attempts per call (default: 3)
    /// - `FORGE_INITIAL_DELAY_MS`: First backoff wait in milliseconds (default: 2000)
    /// - `FORGE_MODEL`: Model identifier (default: google/gemini-2.0-flash-001)
    /// - `FORGE_MAX_TOKENS`: Maximum tokens per response (default: 4096)
    /// - `FORGE_TEMPERATURE`: Default statement temperature (default: 0.7)
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable cannot be parsed or the result is invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Creates configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(val) = lookup("FORGE_MAX_RETRIES") {
            config.max_retries = parse_env_value(&val, "FORGE_MAX_RETRIES")?;
        }

        if let Some(val) = lookup("FORGE_INITIAL_DELAY_MS") {
            let ms: u64 = parse_env_value(&val, "FORGE_INITIAL_DELAY_MS")?;
            config.initial_delay = Duration::from_millis(ms);
        }

        if let Some(val) = lookup("FORGE_MODEL") {
            config.model = val.trim().to_string();
        }

        if let Some(val) = lookup("FORGE_MAX_TOKENS") {
            config.max_tokens = parse_env_value(&val, "FORGE_MAX_TOKENS")?;
        }

        if let Some(val) = lookup("FORGE_TEMPERATURE") {
            config.temperature = parse_env_value(&val, "FORGE_TEMPERATURE")?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationFailed` if any values are invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_retries == 0 {
            return Err(ConfigError::ValidationFailed(
                "max_retries must be greater than 0".to_string(),
            ));
        }

        if self.model.trim().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "model cannot be empty".to_string(),
            ));
        }

        if self.max_tokens == 0 {
            return Err(ConfigError::ValidationFailed(
                "max_tokens must be greater than 0".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.temperature) {
            return Err(ConfigError::ValidationFailed(
                "temperature must be between 0.0 and 1.0".to_string(),
            ));
        }

        Ok(())
    }

    /// Retry policy for capability calls.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries, self.initial_delay)
    }

    /// Settings for the LLM-backed generation service.
    pub fn service_config(&self) -> LlmServiceConfig {
        LlmServiceConfig::new()
            .with_model(self.model.clone())
            .with_max_tokens(self.max_tokens)
    }

    /// Builder method to set the attempt budget.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Builder method to set the first backoff wait.
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Builder method to set the model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Builder method to set the response token limit.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Builder method to set the default temperature.
    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }
}

/// Parse an environment variable value into a type.
fn parse_env_value<T: std::str::FromStr>(value: &str, key: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("could not parse '{}'", value),
    })
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
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = ForgeConfig::default();
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.initial_delay, Duration::from_millis(2000));
        assert_eq!(config.model, DEFAULT_MODEL);
        assert_eq!(config.max_tokens, 4096);
        assert!((config.temperature - 0.7).abs() < f64::EPSILON);
        assert!(config.validate().is_ok());
        assert_eq!(config.retry_policy(), RetryPolicy::default());
    }

    #[test]
    fn test_from_lookup_overrides() {
        let config = ForgeConfig::from_lookup(lookup(&[
            ("FORGE_MAX_RETRIES", "5"),
            ("FORGE_INITIAL_DELAY_MS", " 250 "),
            ("FORGE_MODEL", "openai/gpt-4o"),
            ("FORGE_MAX_TOKENS", "8192"),
            ("FORGE_TEMPERATURE", "0.2"),
        ]))
        .expect("valid config");

        assert_eq!(config.max_retries, 5);
        assert_eq!(config.initial_delay, Duration::from_millis(250));
        assert_eq!(config.model, "openai/gpt-4o");
        assert_eq!(config.max_tokens, 8192);
        assert_eq!(config.service_config().model, "openai/gpt-4o");
        assert_eq!(config.service_config().max_tokens, 8192);

        let policy = config.retry_policy();
        assert_eq!(policy.max_retries(), 5);
        assert_eq!(policy.initial_delay(), Duration::from_millis(250));
    }

    #[test]
    fn test_from_lookup_empty_uses_defaults() {
        let config = ForgeConfig::from_lookup(|_| None).expect("defaults are valid");
        assert_eq!(config, ForgeConfig::default());
    }

    #[test]
    fn test_unparseable_value() {
        let err = ForgeConfig::from_lookup(lookup(&[("FORGE_MAX_RETRIES", "three")]))
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue { ref key, .. } if key == "FORGE_MAX_RETRIES"
        ));
    }

    #[test]
    fn test_validation_rejects_zero_retries() {
        let err = ForgeConfig::from_lookup(lookup(&[("FORGE_MAX_RETRIES", "0")])).unwrap_err();
        assert!(err.to_string().contains("max_retries"));
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let result = ForgeConfig::default().with_temperature(1.5).validate();
        assert!(result.unwrap_err().to_string().contains("temperature"));

        let result = ForgeConfig::default().with_model("  ").validate();
        assert!(result.unwrap_err().to_string().contains("model"));

        let result = ForgeConfig::default().with_max_tokens(0).validate();
        assert!(result.unwrap_err().to_string().contains("max_tokens"));
    }

    #[test]
    fn test_builder() {
        let config = ForgeConfig::new()
            .with_max_retries(4)
            .with_initial_delay(Duration::from_secs(1))
            .with_model("m")
            .with_max_tokens(10)
            .with_temperature(0.0);
        assert!(config.validate().is_ok());
        assert_eq!(config.retry_policy().backoff_schedule().len(), 3);
    }
}
