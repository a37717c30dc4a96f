use crate::error::{Result, TaxEngineError};
use serde::{Deserialize, Serialize};
use std::env;

pub const OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";
pub const DEFAULT_MODEL: &str = "anthropic/claude-3.5-haiku";
pub const DEFAULT_MAX_TOKENS: u32 = 1_500;
pub const DEFAULT_TEMPERATURE: f32 = 0.3;

/// Settings for the chat completion API.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LlmConfig {
    #[serde(skip_serializing, default)]
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    /// USD per million prompt tokens, used for the cost estimate.
    pub prompt_price_per_million: f64,
    pub completion_price_per_million: f64,
}

impl LlmConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: OPENROUTER_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
            prompt_price_per_million: 0.80,
            completion_price_per_million: 4.00,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Reads `OPENROUTER_API_KEY` (required) and the optional
    /// `OPENROUTER_BASE_URL`, `OPENROUTER_MODEL`, `OPENROUTER_MAX_TOKENS` and
    /// `OPENROUTER_TEMPERATURE`.
    pub fn from_env() -> Result<Self> {
        let api_key = env::var("OPENROUTER_API_KEY")
            .map_err(|_| TaxEngineError::MissingConfig("OPENROUTER_API_KEY".to_string()))?;

        let mut config = Self::new(api_key);
        if let Ok(base_url) = env::var("OPENROUTER_BASE_URL") {
            config.base_url = base_url;
        }
        if let Ok(model) = env::var("OPENROUTER_MODEL") {
            config.model = model;
        }
        if let Ok(raw) = env::var("OPENROUTER_MAX_TOKENS") {
            config.max_tokens = parse_var("OPENROUTER_MAX_TOKENS", &raw)?;
        }
        if let Ok(raw) = env::var("OPENROUTER_TEMPERATURE") {
            config.temperature = parse_var("OPENROUTER_TEMPERATURE", &raw)?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.api_key.trim().is_empty() {
            return Err(TaxEngineError::MissingConfig("api_key".to_string()));
        }
        if self.model.trim().is_empty() {
            return Err(TaxEngineError::InvalidConfig {
                key: "model".to_string(),
                details: "must not be empty".to_string(),
            });
        }
        if self.max_tokens == 0 {
            return Err(TaxEngineError::InvalidConfig {
                key: "max_tokens".to_string(),
                details: "must be greater than zero".to_string(),
            });
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(TaxEngineError::InvalidConfig {
                key: "temperature".to_string(),
                details: format!("{} is outside 0.0-2.0", self.temperature),
            });
        }
        Ok(())
    }

    pub fn chat_completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }

    pub fn estimate_cost(&self, prompt_tokens: u32, completion_tokens: u32) -> f64 {
        (f64::from(prompt_tokens) * self.prompt_price_per_million
            + f64::from(completion_tokens) * self.completion_price_per_million)
            / 1_000_000.0
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| TaxEngineError::InvalidConfig {
        key: key.to_string(),
        details: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = LlmConfig::new("sk-test");
        assert!(config.validate().is_ok());
        assert_eq!(
            config.chat_completions_url(),
            "https://openrouter.ai/api/v1/chat/completions"
        );
    }

    #[test]
    fn test_validation_errors() {
        assert!(LlmConfig::new("  ").validate().is_err());

        let mut config = LlmConfig::new("sk-test");
        config.temperature = 3.5;
        assert!(matches!(
            config.validate(),
            Err(TaxEngineError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn test_parse_var_reports_key() {
        let err = parse_var::<u32>("OPENROUTER_MAX_TOKENS", "lots").unwrap_err();
        assert!(err.to_string().contains("OPENROUTER_MAX_TOKENS"));
    }

    #[test]
    fn test_cost_estimate() {
        let config = LlmConfig::new("sk-test");
        let cost = config.estimate_cost(1_000_000, 500_000);
        assert!((cost - 2.80).abs() < 1e-9);
    }

    #[test]
    fn test_api_key_not_serialized() {
        let json = serde_json::to_string(&LlmConfig::new("sk-secret")).unwrap();
        assert!(!json.contains("sk-secret"));
    }
}
