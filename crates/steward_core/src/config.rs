//! Autopilot configuration.
//!
//! The configuration is owned by external storage (see [`crate::store`]) and
//! pushed into the monitor, orchestrator and LLM client through their
//! `update_config` methods.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// Hosted language-model provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    #[default]
    OpenAI,
    Anthropic,
    Gemini,
}

impl LlmProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAI => "openai",
            Self::Anthropic => "anthropic",
            Self::Gemini => "gemini",
        }
    }

    /// Environment variable consulted when no key is stored.
    pub fn env_key(&self) -> &'static str {
        match self {
            Self::OpenAI => "OPENAI_API_KEY",
            Self::Anthropic => "ANTHROPIC_API_KEY",
            Self::Gemini => "GEMINI_API_KEY",
        }
    }

    pub fn all() -> [LlmProvider; 3] {
        [Self::OpenAI, Self::Anthropic, Self::Gemini]
    }
}

impl fmt::Display for LlmProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for LlmProvider {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAI),
            "anthropic" | "claude" => Ok(Self::Anthropic),
            "gemini" | "google" => Ok(Self::Gemini),
            other => Err(CoreError::InvalidConfig(format!("unknown provider: {}", other))),
        }
    }
}

/// Stored API keys, one per provider.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiKeys {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub openai: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anthropic: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gemini: Option<String>,
}

impl ApiKeys {
    /// Non-empty key for `provider`, if any.
    pub fn get(&self, provider: LlmProvider) -> Option<&str> {
        let key = match provider {
            LlmProvider::OpenAI => self.openai.as_deref(),
            LlmProvider::Anthropic => self.anthropic.as_deref(),
            LlmProvider::Gemini => self.gemini.as_deref(),
        };
        key.filter(|k| !k.trim().is_empty())
    }

    pub fn set(&mut self, provider: LlmProvider, key: impl Into<String>) {
        let key = Some(key.into());
        match provider {
            LlmProvider::OpenAI => self.openai = key,
            LlmProvider::Anthropic => self.anthropic = key,
            LlmProvider::Gemini => self.gemini = key,
        }
    }
}

/// Project context scanning policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ContextConfig {
    /// Minutes a cached project snapshot stays valid
    pub cache_interval_minutes: u64,
    /// Run framework/language/build-system detection
    pub enable_framework_detection: bool,
    /// Collect git status
    pub enable_git_integration: bool,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            cache_interval_minutes: 5,
            enable_framework_detection: true,
            enable_git_integration: true,
        }
    }
}

/// Tunable autopilot policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AutopilotConfig {
    pub enabled: bool,
    pub provider: LlmProvider,
    /// Model id; `None` means the provider's default model
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub max_guidances_per_hour: u32,
    pub analysis_delay_ms: u64,
    /// Minimum LLM confidence required before its verdict may intervene
    pub intervention_threshold: f64,
    /// Custom guidance text appended to LLM prompts
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guide_prompt: Option<String>,
    pub api_keys: ApiKeys,
    /// Number of recent output lines handed to each analysis
    pub output_lines: usize,
    pub request_timeout_secs: u64,
    pub max_retries: u32,
    pub context: ContextConfig,
}

impl Default for AutopilotConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            provider: LlmProvider::OpenAI,
            model: None,
            max_guidances_per_hour: 10,
            analysis_delay_ms: 30_000,
            intervention_threshold: 0.7,
            guide_prompt: None,
            api_keys: ApiKeys::default(),
            output_lines: 50,
            request_timeout_secs: 30,
            max_retries: 2,
            context: ContextConfig::default(),
        }
    }
}

impl AutopilotConfig {
    /// Fill empty API keys and the model from the environment.
    ///
    /// Checks `OPENAI_API_KEY`, `ANTHROPIC_API_KEY`, `GEMINI_API_KEY` and
    /// `STEWARD_LLM_MODEL`. Stored values win over the environment.
    pub fn with_env_overrides(mut self) -> Self {
        for provider in LlmProvider::all() {
            if self.api_keys.get(provider).is_none() {
                if let Ok(key) = std::env::var(provider.env_key()) {
                    if !key.is_empty() {
                        self.api_keys.set(provider, key);
                    }
                }
            }
        }

        if self.model.is_none() {
            if let Ok(model) = std::env::var("STEWARD_LLM_MODEL") {
                if !model.is_empty() {
                    self.model = Some(model);
                }
            }
        }

        self
    }

    /// API key for the active provider.
    pub fn active_api_key(&self) -> Option<&str> {
        self.api_keys.get(self.provider)
    }

    pub fn validate(&self) -> CoreResult<()> {
        if !(0.0..=1.0).contains(&self.intervention_threshold) {
            return Err(CoreError::InvalidConfig(format!(
                "interventionThreshold must be within [0, 1], got {}",
                self.intervention_threshold
            )));
        }
        if self.analysis_delay_ms == 0 {
            return Err(CoreError::InvalidConfig(
                "analysisDelayMs must be greater than zero".to_string(),
            ));
        }
        if self.context.cache_interval_minutes == 0 {
            return Err(CoreError::InvalidConfig(
                "cacheIntervalMinutes must be greater than zero".to_string(),
            ));
        }
        if self.output_lines == 0 {
            return Err(CoreError::InvalidConfig(
                "outputLines must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AutopilotConfig::default();
        assert!(!config.enabled);
        assert_eq!(config.max_guidances_per_hour, 10);
        assert_eq!(config.context.cache_interval_minutes, 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let json = r#"{"enabled": true, "provider": "anthropic", "maxGuidancesPerHour": 3}"#;
        let config: AutopilotConfig = serde_json::from_str(json).unwrap();

        assert!(config.enabled);
        assert_eq!(config.provider, LlmProvider::Anthropic);
        assert_eq!(config.max_guidances_per_hour, 3);
        assert_eq!(config.analysis_delay_ms, 30_000);
        assert!(config.context.enable_git_integration);
    }

    #[test]
    fn test_camel_case_round_trip_names() {
        let value = serde_json::to_value(AutopilotConfig::default()).unwrap();
        assert!(value.get("analysisDelayMs").is_some());
        assert!(value["context"].get("cacheIntervalMinutes").is_some());
    }

    #[test]
    fn test_validate_rejects_bad_threshold() {
        let config = AutopilotConfig {
            intervention_threshold: 1.5,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(CoreError::InvalidConfig(_))));
    }

    #[test]
    fn test_api_keys_ignore_blank() {
        let mut keys = ApiKeys::default();
        keys.set(LlmProvider::Gemini, "   ");
        assert!(keys.get(LlmProvider::Gemini).is_none());
        keys.set(LlmProvider::Gemini, "g-key");
        assert_eq!(keys.get(LlmProvider::Gemini), Some("g-key"));
    }

    #[test]
    fn test_provider_parse() {
        assert_eq!("Claude".parse::<LlmProvider>().unwrap(), LlmProvider::Anthropic);
        assert_eq!("openai".parse::<LlmProvider>().unwrap(), LlmProvider::OpenAI);
        assert!("mistral".parse::<LlmProvider>().is_err());
    }
}
