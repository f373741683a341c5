//! Provider registry - which models each provider accepts.
//!
//! The registry is built once at startup and shared by reference. It is never
//! mutated afterwards; a different model table means a different registry.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use steward_core::LlmProvider;

use crate::error::{LlmError, LlmResult};

/// A model offered by a provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelInfo {
    pub id: String,
    pub display_name: String,
    pub provider: LlmProvider,
}

impl ModelInfo {
    pub fn new(provider: LlmProvider, id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            provider,
        }
    }
}

/// Immutable provider → models table. The first model listed is the default.
#[derive(Debug, Clone)]
pub struct ProviderRegistry {
    models: HashMap<LlmProvider, Vec<ModelInfo>>,
}

impl ProviderRegistry {
    /// Start an empty registry; add models with [`ProviderRegistry::with_model`].
    pub fn empty() -> Self {
        Self {
            models: HashMap::new(),
        }
    }

    /// The built-in model table.
    pub fn builtin() -> Self {
        use LlmProvider::*;

        Self::empty()
            .with_model(ModelInfo::new(OpenAI, "gpt-4o-mini", "GPT-4o mini"))
            .with_model(ModelInfo::new(OpenAI, "gpt-4o", "GPT-4o"))
            .with_model(ModelInfo::new(OpenAI, "gpt-4.1-mini", "GPT-4.1 mini"))
            .with_model(ModelInfo::new(OpenAI, "gpt-4.1", "GPT-4.1"))
            .with_model(ModelInfo::new(OpenAI, "gpt-5-mini", "GPT-5 mini"))
            .with_model(ModelInfo::new(Anthropic, "claude-3-5-haiku-latest", "Claude 3.5 Haiku"))
            .with_model(ModelInfo::new(Anthropic, "claude-sonnet-4-5", "Claude Sonnet 4.5"))
            .with_model(ModelInfo::new(Anthropic, "claude-opus-4-1", "Claude Opus 4.1"))
            .with_model(ModelInfo::new(Gemini, "gemini-2.0-flash", "Gemini 2.0 Flash"))
            .with_model(ModelInfo::new(Gemini, "gemini-2.5-flash", "Gemini 2.5 Flash"))
            .with_model(ModelInfo::new(Gemini, "gemini-2.5-pro", "Gemini 2.5 Pro"))
    }

    pub fn with_model(mut self, model: ModelInfo) -> Self {
        let list = self.models.entry(model.provider).or_default();
        if !list.iter().any(|m| m.id == model.id) {
            list.push(model);
        }
        self
    }

    pub fn providers(&self) -> Vec<LlmProvider> {
        let mut providers: Vec<_> = self.models.keys().copied().collect();
        providers.sort_by_key(|p| p.as_str());
        providers
    }

    pub fn models_for(&self, provider: LlmProvider) -> &[ModelInfo] {
        self.models.get(&provider).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn default_model(&self, provider: LlmProvider) -> Option<&ModelInfo> {
        self.models_for(provider).first()
    }

    pub fn supports(&self, provider: LlmProvider, model: &str) -> bool {
        self.models_for(provider).iter().any(|m| m.id == model)
    }

    /// Resolve the model to call: the requested one if listed, else the default.
    pub fn resolve(&self, provider: LlmProvider, requested: Option<&str>) -> LlmResult<String> {
        if self.models_for(provider).is_empty() {
            return Err(LlmError::UnsupportedProvider(provider.to_string()));
        }

        match requested.map(str::trim).filter(|m| !m.is_empty()) {
            Some(model) if self.supports(provider, model) => Ok(model.to_string()),
            Some(model) => Err(LlmError::UnsupportedModel {
                provider,
                model: model.to_string(),
            }),
            None => self
                .default_model(provider)
                .map(|m| m.id.clone())
                .ok_or_else(|| LlmError::UnsupportedProvider(provider.to_string())),
        }
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_covers_all_providers() {
        let registry = ProviderRegistry::builtin();
        assert_eq!(registry.providers().len(), 3);
        for provider in LlmProvider::all() {
            assert!(registry.default_model(provider).is_some());
        }
    }

    #[test]
    fn test_resolve_default_and_explicit() {
        let registry = ProviderRegistry::builtin();
        assert_eq!(registry.resolve(LlmProvider::OpenAI, None).unwrap(), "gpt-4o-mini");
        assert_eq!(
            registry.resolve(LlmProvider::Anthropic, Some("claude-sonnet-4-5")).unwrap(),
            "claude-sonnet-4-5"
        );
        assert_eq!(registry.resolve(LlmProvider::Gemini, Some("  ")).unwrap(), "gemini-2.0-flash");
    }

    #[test]
    fn test_resolve_unknown_model() {
        let registry = ProviderRegistry::builtin();
        let err = registry.resolve(LlmProvider::OpenAI, Some("claude-sonnet-4-5")).unwrap_err();
        assert_eq!(err.category(), "unsupported-model");
    }

    #[test]
    fn test_resolve_provider_without_models() {
        let registry = ProviderRegistry::empty()
            .with_model(ModelInfo::new(LlmProvider::OpenAI, "gpt-4o", "GPT-4o"));
        assert!(matches!(
            registry.resolve(LlmProvider::Gemini, None),
            Err(LlmError::UnsupportedProvider(_))
        ));
    }

    #[test]
    fn test_duplicate_models_ignored() {
        let registry = ProviderRegistry::empty()
            .with_model(ModelInfo::new(LlmProvider::OpenAI, "a", "A"))
            .with_model(ModelInfo::new(LlmProvider::OpenAI, "a", "A again"));
        assert_eq!(registry.models_for(LlmProvider::OpenAI).len(), 1);
    }
}
