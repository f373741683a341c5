//! LLM client - the single entry point the guidance layer talks to.

use std::sync::Arc;

use parking_lot::RwLock;
use steward_core::{AutopilotConfig, LlmProvider};
use tracing::{debug, info, warn};

use crate::backend::{build_backend, CompletionBackend, HttpSettings};
use crate::decision::{parse_decision, AutopilotDecision};
use crate::error::{LlmError, LlmResult};
use crate::prompt::{build_analysis_prompt, PromptInput};
use crate::registry::ProviderRegistry;

struct ClientState {
    config: AutopilotConfig,
    /// The backend for the active provider, or why there is none
    backend: Result<Arc<dyn CompletionBackend>, LlmError>,
}

/// Uniform, non-throwing call surface over the configured provider.
pub struct LlmClient {
    registry: Arc<ProviderRegistry>,
    state: RwLock<ClientState>,
}

impl LlmClient {
    /// Create a client for `config`. A missing key or unknown model is not
    /// an error here; it surfaces as a categorized decision on first use.
    pub fn new(config: AutopilotConfig, registry: Arc<ProviderRegistry>) -> Self {
        let backend = Self::backend_for(&config, &registry);
        Self {
            registry,
            state: RwLock::new(ClientState { config, backend }),
        }
    }

    /// Create a client around an existing backend.
    pub fn with_backend(
        config: AutopilotConfig,
        registry: Arc<ProviderRegistry>,
        backend: Arc<dyn CompletionBackend>,
    ) -> Self {
        Self {
            registry,
            state: RwLock::new(ClientState {
                config,
                backend: Ok(backend),
            }),
        }
    }

    fn backend_for(
        config: &AutopilotConfig,
        registry: &ProviderRegistry,
    ) -> Result<Arc<dyn CompletionBackend>, LlmError> {
        let model = registry.resolve(config.provider, config.model.as_deref())?;
        let api_key = config
            .active_api_key()
            .ok_or(LlmError::MissingApiKey(config.provider))?;

        let settings = HttpSettings::new(api_key, model)
            .timeout_secs(config.request_timeout_secs)
            .max_retries(config.max_retries);

        build_backend(config.provider, settings)
    }

    /// Swap in a new configuration, rebuilding the backend.
    pub fn update_config(&self, config: AutopilotConfig) {
        let backend = Self::backend_for(&config, &self.registry);
        match &backend {
            Ok(b) => info!("LLM client using {} / {}", b.provider(), b.model()),
            Err(e) => debug!("LLM client not ready: {}", e),
        }
        *self.state.write() = ClientState { config, backend };
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    pub fn provider(&self) -> LlmProvider {
        self.state.read().config.provider
    }

    /// Model the active backend calls, if one is configured.
    pub fn model(&self) -> Option<String> {
        self.state.read().backend.as_ref().ok().map(|b| b.model())
    }

    /// Whether the active provider has a usable backend.
    pub fn is_configured(&self) -> bool {
        self.state.read().backend.is_ok()
    }

    fn backend(&self) -> LlmResult<Arc<dyn CompletionBackend>> {
        self.state.read().backend.clone()
    }

    /// Raw completion call.
    pub async fn complete(&self, prompt: &str) -> LlmResult<String> {
        let backend = self.backend()?;
        backend.complete(prompt).await
    }

    /// Ask the model whether to intervene on `terminal_output`.
    ///
    /// Never fails: every error becomes a non-intervening decision with
    /// zero confidence whose reasoning names the failure.
    pub async fn analyze_output(
        &self,
        terminal_output: &str,
        project_notes: Option<&str>,
    ) -> AutopilotDecision {
        let guide_prompt = self.state.read().config.guide_prompt.clone();
        let prompt = build_analysis_prompt(&PromptInput {
            terminal_output,
            project_notes,
            guide_prompt: guide_prompt.as_deref(),
        });

        match self.request_decision(&prompt).await {
            Ok(decision) => {
                debug!(
                    "LLM decision: intervene={} confidence={:.2}",
                    decision.should_intervene, decision.confidence
                );
                decision
            }
            Err(e) => {
                warn!("LLM analysis failed [{}]: {}", e.category(), e);
                AutopilotDecision::from_error(&e)
            }
        }
    }

    async fn request_decision(&self, prompt: &str) -> LlmResult<AutopilotDecision> {
        let raw = self.complete(prompt).await?;
        parse_decision(&raw)
    }

    /// Validate credentials with a minimal request.
    pub async fn test_connection(&self) -> LlmResult<()> {
        let raw = self
            .complete("Reply with the JSON object {\"ok\": true} and nothing else.")
            .await?;
        if raw.contains('{') {
            Ok(())
        } else {
            Err(LlmError::MalformedJson(
                "connection test reply contained no JSON".to_string(),
            ))
        }
    }
}

impl std::fmt::Debug for LlmClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read();
        f.debug_struct("LlmClient")
            .field("provider", &state.config.provider)
            .field("configured", &state.backend.is_ok())
            .finish()
    }
}
