//! Provider backends.
//!
//! Each backend turns one prompt into one completion string. Transient
//! failures (5xx, 429, transport errors) are retried with exponential backoff;
//! everything else is mapped to an [`LlmError`] on the first attempt.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use steward_core::LlmProvider;
use tracing::{debug, warn};

use crate::error::{LlmError, LlmResult};

const MAX_OUTPUT_TOKENS: u32 = 512;

/// One-shot completion against a hosted model.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    fn provider(&self) -> LlmProvider;

    fn model(&self) -> String;

    async fn complete(&self, prompt: &str) -> LlmResult<String>;
}

/// Connection settings shared by every backend.
#[derive(Clone)]
pub struct HttpSettings {
    pub api_key: String,
    pub model: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub base_url: Option<String>,
}

impl HttpSettings {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            timeout_secs: 30,
            max_retries: 2,
            base_url: None,
        }
    }

    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs.max(1);
        self
    }

    pub fn max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    fn http_client(&self, provider: LlmProvider) -> LlmResult<reqwest::Client> {
        reqwest::Client::builder()
            .timeout(Duration::from_secs(self.timeout_secs))
            .build()
            .map_err(|e| LlmError::Unknown(format!("failed to build {} client: {}", provider, e)))
    }
}

impl std::fmt::Debug for HttpSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpSettings")
            .field("model", &self.model)
            .field("timeout_secs", &self.timeout_secs)
            .field("max_retries", &self.max_retries)
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

/// Build the backend for `provider`.
pub fn build_backend(
    provider: LlmProvider,
    settings: HttpSettings,
) -> LlmResult<Arc<dyn CompletionBackend>> {
    if settings.api_key.trim().is_empty() {
        return Err(LlmError::MissingApiKey(provider));
    }

    let backend: Arc<dyn CompletionBackend> = match provider {
        LlmProvider::OpenAI => Arc::new(OpenAIBackend::new(settings)?),
        LlmProvider::Anthropic => Arc::new(AnthropicBackend::new(settings)?),
        LlmProvider::Gemini => Arc::new(GeminiBackend::new(settings)?),
    };
    Ok(backend)
}

/// Send a request, retrying transient failures.
///
/// `build` is called once per attempt since request builders are consumed.
async fn send_with_retry<F>(
    provider: LlmProvider,
    settings: &HttpSettings,
    build: F,
) -> LlmResult<reqwest::Response>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    let attempts = settings.max_retries + 1;
    let mut last_error = None;

    for attempt in 0..attempts {
        if attempt > 0 {
            // Exponential backoff: 1s, 2s, 4s
            let delay = Duration::from_secs(1 << (attempt - 1).min(4));
            tokio::time::sleep(delay).await;
        }

        let response = match build().send().await {
            Ok(resp) => resp,
            Err(e) => {
                let err = LlmError::from_transport(provider, settings.timeout_secs, &e);
                warn!(
                    "{} request failed (attempt {}/{}): {}",
                    provider,
                    attempt + 1,
                    attempts,
                    err
                );
                if !err.is_transient() {
                    return Err(err);
                }
                last_error = Some(err);
                continue;
            }
        };

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let err = LlmError::from_status(provider, &settings.model, status.as_u16(), &body);

        if status.is_server_error() || status.as_u16() == 429 {
            warn!(
                "{} API error {} (attempt {}/{})",
                provider,
                status,
                attempt + 1,
                attempts
            );
            last_error = Some(err);
            continue;
        }

        return Err(err);
    }

    Err(last_error.unwrap_or_else(|| LlmError::Unknown("max retries exceeded".to_string())))
}

fn empty_completion(provider: LlmProvider) -> LlmError {
    LlmError::InvalidShape(format!("{} returned no completion content", provider))
}

// ============================================================================
// OpenAI
// ============================================================================

/// OpenAI chat completions.
pub struct OpenAIBackend {
    settings: HttpSettings,
    client: reqwest::Client,
}

impl OpenAIBackend {
    pub fn new(settings: HttpSettings) -> LlmResult<Self> {
        let client = settings.http_client(LlmProvider::OpenAI)?;
        Ok(Self { settings, client })
    }

    fn url(&self) -> String {
        let base = self
            .settings
            .base_url
            .as_deref()
            .unwrap_or("https://api.openai.com");
        format!("{}/v1/chat/completions", base.trim_end_matches('/'))
    }
}

#[async_trait]
impl CompletionBackend for OpenAIBackend {
    fn provider(&self) -> LlmProvider {
        LlmProvider::OpenAI
    }

    fn model(&self) -> String {
        self.settings.model.clone()
    }

    async fn complete(&self, prompt: &str) -> LlmResult<String> {
        let request = OpenAIRequest {
            model: self.settings.model.clone(),
            messages: vec![OpenAIMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            max_completion_tokens: Some(MAX_OUTPUT_TOKENS),
            response_format: Some(OpenAIResponseFormat {
                format_type: "json_object".to_string(),
            }),
        };
        let url = self.url();

        let response = send_with_retry(LlmProvider::OpenAI, &self.settings, || {
            self.client
                .post(&url)
                .header("Authorization", format!("Bearer {}", self.settings.api_key))
                .header("Content-Type", "application/json")
                .json(&request)
        })
        .await?;

        let result: OpenAIResponse = response
            .json()
            .await
            .map_err(|e| LlmError::MalformedJson(format!("OpenAI envelope: {}", e)))?;

        debug!("OpenAI completion received ({} choices)", result.choices.len());

        result
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| empty_completion(LlmProvider::OpenAI))
    }
}

#[derive(Debug, Serialize)]
struct OpenAIRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_completion_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<OpenAIResponseFormat>,
}

#[derive(Debug, Serialize)]
struct OpenAIResponseFormat {
    #[serde(rename = "type")]
    format_type: String,
}

#[derive(Debug, Serialize)]
struct OpenAIMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIResponseMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponseMessage {
    content: Option<String>,
}

// ============================================================================
// Anthropic
// ============================================================================

/// Anthropic messages API.
pub struct AnthropicBackend {
    settings: HttpSettings,
    client: reqwest::Client,
}

impl AnthropicBackend {
    pub fn new(settings: HttpSettings) -> LlmResult<Self> {
        let client = settings.http_client(LlmProvider::Anthropic)?;
        Ok(Self { settings, client })
    }

    fn url(&self) -> String {
        let base = self
            .settings
            .base_url
            .as_deref()
            .unwrap_or("https://api.anthropic.com");
        format!("{}/v1/messages", base.trim_end_matches('/'))
    }
}

#[async_trait]
impl CompletionBackend for AnthropicBackend {
    fn provider(&self) -> LlmProvider {
        LlmProvider::Anthropic
    }

    fn model(&self) -> String {
        self.settings.model.clone()
    }

    async fn complete(&self, prompt: &str) -> LlmResult<String> {
        let request = AnthropicRequest {
            model: self.settings.model.clone(),
            max_tokens: MAX_OUTPUT_TOKENS,
            system: Some("You reply with a single JSON object and nothing else.".to_string()),
            messages: vec![AnthropicMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
        };
        let url = self.url();

        let response = send_with_retry(LlmProvider::Anthropic, &self.settings, || {
            self.client
                .post(&url)
                .header("x-api-key", &self.settings.api_key)
                .header("anthropic-version", "2023-06-01")
                .header("Content-Type", "application/json")
                .json(&request)
        })
        .await?;

        let result: AnthropicResponse = response
            .json()
            .await
            .map_err(|e| LlmError::MalformedJson(format!("Anthropic envelope: {}", e)))?;

        let text: String = result
            .content
            .into_iter()
            .filter_map(|c| c.text)
            .collect::<Vec<_>>()
            .join("");

        if text.trim().is_empty() {
            return Err(empty_completion(LlmProvider::Anthropic));
        }
        Ok(text)
    }
}

#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<AnthropicMessage>,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContent>,
}

#[derive(Debug, Deserialize)]
struct AnthropicContent {
    text: Option<String>,
}

// ============================================================================
// Gemini
// ============================================================================

/// Google Gemini generateContent API.
pub struct GeminiBackend {
    settings: HttpSettings,
    client: reqwest::Client,
}

impl GeminiBackend {
    pub fn new(settings: HttpSettings) -> LlmResult<Self> {
        let client = settings.http_client(LlmProvider::Gemini)?;
        Ok(Self { settings, client })
    }

    fn url(&self) -> String {
        let base = self
            .settings
            .base_url
            .as_deref()
            .unwrap_or("https://generativelanguage.googleapis.com");
        format!(
            "{}/v1beta/models/{}:generateContent",
            base.trim_end_matches('/'),
            self.settings.model
        )
    }
}

#[async_trait]
impl CompletionBackend for GeminiBackend {
    fn provider(&self) -> LlmProvider {
        LlmProvider::Gemini
    }

    fn model(&self) -> String {
        self.settings.model.clone()
    }

    async fn complete(&self, prompt: &str) -> LlmResult<String> {
        let request = GeminiRequest {
            contents: vec![GeminiContent {
                parts: vec![GeminiPart {
                    text: Some(prompt.to_string()),
                }],
            }],
            generation_config: GeminiGenerationConfig {
                response_mime_type: "application/json".to_string(),
                max_output_tokens: MAX_OUTPUT_TOKENS,
            },
        };
        let url = self.url();

        let response = send_with_retry(LlmProvider::Gemini, &self.settings, || {
            self.client
                .post(&url)
                .header("x-goog-api-key", &self.settings.api_key)
                .header("Content-Type", "application/json")
                .json(&request)
        })
        .await?;

        let result: GeminiResponse = response
            .json()
            .await
            .map_err(|e| LlmError::MalformedJson(format!("Gemini envelope: {}", e)))?;

        result
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| {
                c.parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| empty_completion(LlmProvider::Gemini))
    }
}

#[derive(Debug, Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(rename = "generationConfig")]
    generation_config: GeminiGenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiPart {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    response_mime_type: String,
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContent>,
}
