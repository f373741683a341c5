//! LLM failure taxonomy.
//!
//! Every variant renders a distinct human-readable message. The message ends
//! up in the `reasoning` of a non-intervening decision, so it must say what
//! went wrong without leaking the API key.

use steward_core::LlmProvider;
use thiserror::Error;

/// Result type alias for LLM operations.
pub type LlmResult<T> = Result<T, LlmError>;

/// Errors produced by the LLM client.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LlmError {
    #[error("Authentication failed: no API key configured for {0}")]
    MissingApiKey(LlmProvider),

    #[error("Authentication failed: {provider} rejected the API key ({message})")]
    Authentication { provider: LlmProvider, message: String },

    #[error("Rate limit exceeded at {provider}: {message}")]
    RateLimited { provider: LlmProvider, message: String },

    #[error("Network error talking to {provider}: {message}")]
    Network { provider: LlmProvider, message: String },

    #[error("Request to {provider} timed out after {seconds}s")]
    Timeout { provider: LlmProvider, seconds: u64 },

    #[error("Response parsing error: model reply is not valid JSON ({0})")]
    MalformedJson(String),

    #[error("Response shape error: {0}")]
    InvalidShape(String),

    #[error("Unsupported provider: {0}")]
    UnsupportedProvider(String),

    #[error("Unsupported model '{model}' for provider {provider}")]
    UnsupportedModel { provider: LlmProvider, model: String },

    #[error("Unknown LLM error: {0}")]
    Unknown(String),
}

impl LlmError {
    /// Stable short tag for logs and metadata.
    pub fn category(&self) -> &'static str {
        match self {
            Self::MissingApiKey(_) | Self::Authentication { .. } => "authentication",
            Self::RateLimited { .. } => "rate-limit",
            Self::Network { .. } | Self::Timeout { .. } => "network",
            Self::MalformedJson(_) => "malformed-json",
            Self::InvalidShape(_) => "invalid-shape",
            Self::UnsupportedProvider(_) | Self::UnsupportedModel { .. } => "unsupported-model",
            Self::Unknown(_) => "unknown",
        }
    }

    /// Whether retrying the same request may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::RateLimited { .. } | Self::Network { .. } | Self::Timeout { .. }
        )
    }

    /// Map a non-success HTTP status to a category.
    pub fn from_status(provider: LlmProvider, model: &str, status: u16, body: &str) -> Self {
        let message = truncate(body, 300);
        match status {
            401 | 403 => Self::Authentication { provider, message },
            429 => Self::RateLimited { provider, message },
            404 if body.to_lowercase().contains("model") => Self::UnsupportedModel {
                provider,
                model: model.to_string(),
            },
            400 if body.to_lowercase().contains("model") && body.to_lowercase().contains("not") => {
                Self::UnsupportedModel {
                    provider,
                    model: model.to_string(),
                }
            }
            500..=599 => Self::Network {
                provider,
                message: format!("server error {}: {}", status, message),
            },
            _ => Self::Unknown(format!("{} returned HTTP {}: {}", provider, status, message)),
        }
    }

    /// Map a transport error from reqwest.
    pub fn from_transport(provider: LlmProvider, timeout_secs: u64, err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout {
                provider,
                seconds: timeout_secs,
            }
        } else if err.is_connect() || err.is_request() {
            Self::Network {
                provider,
                message: err.to_string(),
            }
        } else if err.is_decode() {
            Self::MalformedJson(err.to_string())
        } else {
            Self::Unknown(err.to_string())
        }
    }
}

fn truncate(s: &str, max: usize) -> String {
    let trimmed = s.trim();
    if trimmed.chars().count() <= max {
        trimmed.to_string()
    } else {
        let cut: String = trimmed.chars().take(max).collect();
        format!("{}…", cut)
    }
}
