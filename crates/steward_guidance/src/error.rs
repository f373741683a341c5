//! Error types for the guidance layer.

use steward_context::ContextError;
use steward_core::CoreError;
use steward_llm::LlmError;
use thiserror::Error;

/// Result type alias for guidance operations.
pub type EngineResult<T> = Result<T, GuidanceError>;

/// Errors raised by sources, the orchestrator and the monitor.
#[derive(Error, Debug)]
pub enum GuidanceError {
    #[error("Source {source_id} failed: {message}")]
    Source { source_id: String, message: String },

    #[error("Source {0} panicked")]
    SourcePanicked(String),

    #[error("Source already registered: {0}")]
    DuplicateSource(String),

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Context error: {0}")]
    Context(#[from] ContextError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error(transparent)]
    Core(#[from] CoreError),
}

impl GuidanceError {
    pub fn source_failed(source_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Source {
            source_id: source_id.into(),
            message: message.into(),
        }
    }
}
