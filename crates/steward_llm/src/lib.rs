//! # steward_llm
//!
//! Uniform call surface over hosted language-model providers.
//!
//! The client asks for a strict JSON verdict, validates the reply and maps
//! every failure to an [`LlmError`] category. [`LlmClient::analyze_output`]
//! never returns an error: failures become a non-intervening
//! [`AutopilotDecision`] whose reasoning names the category.
//!
//! ```text
//! analyze_output ──▶ prompt ──▶ CompletionBackend ──▶ decision::parse
//!                                 (OpenAI | Anthropic | Gemini)
//! ```

pub mod backend;
pub mod client;
pub mod decision;
pub mod error;
pub mod prompt;
pub mod registry;

pub use backend::{
    build_backend, AnthropicBackend, CompletionBackend, GeminiBackend, HttpSettings, OpenAIBackend,
};
pub use client::LlmClient;
pub use decision::{parse_decision, AutopilotDecision};
pub use error::{LlmError, LlmResult};
pub use prompt::{build_analysis_prompt, PromptInput};
pub use registry::{ModelInfo, ProviderRegistry};
