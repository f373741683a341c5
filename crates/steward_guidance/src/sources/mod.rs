//! Built-in guidance sources, cheapest first.

pub mod context_aware;
pub mod llm;
pub mod pattern;

pub use context_aware::{ContextAwareSource, CONTEXT_AWARE_SOURCE_ID};
pub use llm::{LlmSource, LLM_SOURCE_ID};
pub use pattern::{PatternSource, PATTERN_SOURCE_ID};
