//! The guidance source contract.
//!
//! A source is one analysis strategy. The orchestrator runs sources in
//! ascending [`priority`](GuidanceSource::priority) order; lower numbers take
//! precedence when several sources want to intervene.
//!
//! # Example
//!
//! ```rust,ignore
//! use async_trait::async_trait;
//! use steward_core::{AnalysisContext, GuidanceResult};
//! use steward_guidance::{EngineResult, GuidanceSource};
//!
//! struct Quiet;
//!
//! #[async_trait]
//! impl GuidanceSource for Quiet {
//!     fn id(&self) -> &str { "quiet" }
//!     fn priority(&self) -> u32 { 50 }
//!     fn can_short_circuit(&self) -> bool { false }
//!
//!     async fn analyze(&self, _context: &AnalysisContext) -> EngineResult<GuidanceResult> {
//!         Ok(GuidanceResult::no_guidance("quiet", 50, "Nothing to say"))
//!     }
//! }
//! ```

use async_trait::async_trait;
use steward_core::{AnalysisContext, AutopilotConfig, GuidanceResult};

use crate::error::EngineResult;

/// Source priorities for the built-in strategies.
pub mod priority {
    pub const PATTERN: u32 = 1;
    pub const CONTEXT_AWARE: u32 = 5;
    pub const LLM: u32 = 10;
}

/// One pluggable analysis strategy.
#[async_trait]
pub trait GuidanceSource: Send + Sync {
    /// Unique identifier within an orchestrator.
    fn id(&self) -> &str;

    /// Precedence; lower runs first and wins ties.
    fn priority(&self) -> u32;

    /// Whether a confident intervention from this source ends the cycle early.
    fn can_short_circuit(&self) -> bool;

    /// Analyze one cycle's output.
    ///
    /// Errors are isolated by the orchestrator and never abort a cycle.
    async fn analyze(&self, context: &AnalysisContext) -> EngineResult<GuidanceResult>;

    /// Apply a new configuration.
    fn update_config(&self, _config: &AutopilotConfig) {}

    /// Unavailable sources are skipped.
    fn is_available(&self) -> bool {
        true
    }
}
