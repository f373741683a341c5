//! # steward_guidance
//!
//! Decides when to steer a coding assistant, and what to tell it.
//!
//! An [`AutopilotMonitor`] ticks once per analysis delay for every enabled
//! session. Each cycle snapshots the session's recent output and hands it to
//! the [`GuidanceOrchestrator`], which runs the registered
//! [`GuidanceSource`]s in priority order:
//!
//! 1. [`PatternSource`] - regex rules over the raw output
//! 2. [`ContextAwareSource`] - confirmation dialogs and project-aware patterns
//! 3. [`LlmSource`] - the language model, consulted last
//!
//! A confident cheap source short-circuits the rest. The winning guidance is
//! written back into the session under an hourly [`RateBudget`].

pub mod error;
pub mod events;
pub mod monitor;
pub mod orchestrator;
pub mod rate;
pub mod registry;
pub mod source;
pub mod sources;
pub mod state;

pub use error::{EngineResult, GuidanceError};
pub use events::{AutopilotEvent, MonitorStatus};
pub use monitor::{AutopilotMonitor, CycleOutcome, EVENT_CHANNEL_CAPACITY};
pub use orchestrator::{GuidanceOrchestrator, ORCHESTRATOR_ID, SHORT_CIRCUIT_CONFIDENCE};
pub use rate::RateBudget;
pub use registry::SourceRegistry;
pub use source::{priority, GuidanceSource};
pub use sources::{
    ContextAwareSource, LlmSource, PatternSource, CONTEXT_AWARE_SOURCE_ID, LLM_SOURCE_ID,
    PATTERN_SOURCE_ID,
};
pub use state::AutopilotMonitorState;
