//! # steward_core
//!
//! Shared building blocks for the Steward guidance engine.
//!
//! This crate holds the pieces every other layer agrees on:
//!
//! - **Configuration**: [`AutopilotConfig`] and its persistence seam [`ConfigStore`]
//! - **Analysis values**: [`AnalysisContext`] in, [`GuidanceResult`] out
//! - **Sessions**: the [`TerminalSession`] contract the monitor drives
//! - **Terminal text**: [`strip_ansi`] for clean pattern matching

pub mod ansi;
pub mod config;
pub mod error;
pub mod session;
pub mod store;
pub mod types;

pub use ansi::{strip_ansi, strip_ansi_lines};
pub use config::{ApiKeys, AutopilotConfig, ContextConfig, LlmProvider};
pub use error::{CoreError, CoreResult};
pub use session::{MemorySession, TerminalSession};
pub use store::{ConfigStore, JsonConfigStore, MemoryConfigStore};
pub use types::{AnalysisContext, GuidanceResult, GUIDANCE_MARKER};
