//! # steward_context
//!
//! Everything the heuristic analyzers know about a project:
//!
//! - [`ContextBuilder`]: cached [`ProjectContext`] snapshots keyed by path
//! - [`ProjectDetector`] / [`GitStatusProvider`]: the collaborators it consults
//! - [`PatternLibrary`]: `(ProjectContext, output) → ranked GuidancePattern`s
//! - [`ConfirmationDialogHandler`]: decides whether a yes/no prompt is safe
//!   to answer automatically

pub mod builder;
pub mod confirmation;
pub mod detector;
pub mod error;
pub mod git;
pub mod manifest;
pub mod patterns;
pub mod project;

pub use builder::ContextBuilder;
pub use confirmation::{ConfirmationDecision, ConfirmationDialogHandler, DialogType};
pub use detector::{FsProjectDetector, ProjectDetector};
pub use error::{ContextError, ContextResult};
pub use git::{GitCli, GitStatus, GitStatusProvider};
pub use manifest::{read_dependencies, Dependencies};
pub use patterns::{GuidancePattern, PatternCategory, PatternLibrary};
pub use project::{ProjectContext, ProjectType};
