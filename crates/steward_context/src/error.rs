//! Error types for context building.
//!
//! These never escape [`ContextBuilder::build_project_context`](crate::ContextBuilder::build_project_context);
//! a failed scan degrades to a minimal context instead.

use thiserror::Error;

/// Result type alias for context operations.
pub type ContextResult<T> = Result<T, ContextError>;

/// Errors that can occur while scanning a project.
#[derive(Error, Debug)]
pub enum ContextError {
    #[error("Project path not found: {0}")]
    PathNotFound(String),

    #[error("Git error: {0}")]
    Git(String),

    #[error("Detection failed: {0}")]
    Detection(String),

    #[error("Manifest error in {file}: {message}")]
    Manifest { file: String, message: String },

    #[error("Background scan failed: {0}")]
    Join(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
