//! Values that flow through one analysis cycle.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Prefix of every guidance line written into a session.
pub const GUIDANCE_MARKER: &str = "🤖 Autopilot:";

/// One analysis request. Built fresh per cycle and never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisContext {
    pub cycle_id: Uuid,
    pub session_id: String,
    /// Recent output lines, ANSI-stripped, joined by newlines
    pub terminal_output: String,
    pub project_path: PathBuf,
    pub created_at: DateTime<Utc>,
}

impl AnalysisContext {
    pub fn new(
        session_id: impl Into<String>,
        terminal_output: impl Into<String>,
        project_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            cycle_id: Uuid::new_v4(),
            session_id: session_id.into(),
            terminal_output: terminal_output.into(),
            project_path: project_path.into(),
            created_at: Utc::now(),
        }
    }

    /// Build from raw lines, stripping ANSI sequences first.
    pub fn from_lines<S: AsRef<str>>(
        session_id: impl Into<String>,
        lines: &[S],
        project_path: impl Into<PathBuf>,
    ) -> Self {
        let clean = crate::ansi::strip_ansi_lines(lines);
        Self::new(session_id, clean.join("\n"), project_path)
    }

    pub fn project_path(&self) -> &Path {
        &self.project_path
    }

    pub fn is_empty(&self) -> bool {
        self.terminal_output.trim().is_empty()
    }
}

/// One source's verdict for a cycle.
///
/// Lower `priority` values take precedence when several sources intervene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuidanceResult {
    pub should_intervene: bool,
    pub confidence: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guidance: Option<String>,
    pub reasoning: String,
    pub source: String,
    pub priority: u32,
    /// Set when the source failed; such results never win
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl GuidanceResult {
    /// A result that intervenes with `guidance`.
    pub fn intervene(
        source: impl Into<String>,
        priority: u32,
        confidence: f64,
        guidance: impl Into<String>,
        reasoning: impl Into<String>,
    ) -> Self {
        Self {
            should_intervene: true,
            confidence: confidence.clamp(0.0, 1.0),
            guidance: Some(guidance.into()),
            reasoning: reasoning.into(),
            source: source.into(),
            priority,
            error: None,
            metadata: HashMap::new(),
        }
    }

    /// A non-intervening result.
    pub fn no_guidance(source: impl Into<String>, priority: u32, reasoning: impl Into<String>) -> Self {
        Self {
            should_intervene: false,
            confidence: 0.0,
            guidance: None,
            reasoning: reasoning.into(),
            source: source.into(),
            priority,
            error: None,
            metadata: HashMap::new(),
        }
    }

    /// A zero-confidence, error-tagged result.
    pub fn failed(source: impl Into<String>, priority: u32, error: impl Into<String>) -> Self {
        let error = error.into();
        Self {
            should_intervene: false,
            confidence: 0.0,
            guidance: None,
            reasoning: format!("Analysis failed: {}", error),
            source: source.into(),
            priority,
            error: Some(error),
            metadata: HashMap::new(),
        }
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence.clamp(0.0, 1.0);
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Guidance text that is present and non-blank.
    pub fn guidance_text(&self) -> Option<&str> {
        self.guidance.as_deref().map(str::trim).filter(|g| !g.is_empty())
    }

    /// The line written into a session for this result.
    pub fn formatted_line(&self) -> Option<String> {
        self.guidance_text()
            .map(|g| format!("{} {}\n", GUIDANCE_MARKER, g))
    }
}
