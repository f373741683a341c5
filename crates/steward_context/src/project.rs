//! Project snapshot types.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::git::GitStatus;

pub const UNKNOWN: &str = "unknown";

/// What kind of project this is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectType {
    pub framework: String,
    pub language: String,
    pub build_system: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test_framework: Option<String>,
    /// Notable traits, e.g. `hooks`, `app-router`, `monorepo`
    #[serde(default)]
    pub patterns: Vec<String>,
}

impl ProjectType {
    pub fn unknown() -> Self {
        Self {
            framework: UNKNOWN.to_string(),
            language: UNKNOWN.to_string(),
            build_system: UNKNOWN.to_string(),
            test_framework: None,
            patterns: Vec::new(),
        }
    }

    pub fn is_framework(&self, name: &str) -> bool {
        self.framework.eq_ignore_ascii_case(name)
    }

    pub fn is_language(&self, name: &str) -> bool {
        self.language.eq_ignore_ascii_case(name)
    }

    pub fn has_pattern(&self, name: &str) -> bool {
        self.patterns.iter().any(|p| p == name)
    }
}

impl Default for ProjectType {
    fn default() -> Self {
        Self::unknown()
    }
}

/// Cached project snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectContext {
    pub project_path: PathBuf,
    pub project_type: ProjectType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub git_status: Option<GitStatus>,
    /// Most recently modified files, relative to the project root
    pub recent_files: Vec<String>,
    pub has_tests: bool,
    pub has_documentation: bool,
    pub dependencies: Vec<String>,
    pub dev_dependencies: Vec<String>,
    pub cache_timestamp: DateTime<Utc>,
}

impl ProjectContext {
    /// The degraded snapshot returned when a scan fails.
    pub fn minimal(project_path: impl Into<PathBuf>) -> Self {
        Self {
            project_path: project_path.into(),
            project_type: ProjectType::unknown(),
            git_status: None,
            recent_files: Vec::new(),
            has_tests: false,
            has_documentation: false,
            dependencies: Vec::new(),
            dev_dependencies: Vec::new(),
            cache_timestamp: Utc::now(),
        }
    }

    pub fn framework(&self) -> &str {
        &self.project_type.framework
    }

    pub fn language(&self) -> &str {
        &self.project_type.language
    }

    /// Whether `name` is a runtime or dev dependency.
    pub fn depends_on(&self, name: &str) -> bool {
        self.dependencies.iter().any(|d| d == name) || self.dev_dependencies.iter().any(|d| d == name)
    }

    /// Number of files with pending changes, 0 without git data.
    pub fn changed_file_count(&self) -> usize {
        self.git_status.as_ref().map(GitStatus::changed_count).unwrap_or(0)
    }

    pub fn has_pending_changes(&self) -> bool {
        self.changed_file_count() > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_context() {
        let ctx = ProjectContext::minimal("/tmp/x");
        assert_eq!(ctx.framework(), "unknown");
        assert_eq!(ctx.language(), "unknown");
        assert!(!ctx.has_tests);
        assert!(!ctx.has_documentation);
        assert!(ctx.dependencies.is_empty());
        assert!(!ctx.has_pending_changes());
    }

    #[test]
    fn test_depends_on_checks_both_lists() {
        let mut ctx = ProjectContext::minimal("/tmp/x");
        ctx.dependencies.push("react".to_string());
        ctx.dev_dependencies.push("jest".to_string());
        assert!(ctx.depends_on("react"));
        assert!(ctx.depends_on("jest"));
        assert!(!ctx.depends_on("vue"));
    }

    #[test]
    fn test_project_type_serializes_camel_case() {
        let value = serde_json::to_value(ProjectType::unknown()).unwrap();
        assert!(value.get("buildSystem").is_some());
        assert!(value.get("testFramework").is_none());
    }
}
