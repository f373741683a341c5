//! Context-aware source.
//!
//! Grounds its verdict in the project snapshot: confirmation prompts go to the
//! [`ConfirmationDialogHandler`], everything else is matched against the
//! [`PatternLibrary`] and the project's compliance patterns.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use steward_context::{
    ConfirmationDialogHandler, ContextBuilder, GuidancePattern, PatternCategory, PatternLibrary,
    ProjectContext,
};
use steward_core::{AnalysisContext, AutopilotConfig, GuidanceResult};
use tracing::debug;

use crate::error::EngineResult;
use crate::source::{priority, GuidanceSource};

pub const CONTEXT_AWARE_SOURCE_ID: &str = "context-aware";

/// Priority of an auto-confirmation; confirmations beat every source.
const CONFIRMATION_PRIORITY: u32 = 1;

/// Lines from the end of the output searched for a prompt.
const PROMPT_SCAN_LINES: usize = 12;

const PROMPT_PHRASES: &[&str] = &[
    "do you want",
    "would you like",
    "should i",
    "proceed with",
    "continue with",
];

pub struct ContextAwareSource {
    builder: Arc<ContextBuilder>,
    library: PatternLibrary,
    confirmations: ConfirmationDialogHandler,
}

impl ContextAwareSource {
    pub fn new(builder: Arc<ContextBuilder>) -> Self {
        Self {
            builder,
            library: PatternLibrary::new(),
            confirmations: ConfirmationDialogHandler::new(),
        }
    }

    fn confirmation(&self, prompt: &str, project: &ProjectContext) -> Option<GuidanceResult> {
        let decision = self.confirmations.should_auto_confirm(prompt, project);
        if !decision.should_confirm || decision.confidence < self.confirmations.get_confidence_threshold() {
            debug!("Not auto-confirming {} dialog: {}", decision.dialog_type, decision.reasoning);
            return None;
        }

        let response = decision.response.clone().unwrap_or_else(|| "1".to_string());
        Some(
            GuidanceResult::intervene(
                CONTEXT_AWARE_SOURCE_ID,
                CONFIRMATION_PRIORITY,
                decision.confidence,
                response,
                format!("Auto-confirming {} dialog: {}", decision.dialog_type, decision.reasoning),
            )
            .with_metadata("kind", json!("confirmation"))
            .with_metadata("dialogType", json!(decision.dialog_type)),
        )
    }
}

/// Confidence for the top match among `total` matching patterns.
pub fn pattern_confidence(pattern_priority: u8, total_matches: usize) -> f64 {
    let p = f64::from(pattern_priority);
    let base = (0.5 + (p / 10.0) * 0.4).min(0.9);
    let match_boost = (0.05 * total_matches as f64).min(0.1);
    let priority_boost = if pattern_priority >= 8 { 0.1 } else { 0.0 };
    (base + match_boost + priority_boost).min(0.95)
}

fn enhance_guidance(pattern: &GuidancePattern, project: &ProjectContext) -> String {
    let known = |s: &str| s != "unknown";
    match pattern.category {
        PatternCategory::FrameworkHooks if known(project.language()) => {
            format!("{} ({} project)", pattern.guidance, project.language())
        }
        PatternCategory::GitWorkflow if project.has_pending_changes() => {
            format!("{} ({} files changed)", pattern.guidance, project.changed_file_count())
        }
        PatternCategory::Testing => match &project.project_type.test_framework {
            Some(tf) => format!("{} (test framework: {})", pattern.guidance, tf),
            None => pattern.guidance.clone(),
        },
        _ => pattern.guidance.clone(),
    }
}

fn normalize_prompt_line(line: &str) -> String {
    line.trim_start()
        .trim_start_matches(|c: char| matches!(c, '│' | '|' | '>' | '❯' | '›' | '•' | '*' | '-' | '⏺'))
        .trim()
        .to_string()
}

fn is_numbered_yes(line: &str) -> bool {
    let lower = line.to_ascii_lowercase();
    (lower.starts_with("1.") || lower.starts_with("1)")) && lower[2..].trim_start().starts_with("yes")
}

/// The prompt line to classify, if the tail of `output` looks like a
/// confirmation dialog.
pub fn find_confirmation_prompt(output: &str) -> Option<String> {
    let tail: Vec<String> = output
        .lines()
        .rev()
        .take(PROMPT_SCAN_LINES)
        .map(normalize_prompt_line)
        .collect();

    if let Some(line) = tail.iter().find(|l| {
        let lower = l.to_lowercase();
        PROMPT_PHRASES.iter().any(|p| lower.starts_with(p) || lower.contains(&format!(" {}", p)))
    }) {
        return Some(line.clone());
    }

    // A bare "1. Yes" option list: use the nearest question above it
    let option_at = tail.iter().position(|l| is_numbered_yes(l))?;
    tail.iter()
        .skip(option_at + 1)
        .find(|l| l.ends_with('?'))
        .cloned()
        .or_else(|| Some(tail.iter().rev().cloned().collect::<Vec<_>>().join("\n")))
}

#[async_trait]
impl GuidanceSource for ContextAwareSource {
    fn id(&self) -> &str {
        CONTEXT_AWARE_SOURCE_ID
    }

    fn priority(&self) -> u32 {
        priority::CONTEXT_AWARE
    }

    fn can_short_circuit(&self) -> bool {
        true
    }

    async fn analyze(&self, context: &AnalysisContext) -> EngineResult<GuidanceResult> {
        let project = self.builder.build_project_context(context.project_path()).await;
        let output = &context.terminal_output;

        if let Some(prompt) = find_confirmation_prompt(output) {
            if let Some(result) = self.confirmation(&prompt, &project) {
                return Ok(result);
            }
        }

        let mut matches = self.library.matching(&project, output);
        matches.extend(
            self.builder
                .get_compliance_patterns(context.project_path())
                .await
                .into_iter()
                .filter(|p| p.is_match(output)),
        );
        matches.sort_by(|a, b| b.priority.cmp(&a.priority));

        let Some(top) = matches.first() else {
            return Ok(GuidanceResult::no_guidance(
                CONTEXT_AWARE_SOURCE_ID,
                priority::CONTEXT_AWARE,
                format!("No {} patterns matched", project.framework()),
            ));
        };

        let confidence = pattern_confidence(top.priority, matches.len());
        debug!(
            "Context pattern {} matched ({} total), confidence {:.2}",
            top.id,
            matches.len(),
            confidence
        );

        Ok(GuidanceResult::intervene(
            CONTEXT_AWARE_SOURCE_ID,
            priority::CONTEXT_AWARE,
            confidence,
            enhance_guidance(top, &project),
            format!("Matched {} pattern '{}'", top.category, top.id),
        )
        .with_metadata("kind", json!("pattern"))
        .with_metadata("pattern", json!(top.id))
        .with_metadata("category", json!(top.category))
        .with_metadata("matches", json!(matches.len()))
        .with_metadata("framework", json!(project.framework())))
    }

    fn update_config(&self, config: &AutopilotConfig) {
        self.builder.update_config(config.context.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;
    use steward_context::{
        ContextResult, FsProjectDetector, GitStatus, GitStatusProvider,
    };
    use steward_core::ContextConfig;
    use tempfile::tempdir;

    struct DirtyTree(usize);

    impl GitStatusProvider for DirtyTree {
        fn status(&self, _path: &Path) -> ContextResult<GitStatus> {
            Ok(GitStatus {
                unstaged_files: (0..self.0).map(|i| format!("f{}.ts", i)).collect(),
                ..Default::default()
            })
        }
    }

    fn source_for(root: &Path, changed: usize) -> ContextAwareSource {
        let builder = ContextBuilder::with_collaborators(
            ContextConfig::default(),
            Arc::new(FsProjectDetector::new()),
            Arc::new(DirtyTree(changed)),
        );
        ContextAwareSource::new(Arc::new(builder))
    }

    fn react_project() -> tempfile::TempDir {
        let temp = tempdir().unwrap();
        fs::write(
            temp.path().join("package.json"),
            r#"{"dependencies": {"react": "18"}, "devDependencies": {"jest": "29"}}"#,
        )
        .unwrap();
        fs::write(temp.path().join("tsconfig.json"), "{}").unwrap();
        fs::create_dir(temp.path().join("__tests__")).unwrap();
        temp
    }

    #[test]
    fn test_confidence_formula() {
        assert!((pattern_confidence(5, 1) - 0.75).abs() < 1e-9);
        assert!((pattern_confidence(6, 1) - 0.79).abs() < 1e-9);
        assert!((pattern_confidence(8, 1) - 0.95).abs() < 1e-9);
        assert!((pattern_confidence(9, 3) - 0.95).abs() < 1e-9);
        assert!((pattern_confidence(1, 0) - 0.54).abs() < 1e-9);
    }

    #[test]
    fn test_find_confirmation_prompt() {
        let out = "Editing files\n│ Do you want me to run npm test?\n│ 1. Yes\n│ 2. No";
        assert_eq!(
            find_confirmation_prompt(out).as_deref(),
            Some("Do you want me to run npm test?")
        );

        let numbered = "Run cargo build?\n❯ 1. Yes\n  2. No, tell me what to do";
        assert_eq!(find_confirmation_prompt(numbered).as_deref(), Some("Run cargo build?"));

        assert!(find_confirmation_prompt("Compiling...\nDone").is_none());
    }

    #[tokio::test]
    async fn test_safe_confirmation_wins_with_priority_one() {
        let temp = react_project();
        let source = source_for(temp.path(), 0);
        let ctx = AnalysisContext::new("s1", "Do you want me to run npm test?\n1. Yes\n2. No", temp.path());

        let result = source.analyze(&ctx).await.unwrap();
        assert!(result.should_intervene);
        assert_eq!(result.priority, 1);
        assert_eq!(result.guidance.as_deref(), Some("1"));
        assert_eq!(result.confidence, 0.9);
        assert_eq!(result.metadata["dialogType"], json!("test-execution"));
    }

    #[tokio::test]
    async fn test_unsafe_confirmation_falls_through() {
        let temp = react_project();
        let source = source_for(temp.path(), 0);
        let ctx = AnalysisContext::new("s1", "Do you want to install suspicious-package?", temp.path());

        let result = source.analyze(&ctx).await.unwrap();
        assert!(!result.should_intervene);
        assert_eq!(result.priority, priority::CONTEXT_AWARE);
    }

    #[tokio::test]
    async fn test_hook_pattern_enhanced_with_language() {
        let temp = react_project();
        let source = source_for(temp.path(), 0);
        let ctx = AnalysisContext::new(
            "s1",
            "src/App.tsx\n  12:6  warning  React Hook useEffect has a missing dependency: 'id'",
            temp.path(),
        );

        let result = source.analyze(&ctx).await.unwrap();
        assert!(result.should_intervene);
        assert_eq!(result.metadata["pattern"], json!("react-effect-deps"));
        assert!(result.guidance.unwrap().ends_with("(typescript project)"));
        assert!((result.confidence - 0.95).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_git_pattern_enhanced_with_changed_count() {
        let temp = react_project();
        let source = source_for(temp.path(), 4);
        let ctx = AnalysisContext::new("s1", "Tests: 12 passed, 12 total", temp.path());

        let result = source.analyze(&ctx).await.unwrap();
        assert!(result.should_intervene);
        assert_eq!(result.metadata["category"], json!("git-workflow"));
        assert!(result.guidance.unwrap().ends_with("(4 files changed)"));
    }

    #[tokio::test]
    async fn test_nothing_matches() {
        let temp = react_project();
        let source = source_for(temp.path(), 0);
        let ctx = AnalysisContext::new("s1", "Compiled successfully.", temp.path());
        let result = source.analyze(&ctx).await.unwrap();
        assert!(!result.should_intervene);
        assert!(!result.is_error());
    }
}
