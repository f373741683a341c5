//! Integration tests for the guidance pipeline with the built-in sources.

use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tempfile::tempdir;

use steward_context::ContextBuilder;
use steward_core::{AnalysisContext, AutopilotConfig, ContextConfig, LlmProvider};
use steward_guidance::{
    ContextAwareSource, GuidanceOrchestrator, GuidanceSource, LlmSource, PatternSource,
    CONTEXT_AWARE_SOURCE_ID, LLM_SOURCE_ID, PATTERN_SOURCE_ID,
};
use steward_llm::{CompletionBackend, LlmClient, LlmResult, ProviderRegistry};

/// Backend that always returns the same reply and counts calls.
struct Canned {
    reply: String,
    calls: AtomicUsize,
}

#[async_trait]
impl CompletionBackend for Canned {
    fn provider(&self) -> LlmProvider {
        LlmProvider::Anthropic
    }

    fn model(&self) -> String {
        "canned".to_string()
    }

    async fn complete(&self, _prompt: &str) -> LlmResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.reply.clone())
    }
}

struct Pipeline {
    orchestrator: GuidanceOrchestrator,
    backend: Arc<Canned>,
}

fn pipeline(llm_reply: &str) -> Pipeline {
    let config = AutopilotConfig::default();
    let backend = Arc::new(Canned {
        reply: llm_reply.to_string(),
        calls: AtomicUsize::new(0),
    });
    let client = LlmClient::with_backend(
        config.clone(),
        Arc::new(ProviderRegistry::builtin()),
        backend.clone(),
    );
    let builder = Arc::new(ContextBuilder::new(ContextConfig::default()));

    let sources: Vec<Arc<dyn GuidanceSource>> = vec![
        Arc::new(LlmSource::new(Arc::new(client), &config)),
        Arc::new(ContextAwareSource::new(builder)),
        Arc::new(PatternSource::new()),
    ];
    Pipeline {
        orchestrator: GuidanceOrchestrator::with_sources(sources),
        backend,
    }
}

fn react_project(root: &Path) {
    fs::write(
        root.join("package.json"),
        r#"{"dependencies": {"react": "18.2.0"}, "devDependencies": {"jest": "29.0.0"}}"#,
    )
    .unwrap();
    fs::create_dir(root.join("__tests__")).unwrap();
}

const QUIET_LLM: &str = r#"{"shouldIntervene": false, "confidence": 0.2, "reasoning": "Progressing normally"}"#;

/// Sources are evaluated cheapest first regardless of registration order.
#[test]
fn test_sources_ordered_by_priority() {
    let pipeline = pipeline(QUIET_LLM);
    assert_eq!(
        pipeline.orchestrator.source_ids(),
        vec![PATTERN_SOURCE_ID, CONTEXT_AWARE_SOURCE_ID, LLM_SOURCE_ID]
    );
}

/// A destructive command is caught by the pattern source before the LLM runs.
#[tokio::test]
async fn test_pattern_short_circuits_llm() {
    let temp = tempdir().unwrap();
    let pipeline = pipeline(QUIET_LLM);
    let ctx = AnalysisContext::new("s1", "Cleaning up\n$ rm -rf ~ ", temp.path());

    let result = pipeline.orchestrator.generate_guidance(&ctx).await;

    assert!(result.should_intervene);
    assert_eq!(result.source, PATTERN_SOURCE_ID);
    assert_eq!(result.metadata["shortCircuited"], json!(PATTERN_SOURCE_ID));
    assert_eq!(result.metadata["sources"].as_array().unwrap().len(), 1);
    assert_eq!(pipeline.backend.calls.load(Ordering::SeqCst), 0);
}

/// A safe confirmation dialog is answered with "1" and wins outright.
#[tokio::test]
async fn test_safe_confirmation_is_answered() {
    let temp = tempdir().unwrap();
    react_project(temp.path());
    let pipeline = pipeline(QUIET_LLM);
    let ctx = AnalysisContext::new(
        "s1",
        "All files updated.\nDo you want me to run the test suite?\n❯ 1. Yes\n  2. No",
        temp.path(),
    );

    let result = pipeline.orchestrator.generate_guidance(&ctx).await;

    assert!(result.should_intervene);
    assert_eq!(result.source, CONTEXT_AWARE_SOURCE_ID);
    assert_eq!(result.priority, 1);
    assert_eq!(result.guidance.as_deref(), Some("1"));
    assert_eq!(pipeline.backend.calls.load(Ordering::SeqCst), 0);
}

/// A push confirmation is never auto-answered; the LLM gets the final say.
#[tokio::test]
async fn test_push_confirmation_falls_through_to_llm() {
    let temp = tempdir().unwrap();
    react_project(temp.path());
    let pipeline = pipeline(QUIET_LLM);
    let ctx = AnalysisContext::new("s1", "Should I push these changes to origin/main?", temp.path());

    let result = pipeline.orchestrator.generate_guidance(&ctx).await;

    assert!(!result.should_intervene);
    assert_eq!(pipeline.backend.calls.load(Ordering::SeqCst), 1);
    assert_eq!(result.metadata["sources"].as_array().unwrap().len(), 3);
}

/// With nothing deterministic to say, a confident LLM verdict is used.
#[tokio::test]
async fn test_llm_fallback_guidance() {
    let temp = tempdir().unwrap();
    let pipeline = pipeline(
        r#"```json
{"shouldIntervene": true, "guidance": "Add a migration before changing the schema.", "confidence": 0.82, "reasoning": "Schema edit without migration"}
```"#,
    );
    let ctx = AnalysisContext::new("s1", "Editing db/schema.sql\nAdded column users.age", temp.path());

    let result = pipeline.orchestrator.generate_guidance(&ctx).await;

    assert!(result.should_intervene);
    assert_eq!(result.source, LLM_SOURCE_ID);
    assert_eq!(
        result.formatted_line().as_deref(),
        Some("🤖 Autopilot: Add a migration before changing the schema.\n")
    );
    assert!(result.reasoning.contains("[source: llm; 3 sources analyzed]"));
}

/// An LLM source without credentials is skipped, not failed.
#[tokio::test]
async fn test_unconfigured_llm_is_skipped() {
    let temp = tempdir().unwrap();
    let config = AutopilotConfig::default();
    let client = LlmClient::new(config.clone(), Arc::new(ProviderRegistry::builtin()));
    let sources: Vec<Arc<dyn GuidanceSource>> = vec![
        Arc::new(PatternSource::new()),
        Arc::new(LlmSource::new(Arc::new(client), &config)),
    ];
    let orchestrator = GuidanceOrchestrator::with_sources(sources);
    let ctx = AnalysisContext::new("s1", "Compiling steward v0.1.0", temp.path());

    let result = orchestrator.generate_guidance(&ctx).await;

    assert!(!result.should_intervene);
    assert!(!result.is_error());
    assert_eq!(result.metadata["skipped"], json!([LLM_SOURCE_ID]));
}
