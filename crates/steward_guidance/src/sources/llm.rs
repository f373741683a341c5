//! LLM-backed general analyzer, the fallback of last resort.
//!
//! Enriches the prompt with the project summary and short excerpts of up to
//! three documentation or manifest files from the project root.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::json;
use steward_context::ContextBuilder;
use steward_core::{AnalysisContext, AutopilotConfig, GuidanceResult};
use steward_llm::LlmClient;
use tracing::debug;

use crate::error::EngineResult;
use crate::source::{priority, GuidanceSource};

pub const LLM_SOURCE_ID: &str = "llm";

/// Files read for project conventions, in preference order.
const DOC_FILES: &[&str] = &[
    "CLAUDE.md",
    "README.md",
    "CONTRIBUTING.md",
    "package.json",
    "Cargo.toml",
    "pyproject.toml",
    "go.mod",
];
const MAX_DOC_FILES: usize = 3;
const DOC_EXCERPT_CHARS: usize = 1500;

pub struct LlmSource {
    client: Arc<LlmClient>,
    builder: Option<Arc<ContextBuilder>>,
    threshold: RwLock<f64>,
}

impl LlmSource {
    pub fn new(client: Arc<LlmClient>, config: &AutopilotConfig) -> Self {
        Self {
            client,
            builder: None,
            threshold: RwLock::new(config.intervention_threshold),
        }
    }

    /// Include the cached project summary in prompts.
    pub fn with_context_builder(mut self, builder: Arc<ContextBuilder>) -> Self {
        self.builder = Some(builder);
        self
    }

    async fn project_notes(&self, root: &Path) -> String {
        let mut notes = Vec::new();

        if let Some(builder) = &self.builder {
            let project = builder.build_project_context(root).await;
            notes.push(ContextBuilder::summarize(&project));
        }

        for (name, excerpt) in read_doc_excerpts(root).await {
            notes.push(format!("### {}\n{}", name, excerpt));
        }

        notes.join("\n\n")
    }
}

/// Up to three documentation excerpts, each truncated to a fixed budget.
pub async fn read_doc_excerpts(root: &Path) -> Vec<(&'static str, String)> {
    let mut excerpts = Vec::new();
    for name in DOC_FILES {
        if excerpts.len() >= MAX_DOC_FILES {
            break;
        }
        match tokio::fs::read_to_string(root.join(name)).await {
            Ok(content) if !content.trim().is_empty() => {
                excerpts.push((*name, truncate_chars(content.trim(), DOC_EXCERPT_CHARS)));
            }
            _ => {}
        }
    }
    excerpts
}

fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((i, _)) => format!("{}…", &text[..i]),
        None => text.to_string(),
    }
}

#[async_trait]
impl GuidanceSource for LlmSource {
    fn id(&self) -> &str {
        LLM_SOURCE_ID
    }

    fn priority(&self) -> u32 {
        priority::LLM
    }

    fn can_short_circuit(&self) -> bool {
        false
    }

    async fn analyze(&self, context: &AnalysisContext) -> EngineResult<GuidanceResult> {
        if context.is_empty() {
            return Ok(GuidanceResult::no_guidance(LLM_SOURCE_ID, priority::LLM, "No output to analyze"));
        }

        let notes = self.project_notes(context.project_path()).await;
        let notes = (!notes.is_empty()).then_some(notes);
        let decision = self
            .client
            .analyze_output(&context.terminal_output, notes.as_deref())
            .await;

        if let Some(category) = &decision.error_category {
            let mut result = GuidanceResult::no_guidance(LLM_SOURCE_ID, priority::LLM, decision.reasoning.clone());
            result.error = Some(category.clone());
            return Ok(result.with_metadata("errorCategory", json!(category)));
        }

        let threshold = *self.threshold.read();
        let result = match decision.guidance.as_deref().map(str::trim) {
            Some(guidance) if decision.should_intervene && !guidance.is_empty() => {
                if decision.confidence >= threshold {
                    GuidanceResult::intervene(
                        LLM_SOURCE_ID,
                        priority::LLM,
                        decision.confidence,
                        guidance,
                        decision.reasoning.clone(),
                    )
                } else {
                    debug!(
                        "LLM confidence {:.2} below threshold {:.2}",
                        decision.confidence, threshold
                    );
                    GuidanceResult::no_guidance(
                        LLM_SOURCE_ID,
                        priority::LLM,
                        format!(
                            "Below intervention threshold ({:.2} < {:.2}): {}",
                            decision.confidence, threshold, decision.reasoning
                        ),
                    )
                    .with_confidence(decision.confidence)
                }
            }
            _ => GuidanceResult::no_guidance(LLM_SOURCE_ID, priority::LLM, decision.reasoning.clone())
                .with_confidence(decision.confidence),
        };

        Ok(result.with_metadata("model", json!(self.client.model())))
    }

    fn update_config(&self, config: &AutopilotConfig) {
        *self.threshold.write() = config.intervention_threshold;
        self.client.update_config(config.clone());
    }

    fn is_available(&self) -> bool {
        self.client.is_configured()
    }
}
