//! Guidance orchestrator.
//!
//! Runs registered sources one at a time in ascending priority order and
//! composes a single attributed decision. Sources run sequentially so a
//! confident, short-circuiting source can stop the cycle before slower
//! sources (the LLM) are called.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use parking_lot::RwLock;
use serde_json::json;
use steward_context::ContextBuilder;
use steward_core::{AnalysisContext, AutopilotConfig, GuidanceResult};
use steward_llm::{LlmClient, ProviderRegistry};
use tracing::{debug, info, warn};

use crate::error::{EngineResult, GuidanceError};
use crate::registry::SourceRegistry;
use crate::source::GuidanceSource;
use crate::sources::{ContextAwareSource, LlmSource, PatternSource};

pub const ORCHESTRATOR_ID: &str = "orchestrator";

/// Minimum confidence for a short-circuit.
pub const SHORT_CIRCUIT_CONFIDENCE: f64 = 0.9;

#[derive(Default)]
pub struct GuidanceOrchestrator {
    registry: RwLock<SourceRegistry>,
}

impl GuidanceOrchestrator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Orchestrator over `sources`. Later duplicates of an id are ignored.
    pub fn with_sources(sources: Vec<Arc<dyn GuidanceSource>>) -> Self {
        let orchestrator = Self::new();
        for source in sources {
            if let Err(e) = orchestrator.add_source(source) {
                warn!("{}", e);
            }
        }
        orchestrator
    }

    /// The built-in pipeline: pattern rules, project context, then the LLM.
    pub fn standard(config: &AutopilotConfig) -> Self {
        let builder = Arc::new(ContextBuilder::new(config.context.clone()));
        let client = Arc::new(LlmClient::new(config.clone(), Arc::new(ProviderRegistry::builtin())));

        Self::with_sources(vec![
            Arc::new(PatternSource::new()),
            Arc::new(ContextAwareSource::new(builder.clone())),
            Arc::new(LlmSource::new(client, config).with_context_builder(builder)),
        ])
    }

    pub fn add_source(&self, source: Arc<dyn GuidanceSource>) -> EngineResult<()> {
        self.registry.write().register(source)
    }

    pub fn remove_source(&self, id: &str) -> bool {
        self.registry.write().unregister(id).is_some()
    }

    /// Source ids in evaluation order.
    pub fn source_ids(&self) -> Vec<String> {
        self.registry.read().ids().into_iter().map(String::from).collect()
    }

    /// Push a new configuration into every source.
    pub fn update_config(&self, config: &AutopilotConfig) {
        for source in self.registry.read().ordered() {
            source.update_config(config);
        }
    }

    /// Run one cycle over `context`. Never fails.
    pub async fn generate_guidance(&self, context: &AnalysisContext) -> GuidanceResult {
        let sources = self.registry.read().ordered();
        if sources.is_empty() {
            return GuidanceResult::no_guidance(ORCHESTRATOR_ID, u32::MAX, "No guidance sources registered");
        }

        let mut results: Vec<GuidanceResult> = Vec::with_capacity(sources.len());
        let mut skipped: Vec<String> = Vec::new();
        let mut short_circuited_by: Option<String> = None;

        for source in &sources {
            if !source.is_available() {
                debug!("Skipping unavailable source {}", source.id());
                skipped.push(source.id().to_string());
                continue;
            }

            let result = run_isolated(source.as_ref(), context).await;
            let stop = source.can_short_circuit()
                && !result.is_error()
                && result.should_intervene
                && result.confidence >= SHORT_CIRCUIT_CONFIDENCE;
            results.push(result);

            if stop {
                debug!("Source {} short-circuited the cycle", source.id());
                short_circuited_by = Some(source.id().to_string());
                break;
            }
        }

        let composed = compose(&results, short_circuited_by.as_deref());
        info!(
            "Cycle {}: {} ({} sources analyzed)",
            context.cycle_id,
            if composed.should_intervene {
                format!("guidance from {}", composed.source)
            } else {
                "no guidance".to_string()
            },
            results.len()
        );

        composed
            .with_metadata("sources", summarize(&results))
            .with_metadata("skipped", json!(skipped))
            .with_metadata("shortCircuited", json!(short_circuited_by))
    }
}

impl std::fmt::Debug for GuidanceOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GuidanceOrchestrator")
            .field("sources", &self.source_ids())
            .finish()
    }
}

/// Run one source, turning errors and panics into error-tagged results.
async fn run_isolated(source: &dyn GuidanceSource, context: &AnalysisContext) -> GuidanceResult {
    let id = source.id().to_string();
    let priority = source.priority();

    match AssertUnwindSafe(source.analyze(context)).catch_unwind().await {
        Ok(Ok(result)) => result,
        Ok(Err(e)) => {
            warn!("Guidance source {} failed: {}", id, e);
            GuidanceResult::failed(id, priority, e.to_string())
        }
        Err(_) => {
            let e = GuidanceError::SourcePanicked(id.clone());
            warn!("{}", e);
            GuidanceResult::failed(id, priority, e.to_string())
        }
    }
}

/// Pick the intervening, error-free result with the lowest priority number.
/// Ties keep the earliest result.
fn compose(results: &[GuidanceResult], short_circuited_by: Option<&str>) -> GuidanceResult {
    let winner = results
        .iter()
        .filter(|r| !r.is_error() && r.should_intervene)
        .min_by_key(|r| r.priority);

    let Some(winner) = winner else {
        let errors = results.iter().filter(|r| r.is_error()).count();
        let mut reasoning = format!("No source recommended intervention ({} analyzed", results.len());
        if errors > 0 {
            reasoning.push_str(&format!(", {} failed", errors));
        }
        reasoning.push(')');
        return GuidanceResult::no_guidance(ORCHESTRATOR_ID, u32::MAX, reasoning);
    };

    let mut composed = winner.clone();
    composed.reasoning = match short_circuited_by {
        Some(_) => format!(
            "{} [source: {}; short-circuited after {} of the registered sources]",
            winner.reasoning,
            winner.source,
            results.len()
        ),
        None => format!(
            "{} [source: {}; {} sources analyzed]",
            winner.reasoning,
            winner.source,
            results.len()
        ),
    };
    composed
}

fn summarize(results: &[GuidanceResult]) -> serde_json::Value {
    json!(results
        .iter()
        .map(|r| json!({
            "id": r.source,
            "shouldIntervene": r.should_intervene,
            "confidence": r.confidence,
            "priority": r.priority,
            "error": r.is_error(),
        }))
        .collect::<Vec<_>>())
}
