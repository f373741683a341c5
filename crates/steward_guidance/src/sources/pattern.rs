//! Fast deterministic pattern source.
//!
//! Matches a fixed rule table against the raw output. No I/O, always
//! available, and allowed to short-circuit the cycle.

use async_trait::async_trait;
use regex::Regex;
use serde_json::json;
use steward_core::{AnalysisContext, GuidanceResult};
use tracing::{debug, warn};

use crate::error::EngineResult;
use crate::source::{priority, GuidanceSource};

pub const PATTERN_SOURCE_ID: &str = "pattern";

struct RuleDef {
    id: &'static str,
    regex: &'static str,
    /// Occurrences needed before the rule fires
    min_count: usize,
    confidence: f64,
    guidance: &'static str,
}

const RULES: &[RuleDef] = &[
    RuleDef {
        id: "destructive-rm",
        regex: r"rm\s+-(rf|fr|r)\s+(/|~|\*|\$HOME)(\s|$)",
        min_count: 1,
        confidence: 0.95,
        guidance: "Stop. Do not delete the root, home or wildcard paths; remove only the specific files you created.",
    },
    RuleDef {
        id: "force-push",
        regex: r"git push\s+(.*\s)?(-f|--force)(\s|$)",
        min_count: 1,
        confidence: 0.9,
        guidance: "Do not force-push. Pull and rebase, or use --force-with-lease if a rewrite is truly required.",
    },
    RuleDef {
        id: "context-limit",
        regex: r"(?i)context (window|length) (exceeded|limit)|prompt is too long|conversation is too long",
        min_count: 1,
        confidence: 0.85,
        guidance: "The context is full. Summarize progress so far and continue with a focused next step.",
    },
    RuleDef {
        id: "apology-loop",
        regex: r"(?i)\bI apologi[sz]e\b|\bsorry for the (confusion|error)\b",
        min_count: 3,
        confidence: 0.8,
        guidance: "You are repeating the same fix. Step back, re-read the error, and try a different approach.",
    },
    RuleDef {
        id: "repeated-retry",
        regex: r"(?i)\bretrying\b|\blet me try again\b",
        min_count: 4,
        confidence: 0.75,
        guidance: "Retries are not converging. Diagnose the root cause before trying again.",
    },
    RuleDef {
        id: "permission-denied",
        regex: r"(?i)permission denied|EACCES|operation not permitted",
        min_count: 2,
        confidence: 0.7,
        guidance: "Permissions are blocking you. Do not use sudo; work inside the project directory instead.",
    },
    RuleDef {
        id: "placeholder-code",
        regex: r"(?i)//\s*TODO:?\s*implement|unimplemented!\(\)|todo!\(\)|raise NotImplementedError|placeholder implementation",
        min_count: 1,
        confidence: 0.65,
        guidance: "Replace the placeholder with a real implementation before moving on.",
    },
];

struct PatternRule {
    def: &'static RuleDef,
    regex: Regex,
}

/// Regex rules over raw output, plus repeated-error detection.
pub struct PatternSource {
    rules: Vec<PatternRule>,
}

impl PatternSource {
    pub fn new() -> Self {
        let rules = RULES
            .iter()
            .filter_map(|def| match Regex::new(def.regex) {
                Ok(regex) => Some(PatternRule { def, regex }),
                Err(e) => {
                    warn!("Skipping pattern rule {}: {}", def.id, e);
                    None
                }
            })
            .collect();
        Self { rules }
    }

    fn result(&self, id: &str, count: usize, confidence: f64, guidance: &str) -> GuidanceResult {
        GuidanceResult::intervene(
            PATTERN_SOURCE_ID,
            priority::PATTERN,
            confidence,
            guidance,
            format!("Pattern '{}' matched {} time(s)", id, count),
        )
        .with_metadata("rule", json!(id))
        .with_metadata("matches", json!(count))
    }
}

impl Default for PatternSource {
    fn default() -> Self {
        Self::new()
    }
}

/// The same error line three or more times in the window.
fn repeated_error(output: &str) -> Option<(String, usize)> {
    let mut counts: Vec<(&str, usize)> = Vec::new();
    for line in output.lines().map(str::trim) {
        let lower = line.to_ascii_lowercase();
        if line.len() < 8 || !(lower.starts_with("error") || lower.contains("error:") || lower.contains("failed")) {
            continue;
        }
        match counts.iter_mut().find(|(l, _)| *l == line) {
            Some((_, n)) => *n += 1,
            None => counts.push((line, 1)),
        }
    }
    counts
        .into_iter()
        .filter(|(_, n)| *n >= 3)
        .max_by_key(|(_, n)| *n)
        .map(|(l, n)| (l.to_string(), n))
}

#[async_trait]
impl GuidanceSource for PatternSource {
    fn id(&self) -> &str {
        PATTERN_SOURCE_ID
    }

    fn priority(&self) -> u32 {
        priority::PATTERN
    }

    fn can_short_circuit(&self) -> bool {
        true
    }

    async fn analyze(&self, context: &AnalysisContext) -> EngineResult<GuidanceResult> {
        let output = &context.terminal_output;

        // Rules are ordered by confidence, so the first hit is the strongest
        for rule in &self.rules {
            let count = rule.regex.find_iter(output).count();
            if count >= rule.def.min_count {
                debug!("Pattern rule {} matched {} time(s)", rule.def.id, count);
                return Ok(self.result(rule.def.id, count, rule.def.confidence, rule.def.guidance));
            }
        }

        if let Some((line, count)) = repeated_error(output) {
            debug!("Repeated error line seen {} times", count);
            return Ok(self
                .result(
                    "repeated-error",
                    count,
                    0.8,
                    "The same error keeps appearing. Stop retrying the same fix and investigate the cause.",
                )
                .with_metadata("line", json!(line)));
        }

        Ok(GuidanceResult::no_guidance(
            PATTERN_SOURCE_ID,
            priority::PATTERN,
            "No known problem patterns in output",
        ))
    }
}
