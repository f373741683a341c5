//! The LLM verdict and its response contract.
//!
//! The model must answer with a JSON object:
//!
//! ```json
//! {"shouldIntervene": true, "guidance": "...", "confidence": 0.8, "reasoning": "..."}
//! ```
//!
//! Anything that is not JSON, or JSON of a different shape, is a client-side
//! error. It is never read as a valid "do not intervene" answer.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{LlmError, LlmResult};

/// LLM-specific verdict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutopilotDecision {
    pub should_intervene: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guidance: Option<String>,
    pub confidence: f64,
    pub reasoning: String,
    /// Failure category when the decision stands in for an error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_category: Option<String>,
}

impl AutopilotDecision {
    /// Structural non-intervening decision carrying the error text.
    pub fn from_error(err: &LlmError) -> Self {
        Self {
            should_intervene: false,
            guidance: None,
            confidence: 0.0,
            reasoning: err.to_string(),
            error_category: Some(err.category().to_string()),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error_category.is_some()
    }
}

/// Parse and validate a raw model reply.
pub fn parse_decision(raw: &str) -> LlmResult<AutopilotDecision> {
    let json = extract_json_object(raw)
        .ok_or_else(|| LlmError::MalformedJson(format!("no JSON object in reply: {}", preview(raw))))?;

    let value: Value =
        serde_json::from_str(json).map_err(|e| LlmError::MalformedJson(e.to_string()))?;

    let obj = value
        .as_object()
        .ok_or_else(|| LlmError::InvalidShape("reply is not a JSON object".to_string()))?;

    let should_intervene = match obj.get("shouldIntervene") {
        Some(Value::Bool(b)) => *b,
        Some(_) => return Err(LlmError::InvalidShape("`shouldIntervene` must be a boolean".into())),
        None => return Err(LlmError::InvalidShape("missing field `shouldIntervene`".into())),
    };

    let confidence = match obj.get("confidence") {
        Some(Value::Number(n)) => n
            .as_f64()
            .ok_or_else(|| LlmError::InvalidShape("`confidence` is not a finite number".into()))?,
        Some(_) => return Err(LlmError::InvalidShape("`confidence` must be a number".into())),
        None => return Err(LlmError::InvalidShape("missing field `confidence`".into())),
    };

    let reasoning = match obj.get("reasoning") {
        Some(Value::String(s)) => s.clone(),
        Some(_) => return Err(LlmError::InvalidShape("`reasoning` must be a string".into())),
        None => return Err(LlmError::InvalidShape("missing field `reasoning`".into())),
    };

    let guidance = match obj.get("guidance") {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Some(Value::String(_)) | Some(Value::Null) | None => None,
        Some(_) => return Err(LlmError::InvalidShape("`guidance` must be a string".into())),
    };

    let mut decision = AutopilotDecision {
        should_intervene,
        guidance,
        confidence: confidence.clamp(0.0, 1.0),
        reasoning,
        error_category: None,
    };

    // An intervention with nothing to say is not an intervention.
    if decision.should_intervene && decision.guidance.is_none() {
        decision.should_intervene = false;
    }

    Ok(decision)
}

/// Locate the first balanced `{...}` object, skipping markdown fences and prose.
fn extract_json_object(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let bytes = raw.as_bytes();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, &b) in bytes[start..].iter().enumerate() {
        if in_string {
            match b {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&raw[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }

    None
}

fn preview(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.chars().count() > 80 {
        format!("{}…", trimmed.chars().take(80).collect::<String>())
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_reply() {
        let raw = r#"{"shouldIntervene": true, "guidance": "Run the tests", "confidence": 0.82, "reasoning": "Tests were skipped"}"#;
        let decision = parse_decision(raw).unwrap();
        assert!(decision.should_intervene);
        assert_eq!(decision.guidance.as_deref(), Some("Run the tests"));
        assert_eq!(decision.confidence, 0.82);
        assert!(!decision.is_error());
    }

    #[test]
    fn test_parse_fenced_reply_with_prose() {
        let raw = "Here you go:\n```json\n{\"shouldIntervene\": false, \"confidence\": 0.1, \"reasoning\": \"all good {fine}\"}\n```";
        let decision = parse_decision(raw).unwrap();
        assert!(!decision.should_intervene);
        assert_eq!(decision.reasoning, "all good {fine}");
    }

    #[test]
    fn test_not_json_is_malformed() {
        let err = parse_decision("I think you should run the tests.").unwrap_err();
        assert_eq!(err.category(), "malformed-json");
        assert!(err.to_string().contains("parsing"));

        let err = parse_decision("{\"shouldIntervene\": tru").unwrap_err();
        assert_eq!(err.category(), "malformed-json");
    }

    #[test]
    fn test_missing_fields_are_shape_errors() {
        for raw in [
            r#"{"confidence": 0.5, "reasoning": "x"}"#,
            r#"{"shouldIntervene": false, "reasoning": "x"}"#,
            r#"{"shouldIntervene": false, "confidence": 0.5}"#,
        ] {
            let err = parse_decision(raw).unwrap_err();
            assert_eq!(err.category(), "invalid-shape", "input: {}", raw);
            assert!(err.to_string().contains("shape"));
        }
    }

    #[test]
    fn test_wrong_types_are_shape_errors() {
        let err = parse_decision(r#"{"shouldIntervene": "yes", "confidence": 0.5, "reasoning": "x"}"#)
            .unwrap_err();
        assert!(matches!(err, LlmError::InvalidShape(_)));

        let err = parse_decision(r#"{"shouldIntervene": true, "confidence": "high", "reasoning": "x"}"#)
            .unwrap_err();
        assert!(matches!(err, LlmError::InvalidShape(_)));
    }

    #[test]
    fn test_confidence_clamped_and_empty_guidance_downgraded() {
        let decision = parse_decision(
            r#"{"shouldIntervene": true, "guidance": "  ", "confidence": 3, "reasoning": "x"}"#,
        )
        .unwrap();
        assert_eq!(decision.confidence, 1.0);
        assert!(!decision.should_intervene);
    }

    #[test]
    fn test_from_error_is_non_intervening() {
        let decision = AutopilotDecision::from_error(&LlmError::MalformedJson("bad".into()));
        assert!(!decision.should_intervene);
        assert_eq!(decision.confidence, 0.0);
        assert_eq!(decision.error_category.as_deref(), Some("malformed-json"));
    }
}
