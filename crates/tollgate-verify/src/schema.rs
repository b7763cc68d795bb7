//! Structural validation of safety decisions.
//!
//! `DecisionVerifier` checks an untrusted JSON value against the decision
//! JSON Schema with the `jsonschema` crate and only then deserializes it into
//! a `RawDecision`. All schema violations are collected into one error so the
//! operator sees the full failure set at once.

use serde_json::{json, Value};
use tracing::warn;

use tollgate_contracts::{
    error::{TollgateError, TollgateResult},
    policy::RawDecision,
};

/// JSON Schema of the structured decision a safety evaluator must produce.
pub fn decision_schema() -> Value {
    json!({
        "$schema": "http://json-schema.org/draft-07/schema#",
        "type": "object",
        "required": ["decision", "risk_level", "reason"],
        "properties": {
            "decision": { "enum": ["allow", "deny", "needs_human"] },
            "risk_level": { "type": "integer", "minimum": 1, "maximum": 5 },
            "reason": { "type": "string", "minLength": 1 },
            "policy_ref": { "type": "string", "minLength": 1 }
        }
    })
}

pub struct DecisionVerifier {
    validator: jsonschema::Validator,
}

impl DecisionVerifier {
    pub fn new() -> TollgateResult<Self> {
        let validator = jsonschema::validator_for(&decision_schema())
            .map_err(|e| TollgateError::gate_evaluation(format!("invalid decision schema: {e}")))?;
        Ok(Self { validator })
    }

    /// Validate `value` and deserialize it.
    pub fn verify(&self, value: &Value) -> TollgateResult<RawDecision> {
        let violations: Vec<String> = self
            .validator
            .iter_errors(value)
            .map(|error| format!("{} at '{}'", error, error.instance_path))
            .collect();

        if !violations.is_empty() {
            let message = violations.join("; ");
            warn!(%message, "safety decision violates the decision schema");
            return Err(TollgateError::gate_evaluation(format!(
                "decision does not match the schema: {message}"
            )));
        }

        serde_json::from_value(value.clone())
            .map_err(|e| TollgateError::gate_evaluation(format!("decision could not be read: {e}")))
    }

    /// Parse model text as a decision.
    ///
    /// The text must contain exactly one JSON object; surrounding prose or a
    /// Markdown code fence is tolerated. Anything else is a `GateEvaluation`
    /// error.
    pub fn parse_text(&self, text: &str) -> TollgateResult<RawDecision> {
        let object = match (text.find('{'), text.rfind('}')) {
            (Some(start), Some(end)) if start < end => &text[start..=end],
            _ => {
                return Err(TollgateError::gate_evaluation(
                    "model output does not contain a JSON object",
                ))
            }
        };
        let value: Value = serde_json::from_str(object)
            .map_err(|e| TollgateError::gate_evaluation(format!("model output is not valid JSON: {e}")))?;
        self.verify(&value)
    }
}
