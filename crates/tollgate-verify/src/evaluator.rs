//! A safety evaluator backed by a reasoning model.
//!
//! `ModelSafetyEvaluator` renders a judgment prompt from a rubric, the policy
//! profile and the enriched tool-call request, asks its model for a decision,
//! and validates the reply with `DecisionVerifier`. The model's output is
//! never trusted: text that is not a schema-conforming JSON decision is a
//! `GateEvaluation` error, which the gate treats as a denial.
//!
//! The user's intent is left out of the prompt unless `include_user_intent`
//! is set.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tracing::debug;

use tollgate_contracts::{
    error::{TollgateError, TollgateResult},
    policy::{PolicyProfile, RawDecision, ToolCallRequest},
};
use tollgate_core::{
    agent::Agent,
    traits::{Model, ModelRequest, SafetyEvaluator},
};

use crate::schema::DecisionVerifier;

const DECISION_FORMAT: &str = "Reply with a single JSON object and nothing else: \
{\"decision\": \"allow\" | \"deny\" | \"needs_human\", \"risk_level\": <integer 1-5>, \
\"reason\": <non-empty string>, \"policy_ref\": <optional string>}";

pub struct ModelSafetyEvaluator {
    model: Arc<dyn Model>,
    rubric: Vec<String>,
    include_user_intent: bool,
    verifier: DecisionVerifier,
}

impl ModelSafetyEvaluator {
    pub fn new<I, S>(model: Arc<dyn Model>, rubric: I) -> TollgateResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Ok(Self {
            model,
            rubric: rubric.into_iter().map(Into::into).collect(),
            include_user_intent: false,
            verifier: DecisionVerifier::new()?,
        })
    }

    pub fn include_user_intent(mut self, include: bool) -> Self {
        self.include_user_intent = include;
        self
    }

    /// The prompt sent to the model for `request`.
    pub fn judgment_prompt(
        &self,
        agent: &Agent,
        request: &ToolCallRequest,
        profile: &PolicyProfile,
    ) -> TollgateResult<String> {
        let mut context = Map::new();
        context.insert("tool_name".to_string(), json!(request.tool_name));
        context.insert("tool_kind".to_string(), json!(request.tool_kind));
        context.insert("args".to_string(), Value::Object(request.args.clone()));
        context.insert("target_tool".to_string(), json!(request.target_tool));
        context.insert("tool_catalog".to_string(), json!(request.tool_catalog));
        context.insert("capability_snapshot".to_string(), json!(request.capability_snapshot));
        if self.include_user_intent {
            context.insert("user_intent".to_string(), json!(request.user_intent));
        }

        let profile_json = serde_json::to_string(profile).map_err(|e| TollgateError::gate_evaluation(e.to_string()))?;
        let context_json = serde_json::to_string_pretty(&Value::Object(context))
            .map_err(|e| TollgateError::gate_evaluation(e.to_string()))?;

        let mut prompt = format!(
            "You judge whether agent '{}' may perform a tool call.\n\nRubric:\n",
            agent.name()
        );
        if self.rubric.is_empty() {
            prompt.push_str("- Use your best judgment.\n");
        }
        for line in &self.rubric {
            prompt.push_str("- ");
            prompt.push_str(line);
            prompt.push('\n');
        }
        prompt.push_str(&format!(
            "\nPolicy profile: {}\n\nTool call:\n{}\n\n{}",
            profile_json, context_json, DECISION_FORMAT
        ));
        Ok(prompt)
    }
}

#[async_trait]
impl SafetyEvaluator for ModelSafetyEvaluator {
    async fn evaluate(
        &self,
        agent: &Agent,
        request: &ToolCallRequest,
        profile: &PolicyProfile,
    ) -> TollgateResult<RawDecision> {
        let prompt = self.judgment_prompt(agent, request, profile)?;
        debug!(model = %self.model.name(), tool = %request.tool_name, "requesting safety judgment");

        let response = self
            .model
            .generate(ModelRequest {
                agent,
                input_text: &prompt,
                tool_calls: &[],
                stream: false,
            })
            .await?;

        let text = response
            .output_text
            .ok_or_else(|| TollgateError::gate_evaluation("safety model returned no text"))?;
        self.verifier.parse_text(&text)
    }
}
