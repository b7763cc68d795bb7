//! Guardrails: ordered allow/deny hooks at the input, tool and output stages.
//!
//! Guardrails are coarse filters owned by the agent author. Authorization of
//! individual tool calls is the safety gate's job; a tool-stage guardrail can
//! only veto, never approve.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::warn;

use tollgate_contracts::{
    error::{TollgateError, TollgateResult},
    execution::RequestedToolCall,
};

use crate::agent::Agent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardrailStage {
    Input,
    Tool,
    Output,
}

impl GuardrailStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Input => "input",
            Self::Tool => "tool",
            Self::Output => "output",
        }
    }
}

impl fmt::Display for GuardrailStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a guardrail handler gets to look at.
#[derive(Debug, Clone, Copy)]
pub struct GuardrailCheck<'a> {
    pub stage: GuardrailStage,
    pub agent: &'a Agent,
    pub input_text: &'a str,
    /// Set at the tool stage.
    pub requested_call: Option<&'a RequestedToolCall>,
    /// Set at the output stage.
    pub final_output: Option<&'a str>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GuardrailVerdict {
    pub allow: bool,
    pub reason: Option<String>,
    pub metadata: Option<Map<String, Value>>,
}

impl GuardrailVerdict {
    pub fn allow() -> Self {
        Self {
            allow: true,
            ..Self::default()
        }
    }

    pub fn deny(reason: impl Into<String>) -> Self {
        Self {
            allow: false,
            reason: Some(reason.into()),
            metadata: None,
        }
    }
}

#[async_trait]
pub trait GuardrailHandler: Send + Sync {
    async fn check(&self, check: &GuardrailCheck<'_>) -> TollgateResult<GuardrailVerdict>;
}

/// Adapter turning a synchronous closure into a `GuardrailHandler`.
pub struct FnGuardrail<F> {
    f: F,
}

#[async_trait]
impl<F> GuardrailHandler for FnGuardrail<F>
where
    F: Fn(&GuardrailCheck<'_>) -> GuardrailVerdict + Send + Sync,
{
    async fn check(&self, check: &GuardrailCheck<'_>) -> TollgateResult<GuardrailVerdict> {
        Ok((self.f)(check))
    }
}

pub fn guardrail_fn<F>(f: F) -> Arc<dyn GuardrailHandler>
where
    F: Fn(&GuardrailCheck<'_>) -> GuardrailVerdict + Send + Sync + 'static,
{
    Arc::new(FnGuardrail { f })
}

/// Per-stage handler lists. An empty list is a no-op.
#[derive(Clone, Default)]
pub struct Guardrails {
    pub input: Vec<Arc<dyn GuardrailHandler>>,
    pub tool: Vec<Arc<dyn GuardrailHandler>>,
    pub output: Vec<Arc<dyn GuardrailHandler>>,
}

impl Guardrails {
    pub fn handlers(&self, stage: GuardrailStage) -> &[Arc<dyn GuardrailHandler>] {
        match stage {
            GuardrailStage::Input => &self.input,
            GuardrailStage::Tool => &self.tool,
            GuardrailStage::Output => &self.output,
        }
    }

    /// Run the handlers of `check.stage` in order. The first denial stops the
    /// chain and becomes a `GuardrailDenied` error.
    pub async fn enforce(&self, check: &GuardrailCheck<'_>) -> TollgateResult<()> {
        for handler in self.handlers(check.stage) {
            let verdict = handler.check(check).await?;
            if !verdict.allow {
                let reason = verdict
                    .reason
                    .filter(|r| !r.is_empty())
                    .unwrap_or_else(|| format!("Guardrail denied at {} stage.", check.stage));
                warn!(agent = %check.agent.name(), stage = %check.stage, reason = %reason, "guardrail denied");
                return Err(TollgateError::GuardrailDenied { reason });
            }
        }
        Ok(())
    }
}

impl fmt::Debug for Guardrails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Guardrails")
            .field("input", &self.input.len())
            .field("tool", &self.tool.len())
            .field("output", &self.output.len())
            .finish()
    }
}

// ── Static templates ─────────────────────────────────────────────────────────

/// A text predicate with a fixed denial reason.
pub struct StaticRule {
    pub deny_when: Box<dyn Fn(&str) -> bool + Send + Sync>,
    pub reason: String,
}

impl StaticRule {
    pub fn new(deny_when: impl Fn(&str) -> bool + Send + Sync + 'static, reason: impl Into<String>) -> Self {
        Self {
            deny_when: Box::new(deny_when),
            reason: reason.into(),
        }
    }

    /// Deny when the text contains `needle`, ignoring ASCII case.
    pub fn contains(needle: impl Into<String>, reason: impl Into<String>) -> Self {
        let needle = needle.into().to_ascii_lowercase();
        Self::new(move |text| text.to_ascii_lowercase().contains(&needle), reason)
    }
}

#[async_trait]
impl GuardrailHandler for StaticRule {
    async fn check(&self, check: &GuardrailCheck<'_>) -> TollgateResult<GuardrailVerdict> {
        let target = match check.stage {
            GuardrailStage::Output => check.final_output.unwrap_or(""),
            _ => check.input_text,
        };
        if (self.deny_when)(target) {
            Ok(GuardrailVerdict::deny(self.reason.clone()))
        } else {
            Ok(GuardrailVerdict::allow())
        }
    }
}

/// Build guardrails from static text rules. Input rules test the input text,
/// output rules the final output. Tool-stage handlers are taken as given.
pub fn guardrails_template(
    input_rules: Vec<StaticRule>,
    output_rules: Vec<StaticRule>,
    tool_handlers: Vec<Arc<dyn GuardrailHandler>>,
) -> Guardrails {
    let wrap = |rules: Vec<StaticRule>| {
        rules
            .into_iter()
            .map(|rule| Arc::new(rule) as Arc<dyn GuardrailHandler>)
            .collect::<Vec<_>>()
    };
    Guardrails {
        input: wrap(input_rules),
        tool: tool_handlers,
        output: wrap(output_rules),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    fn agent() -> Agent {
        Agent::builder("guarded", "test").build().unwrap()
    }

    fn check<'a>(agent: &'a Agent, stage: GuardrailStage, input: &'a str, output: Option<&'a str>) -> GuardrailCheck<'a> {
        GuardrailCheck {
            stage,
            agent,
            input_text: input,
            requested_call: None,
            final_output: output,
        }
    }

    #[tokio::test]
    async fn empty_stage_is_noop() {
        let agent = agent();
        let guardrails = Guardrails::default();
        guardrails
            .enforce(&check(&agent, GuardrailStage::Input, "anything", None))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn first_denial_stops_the_chain() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let (a, b, c) = (seen.clone(), seen.clone(), seen.clone());
        let guardrails = Guardrails {
            input: vec![
                guardrail_fn(move |_| {
                    a.lock().unwrap().push("first");
                    GuardrailVerdict::allow()
                }),
                guardrail_fn(move |_| {
                    b.lock().unwrap().push("second");
                    GuardrailVerdict::deny("blocked by second")
                }),
                guardrail_fn(move |_| {
                    c.lock().unwrap().push("third");
                    GuardrailVerdict::allow()
                }),
            ],
            ..Guardrails::default()
        };

        let agent = agent();
        let result = guardrails.enforce(&check(&agent, GuardrailStage::Input, "x", None)).await;
        match result {
            Err(TollgateError::GuardrailDenied { reason }) => assert_eq!(reason, "blocked by second"),
            other => panic!("expected GuardrailDenied, got {:?}", other),
        }
        assert_eq!(*seen.lock().unwrap(), vec!["first", "second"]);
    }

    #[tokio::test]
    async fn denial_without_reason_names_the_stage() {
        let guardrails = Guardrails {
            output: vec![guardrail_fn(|_| GuardrailVerdict {
                allow: false,
                ..GuardrailVerdict::default()
            })],
            ..Guardrails::default()
        };

        let agent = agent();
        let result = guardrails
            .enforce(&check(&agent, GuardrailStage::Output, "x", Some("y")))
            .await;
        match result {
            Err(TollgateError::GuardrailDenied { reason }) => {
                assert_eq!(reason, "Guardrail denied at output stage.")
            }
            other => panic!("expected GuardrailDenied, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn template_rules_test_the_right_text() {
        let guardrails = guardrails_template(
            vec![StaticRule::contains("rm -rf", "destructive input")],
            vec![StaticRule::contains("password", "secret in output")],
            vec![],
        );
        let agent = agent();

        // Input rule sees the input text only.
        guardrails
            .enforce(&check(&agent, GuardrailStage::Input, "list files", Some("rm -rf")))
            .await
            .unwrap();
        assert!(guardrails
            .enforce(&check(&agent, GuardrailStage::Input, "please RM -RF /", None))
            .await
            .is_err());

        // Output rule sees the final output only.
        guardrails
            .enforce(&check(&agent, GuardrailStage::Output, "password", Some("done")))
            .await
            .unwrap();
        match guardrails
            .enforce(&check(&agent, GuardrailStage::Output, "x", Some("the password is 1234")))
            .await
        {
            Err(TollgateError::GuardrailDenied { reason }) => assert_eq!(reason, "secret in output"),
            other => panic!("expected GuardrailDenied, got {:?}", other),
        }
    }
}
