//! Adaptive circuit breaker pattern.
//!
//! A primary agent's tool outcomes drive the breaker; a fallback agent runs
//! when the circuit is open. Briefings inform each role of the current
//! state; no breaker event ever blocks the host.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use tracing::info;

use super::{PatternEngine, PatternServices};
use crate::domain::models::{
    AgentRole, BreakerOutcome, CircuitState, Decision, HookEvent, HookEventName, PatternContext,
    PatternKind,
};
use crate::domain::ports::{Confidence, LearningKind};

/// Classify a tool response. A failure is a `Bash` call exiting non-zero or
/// any response carrying an `error` field; everything else is a success.
pub(crate) fn classify(event: &HookEvent) -> BreakerOutcome {
    let response = event.tool_response.as_ref();

    if event.tool_name.as_deref() == Some("Bash") {
        let exit_code = response
            .and_then(|r| r.get("exit_code"))
            .and_then(Value::as_i64)
            .unwrap_or(0);
        if exit_code != 0 {
            return BreakerOutcome::Failure;
        }
    }

    if response.is_some_and(|r| !r.get("error").map_or(true, Value::is_null)) {
        return BreakerOutcome::Failure;
    }

    BreakerOutcome::Success
}

/// Failure-rate governor over one breaker id.
pub struct CircuitBreakerEngine {
    services: PatternServices,
}

impl CircuitBreakerEngine {
    pub fn new(services: PatternServices) -> Self {
        Self { services }
    }

    async fn briefing(&self, cb_id: &str, ctx: &PatternContext) -> Result<Decision> {
        let state = self
            .services
            .breakers
            .get(cb_id)
            .await?
            .map(|record| record.state)
            .unwrap_or(CircuitState::Closed);

        let message = match (ctx.role_or_primary(), state) {
            (AgentRole::Fallback, _) => format!(
                "Circuit '{cb_id}' briefing: you are the degraded, safer backup path. \
                 Prefer conservative, reversible actions."
            ),
            (_, CircuitState::Closed) => format!(
                "Circuit '{cb_id}' briefing: closed - monitored normal operation."
            ),
            (_, CircuitState::HalfOpen) => format!(
                "Circuit '{cb_id}' briefing: half-open - a single failure reopens the circuit."
            ),
            (_, CircuitState::Open) => format!(
                "Circuit '{cb_id}' briefing: open - failures exceeded the adaptive threshold; \
                 a fallback agent should carry the work."
            ),
        };
        Ok(Decision::continue_with(message))
    }

    async fn on_post_tool_use(
        &self,
        event: &HookEvent,
        cb_id: &str,
        ctx: &PatternContext,
    ) -> Result<Decision> {
        // Only the primary's outcomes drive the breaker.
        if ctx.role_or_primary() != AgentRole::Primary {
            return Ok(Decision::NoOp);
        }

        let outcome = classify(event);
        let before = self
            .services
            .breakers
            .get(cb_id)
            .await?
            .map(|record| record.state);
        let record = self
            .services
            .breakers
            .apply(cb_id, outcome, &ctx.tuning)
            .await?;

        let decision = match (before.unwrap_or(CircuitState::Closed), record.state) {
            (CircuitState::Closed, CircuitState::Open) => Decision::continue_with(format!(
                "Circuit '{cb_id}' opened after {} failure(s) (adaptive threshold {}). \
                 Route further work through the fallback.",
                record.failure_count, record.current_threshold
            )),
            (CircuitState::HalfOpen, CircuitState::Open) => Decision::continue_with(format!(
                "Circuit '{cb_id}' reopened: the recovery probe failed."
            )),
            (CircuitState::Open, CircuitState::HalfOpen) => Decision::continue_with(format!(
                "Circuit '{cb_id}' half-open: first success observed, probing recovery."
            )),
            (CircuitState::HalfOpen, CircuitState::Closed) => {
                let _ = self
                    .services
                    .learning
                    .store(
                        &event.session_id,
                        LearningKind::ErrorFix,
                        &format!("Circuit {cb_id} recovered to closed"),
                        "circuit breaker recovery",
                        Confidence::Medium,
                    )
                    .await;
                Decision::continue_with(format!(
                    "Circuit '{cb_id}' closed: recovery confirmed."
                ))
            }
            _ => Decision::NoOp,
        };
        Ok(decision)
    }
}

#[async_trait]
impl PatternEngine for CircuitBreakerEngine {
    fn kind(&self) -> PatternKind {
        PatternKind::CircuitBreaker
    }

    async fn on_event(&self, event: &HookEvent, ctx: &PatternContext) -> Result<Decision> {
        let Some(cb_id) = ctx.cb_id.as_deref() else {
            return Ok(Decision::NoOp);
        };

        match event.hook_event_name {
            HookEventName::SubagentStart => self.briefing(cb_id, ctx).await,
            HookEventName::PostToolUse => self.on_post_tool_use(event, cb_id, ctx).await,
            HookEventName::SubagentStop => {
                if let Some(record) = self.services.breakers.get(cb_id).await? {
                    info!(cb_id, summary = %record.summary(), "breaker status at agent stop");
                }
                Ok(Decision::NoOp)
            }
            HookEventName::Stop => {
                if event.stop_hook_active {
                    return Ok(Decision::continue_empty());
                }
                match self.services.breakers.get(cb_id).await? {
                    Some(record) => Ok(Decision::continue_with(record.summary())),
                    None => Ok(Decision::NoOp),
                }
            }
            _ => Ok(Decision::NoOp),
        }
    }
}
