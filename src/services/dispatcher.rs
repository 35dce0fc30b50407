//! Hook dispatcher: decodes one event, routes it through the common
//! bookkeeping and the active pattern engine, and funnels every failure
//! into a harmless `{}`.
//!
//! The dispatcher must never raise. Transient store trouble, validation
//! failures, and internal defects all log to stderr and degrade to a no-op;
//! only policy decisions surface to the user, through the `message` field.

use serde_json::Value;
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::{debug, error, warn};

use crate::adapters::learning::{HttpLearningClient, NullLearningSink};
use crate::adapters::sqlite::{
    SqliteAgentRepository, SqliteArtifactRepository, SqliteBreakerRepository,
    SqliteBroadcastRepository, SqliteClaimRepository, SqliteFindingRepository,
    SqliteSessionRepository,
};
use crate::domain::ident;
use crate::domain::models::{
    AgentStatus, Config, Decision, Finding, HookEvent, HookEventName, PatternContext,
};
use crate::domain::ports::{FindingRepository, LearningSink};
use crate::services::patterns::{PatternServices, PatternSet};
use crate::services::{
    AgentRegistryService, BlackboardService, ClaimService, CompositionGate, SessionSupervisor,
    StateTransferService,
};

/// Routes hook events to the active pattern engine.
pub struct HookDispatcher {
    supervisor: SessionSupervisor,
    registry: AgentRegistryService,
    findings: Arc<dyn FindingRepository>,
    patterns: PatternSet,
    config: Config,
    project: String,
}

impl HookDispatcher {
    /// Wire the full service graph over one store pool.
    pub fn from_pool(pool: SqlitePool, config: Config, project: impl Into<String>) -> Self {
        let claims = ClaimService::new(Arc::new(SqliteClaimRepository::new(pool.clone())));
        let supervisor = SessionSupervisor::new(
            Arc::new(SqliteSessionRepository::new(pool.clone())),
            claims,
        );
        let registry = AgentRegistryService::new(
            Arc::new(SqliteAgentRepository::new(pool.clone())),
            config.limits.agent_max_age_hours,
        );
        let blackboard = Arc::new(BlackboardService::new(Arc::new(
            SqliteBroadcastRepository::new(pool.clone()),
        )));

        let learning: Arc<dyn LearningSink> = match &config.learning.endpoint {
            Some(endpoint) => Arc::new(HttpLearningClient::new(
                endpoint.clone(),
                std::time::Duration::from_secs(config.learning.timeout_secs),
            )),
            None => Arc::new(NullLearningSink),
        };

        let services = PatternServices {
            registry: registry.clone(),
            blackboard: blackboard.clone(),
            transfer: StateTransferService::new(blackboard),
            artifacts: Arc::new(SqliteArtifactRepository::new(pool.clone())),
            breakers: Arc::new(SqliteBreakerRepository::new(pool.clone())),
            learning,
            max_agents: config.limits.max_agents,
        };

        Self {
            supervisor,
            registry,
            findings: Arc::new(SqliteFindingRepository::new(pool)),
            patterns: PatternSet::standard(services),
            config,
            project: project.into(),
        }
    }

    /// The active-session view (consumed by the `sessions` subcommand).
    pub fn supervisor(&self) -> &SessionSupervisor {
        &self.supervisor
    }

    /// Dispatch one event, resolving coordinates from the process
    /// environment. Infallible by construction.
    pub async fn dispatch(&self, event: &HookEvent) -> Decision {
        let ctx = PatternContext::from_env(self.config.breaker.clone());
        self.dispatch_with_ctx(event, &ctx).await
    }

    /// Dispatch with explicit coordinates (testable form).
    pub async fn dispatch_with_ctx(&self, event: &HookEvent, ctx: &PatternContext) -> Decision {
        // Out-of-grammar session ids make the whole event a no-op before any
        // store call sees them.
        if !ident::is_valid_id(&event.session_id) {
            warn!(session_id = %event.session_id, "invalid session id; ignoring event");
            return Decision::NoOp;
        }

        // Loop guard: a Stop fired while a stop hook already ran must
        // continue without side effects.
        if event.hook_event_name == HookEventName::Stop && event.stop_hook_active {
            return Decision::continue_empty();
        }

        let common = self.common_bookkeeping(event, ctx).await;

        if let Some(request) = &ctx.composition {
            let report = CompositionGate::validate(request);
            for warning in &report.warnings {
                warn!(warning, "composition warning");
            }
            if !report.valid {
                return Decision::block(format!(
                    "Invalid pattern composition: {}",
                    report.errors.join("; ")
                ));
            }
        }

        let Some(kind) = ctx.pattern else {
            return common.unwrap_or(Decision::NoOp);
        };
        let Some(engine) = self.patterns.engine_for(kind) else {
            error!(pattern = kind.as_str(), "no engine registered; invariant violated");
            return Decision::NoOp;
        };

        match engine.on_event(event, ctx).await {
            Ok(Decision::NoOp) => common.unwrap_or(Decision::NoOp),
            Ok(decision) => decision,
            Err(err) => {
                // Transient and validation failures never reach the host.
                warn!(pattern = kind.as_str(), error = %err, "pattern engine degraded to no-op");
                Decision::NoOp
            }
        }
    }

    /// Pattern-independent bookkeeping: heartbeats, registry lifecycle,
    /// sweeps, awareness, findings. Failures log and yield nothing.
    async fn common_bookkeeping(
        &self,
        event: &HookEvent,
        ctx: &PatternContext,
    ) -> Option<Decision> {
        match event.hook_event_name {
            HookEventName::SessionStart => {
                if let Err(err) = self.supervisor.heartbeat(&event.session_id, &self.project).await
                {
                    warn!(error = %err, "heartbeat failed");
                }
                if let Err(err) = self.supervisor.sweep().await {
                    warn!(error = %err, "supervisor sweep failed");
                }
                if let Err(err) = self.registry.sweep().await {
                    warn!(error = %err, "registry sweep failed");
                }
                match self
                    .supervisor
                    .awareness_context(&event.session_id, &self.project)
                    .await
                {
                    Ok(Some(context)) => Some(Decision::inject_context(context)),
                    Ok(None) => None,
                    Err(err) => {
                        warn!(error = %err, "awareness context failed");
                        None
                    }
                }
            }
            HookEventName::SubagentStart => {
                if let Err(err) = self.supervisor.heartbeat(&event.session_id, &self.project).await
                {
                    warn!(error = %err, "heartbeat failed");
                }
                if let Some(agent_id) = event.valid_agent_id() {
                    let mut agent = crate::domain::models::Agent::new(
                        agent_id.to_string(),
                        event.session_id.clone(),
                    );
                    agent.pattern = ctx.pattern.map(|p| p.as_str().to_string());
                    agent.parent_agent_id =
                        ctx.agent_id.clone().filter(|id| id.as_str() != agent_id);
                    if let Err(err) = self.registry.register(&agent).await {
                        warn!(error = %err, "agent registration failed");
                    }
                }
                None
            }
            HookEventName::SubagentStop => {
                if let Err(err) = self.supervisor.heartbeat(&event.session_id, &self.project).await
                {
                    warn!(error = %err, "heartbeat failed");
                }
                if let Some(agent_id) = event.valid_agent_id() {
                    let failure = event
                        .structured_output
                        .as_ref()
                        .and_then(|output| output.get("error"))
                        .and_then(Value::as_str)
                        .map(str::to_string);
                    let status = if failure.is_some() {
                        AgentStatus::Failed
                    } else {
                        AgentStatus::Completed
                    };
                    if let Err(err) = self
                        .registry
                        .complete(agent_id, status, failure.as_deref())
                        .await
                    {
                        warn!(error = %err, "agent completion failed");
                    }
                }
                None
            }
            HookEventName::UserPromptSubmit => {
                self.capture_tagged_prompt(event).await;
                None
            }
            HookEventName::PreCompact => {
                // The compaction is about to drop working context; keep a
                // restore point the next session can consult.
                let label = event.trigger.as_deref().unwrap_or("compact");
                let state = serde_json::json!({
                    "trigger": event.trigger.clone(),
                    "transcript_path": event.transcript_path.clone(),
                });
                if let Err(err) = self
                    .supervisor
                    .record_checkpoint(&event.session_id, label, state)
                    .await
                {
                    warn!(error = %err, "checkpoint not recorded");
                }
                None
            }
            _ => None,
        }
    }

    /// Persist tagged prompts: `[finding]` notes for cross-session recall,
    /// `[working-on]` declarations for the feature workspace view.
    async fn capture_tagged_prompt(&self, event: &HookEvent) {
        let Some(prompt) = event.user_prompt.as_deref() else {
            return;
        };

        if let Some((topic, body)) = parse_tag(prompt, "[finding") {
            let topic = if topic.is_empty() { "general" } else { topic };
            let finding = Finding::new(event.session_id.clone(), topic, body);
            if let Err(err) = self.findings.insert(&finding).await {
                warn!(error = %err, "finding capture failed");
            } else {
                debug!(topic = %finding.topic, "finding captured");
            }
            return;
        }

        if let Some((_, feature)) = parse_tag(prompt, "[working-on") {
            if let Err(err) = self
                .supervisor
                .declare_feature(&event.session_id, &self.project, feature)
                .await
            {
                warn!(error = %err, "feature declaration failed");
            }
        }
    }
}

/// Split `[tag:qualifier] body` into `(qualifier, body)`; both trimmed, body
/// required.
fn parse_tag<'a>(prompt: &'a str, opener: &str) -> Option<(&'a str, &'a str)> {
    let rest = prompt.strip_prefix(opener)?;
    let (qualifier, body) = rest.split_once(']')?;
    let qualifier = qualifier.strip_prefix(':').unwrap_or(qualifier).trim();
    let body = body.trim();
    if body.is_empty() {
        return None;
    }
    Some((qualifier, body))
}
