//! Swarm pattern: peers coordinating over the blackboard.
//!
//! Swarm state is implicit in the broadcast log. The swarm is in progress
//! while fewer distinct senders have posted `done` than have posted
//! anything; the coordinator's `Stop` blocks until the counts meet.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::{PatternEngine, PatternServices};
use crate::domain::ident;
use crate::domain::models::{
    Agent, AgentState, Broadcast, BroadcastType, Decision, HookEvent, HookEventName,
    PatternContext, PatternKind,
};
use crate::domain::ports::{Confidence, LearningKind};

/// Shared swarm behavior; the swarm-shaped auxiliary patterns reuse it.
#[derive(Clone)]
pub(crate) struct SwarmCore {
    services: PatternServices,
}

impl SwarmCore {
    pub(crate) fn new(services: PatternServices) -> Self {
        Self { services }
    }

    /// `SubagentStart`: restore handoff state when enabled and addressed to
    /// this agent. Never blocks.
    pub(crate) async fn on_subagent_start(
        &self,
        event: &HookEvent,
        ctx: &PatternContext,
    ) -> Result<Decision> {
        let Some(swarm_id) = ctx.swarm_id.as_deref() else {
            return Ok(Decision::NoOp);
        };
        if !ctx.state_transfer {
            return Ok(Decision::NoOp);
        }
        let Some(agent_id) = event.valid_agent_id() else {
            return Ok(Decision::NoOp);
        };

        match self.services.transfer.restore(swarm_id, agent_id).await? {
            Some((state, from)) => Ok(Decision::continue_with(format!(
                "Restored handoff state from {from}: progress {}%, {} pending task(s).",
                state.progress,
                state.pending_tasks.len()
            ))),
            None => Ok(Decision::NoOp),
        }
    }

    /// `PostToolUse(tool=Task)`: record the spawn on the blackboard and in
    /// the registry, with an admission advisory past the fan-out cap.
    pub(crate) async fn on_post_tool_use(
        &self,
        event: &HookEvent,
        ctx: &PatternContext,
    ) -> Result<Decision> {
        let Some(swarm_id) = ctx.swarm_id.as_deref() else {
            return Ok(Decision::NoOp);
        };
        if !event.is_task_tool() {
            return Ok(Decision::NoOp);
        }

        let spawned = event.spawned_agent_id();
        if spawned != ident::UNKNOWN_ID {
            let mut agent = Agent::new(spawned.clone(), event.session_id.clone());
            agent.pattern = ctx.pattern.map(|p| p.as_str().to_string());
            agent.parent_agent_id = ctx.agent_id.clone();
            self.services.registry.register(&agent).await?;
        }

        let payload = json!({ "agent": spawned.clone(), "spawned_by": ctx.agent_id.clone() });
        self.services
            .blackboard
            .post(swarm_id, &spawned, BroadcastType::Started, payload)
            .await?;

        let running = self.services.registry.count_running().await?;
        if running as usize > self.services.max_agents {
            return Ok(Decision::continue_with(format!(
                "{running} agent(s) running exceeds the advisory cap of {}; consider waiting \
                 for completions before spawning more.",
                self.services.max_agents
            )));
        }
        Ok(Decision::NoOp)
    }

    /// `PreToolUse`: inject the most recent broadcasts from other senders.
    pub(crate) async fn inject_peer_context(
        &self,
        event: &HookEvent,
        ctx: &PatternContext,
    ) -> Result<Decision> {
        let Some(swarm_id) = ctx.swarm_id.as_deref() else {
            return Ok(Decision::NoOp);
        };
        let me = ctx.agent_id.as_deref().or_else(|| event.valid_agent_id());

        let broadcasts = self.services.blackboard.read(swarm_id, None, me).await?;
        if broadcasts.is_empty() {
            return Ok(Decision::NoOp);
        }

        let mut lines = vec![format!("Recent swarm activity ({swarm_id}):")];
        lines.extend(broadcasts.iter().map(describe));
        Ok(Decision::inject_context(lines.join("\n")))
    }

    /// `SubagentStop`: record `done`, publish handoff state when a target is
    /// set, and surface a synthesis hint when the swarm just completed.
    /// `extra` is merged into the done payload for role-bearing patterns.
    pub(crate) async fn on_subagent_stop(
        &self,
        event: &HookEvent,
        ctx: &PatternContext,
        extra: Value,
    ) -> Result<Decision> {
        let Some(swarm_id) = ctx.swarm_id.as_deref() else {
            return Ok(Decision::NoOp);
        };
        let sender = event
            .valid_agent_id()
            .unwrap_or(ident::UNKNOWN_ID)
            .to_string();

        let mut payload = json!({ "auto": true });
        if let (Value::Object(base), Value::Object(extra)) = (&mut payload, extra) {
            base.extend(extra);
        }
        self.services
            .blackboard
            .post(swarm_id, &sender, BroadcastType::Done, payload)
            .await?;

        if let Some(target) = ctx.handoff_target.as_deref() {
            let state = event
                .structured_output
                .as_ref()
                .map(AgentState::from_structured_output)
                .unwrap_or_default();
            if let Err(err) = self
                .services
                .transfer
                .publish(swarm_id, &sender, target, &state)
                .await
            {
                // Validation failures skip the publish; the hook continues.
                warn!(swarm_id, %sender, target, error = %err, "handoff state not published");
            }
        }

        let (done, total) = self.services.blackboard.progress(swarm_id).await?;
        if total > 0 && done >= total {
            let _ = self
                .services
                .learning
                .store(
                    &event.session_id,
                    LearningKind::WorkingSolution,
                    &format!("Swarm {swarm_id} completed with {total} agent(s)"),
                    "swarm coordination",
                    Confidence::Medium,
                )
                .await;
            return Ok(Decision::continue_with(synthesis_hint(done)));
        }
        debug!(swarm_id, done, total, "swarm progress");
        Ok(Decision::NoOp)
    }

    /// Coordinator `Stop`: block while agents are outstanding.
    pub(crate) async fn on_stop(
        &self,
        event: &HookEvent,
        ctx: &PatternContext,
    ) -> Result<Decision> {
        if event.stop_hook_active {
            return Ok(Decision::continue_empty());
        }
        let Some(swarm_id) = ctx.swarm_id.as_deref() else {
            return Ok(Decision::NoOp);
        };

        let (done, total) = self.services.blackboard.progress(swarm_id).await?;
        if total == 0 {
            return Ok(Decision::NoOp);
        }
        if done < total {
            return Ok(Decision::block(format!(
                "Waiting for {} agent(s) to complete.",
                total - done
            )));
        }
        Ok(Decision::continue_with(synthesis_hint(done)))
    }

    pub(crate) fn services(&self) -> &PatternServices {
        &self.services
    }
}

fn synthesis_hint(done: u64) -> String {
    format!("All {done} swarm agent(s) reported done. Synthesize their combined results.")
}

fn describe(broadcast: &Broadcast) -> String {
    let detail = match &broadcast.payload {
        Value::Object(map) if !map.is_empty() => {
            let rendered = serde_json::to_string(&broadcast.payload).unwrap_or_default();
            let mut snippet: String = rendered.chars().take(120).collect();
            if rendered.chars().count() > 120 {
                snippet.push('…');
            }
            format!(" {snippet}")
        }
        _ => String::new(),
    };
    format!(
        "  [{}] {}:{}",
        broadcast.broadcast_type.as_str(),
        broadcast.sender_agent,
        detail
    )
}

/// The swarm pattern proper.
pub struct SwarmEngine {
    core: SwarmCore,
}

impl SwarmEngine {
    pub fn new(services: PatternServices) -> Self {
        Self { core: SwarmCore::new(services) }
    }
}

#[async_trait]
impl PatternEngine for SwarmEngine {
    fn kind(&self) -> PatternKind {
        PatternKind::Swarm
    }

    async fn on_event(&self, event: &HookEvent, ctx: &PatternContext) -> Result<Decision> {
        match event.hook_event_name {
            HookEventName::SubagentStart => self.core.on_subagent_start(event, ctx).await,
            HookEventName::PostToolUse => self.core.on_post_tool_use(event, ctx).await,
            HookEventName::PreToolUse => self.core.inject_peer_context(event, ctx).await,
            HookEventName::SubagentStop => self.core.on_subagent_stop(event, ctx, json!({})).await,
            HookEventName::Stop => self.core.on_stop(event, ctx).await,
            _ => Ok(Decision::NoOp),
        }
    }
}
