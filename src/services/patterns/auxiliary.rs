//! The remaining pattern contracts: generator-critic, hierarchical,
//! map-reduce, jury, chain-of-responsibility, adversarial, event-driven.
//!
//! These follow the swarm shape - broadcasts for signalling, distinct-sender
//! counting for progress - with small per-pattern gates on `Stop`.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Value};

use super::swarm::SwarmCore;
use super::{PatternEngine, PatternServices};
use crate::domain::models::{
    BroadcastType, Decision, HookEvent, HookEventName, PatternContext, PatternKind,
};

fn role_payload(ctx: &PatternContext) -> Value {
    json!({ "role": ctx.role_or_primary().as_str() })
}

/// Two-role loop: the critic's `done` gates the generator's next turn.
pub struct GeneratorCriticEngine {
    core: SwarmCore,
}

impl GeneratorCriticEngine {
    pub fn new(services: PatternServices) -> Self {
        Self { core: SwarmCore::new(services) }
    }

    async fn critic_has_reviewed(&self, swarm_id: &str) -> Result<bool> {
        let dones = self
            .core
            .services()
            .blackboard
            .read_by_type(swarm_id, &BroadcastType::Done, 50)
            .await?;
        Ok(dones
            .iter()
            .any(|b| b.payload.get("role").and_then(Value::as_str) == Some("critic")))
    }
}

#[async_trait]
impl PatternEngine for GeneratorCriticEngine {
    fn kind(&self) -> PatternKind {
        PatternKind::GeneratorCritic
    }

    async fn on_event(&self, event: &HookEvent, ctx: &PatternContext) -> Result<Decision> {
        match event.hook_event_name {
            HookEventName::SubagentStart => self.core.on_subagent_start(event, ctx).await,
            HookEventName::PreToolUse => self.core.inject_peer_context(event, ctx).await,
            HookEventName::SubagentStop => {
                self.core.on_subagent_stop(event, ctx, role_payload(ctx)).await
            }
            HookEventName::Stop => {
                if event.stop_hook_active {
                    return Ok(Decision::continue_empty());
                }
                let Some(swarm_id) = ctx.swarm_id.as_deref() else {
                    return Ok(Decision::NoOp);
                };
                if self.critic_has_reviewed(swarm_id).await? {
                    Ok(Decision::continue_with(
                        "Critic review recorded; incorporate its feedback into the final output.",
                    ))
                } else {
                    Ok(Decision::block(
                        "Waiting for the critic's review before finishing.",
                    ))
                }
            }
            _ => Ok(Decision::NoOp),
        }
    }
}

/// Parent/child tree tracked through `parent_agent_id`; the parent's `Stop`
/// blocks until every descendant completed.
pub struct HierarchicalEngine {
    core: SwarmCore,
}

impl HierarchicalEngine {
    pub fn new(services: PatternServices) -> Self {
        Self { core: SwarmCore::new(services) }
    }
}

#[async_trait]
impl PatternEngine for HierarchicalEngine {
    fn kind(&self) -> PatternKind {
        PatternKind::Hierarchical
    }

    async fn on_event(&self, event: &HookEvent, ctx: &PatternContext) -> Result<Decision> {
        match event.hook_event_name {
            HookEventName::SubagentStart => self.core.on_subagent_start(event, ctx).await,
            HookEventName::PostToolUse => self.core.on_post_tool_use(event, ctx).await,
            HookEventName::Stop => {
                if event.stop_hook_active {
                    return Ok(Decision::continue_empty());
                }
                let descendants: Vec<String> = self
                    .core
                    .services()
                    .registry
                    .list_running(Some(&event.session_id))
                    .await?
                    .into_iter()
                    .filter(|agent| agent.parent_agent_id.is_some())
                    .map(|agent| agent.id)
                    .collect();

                if descendants.is_empty() {
                    Ok(Decision::NoOp)
                } else {
                    Ok(Decision::block(format!(
                        "{} descendant agent(s) still running: {}.",
                        descendants.len(),
                        descendants.join(", ")
                    )))
                }
            }
            _ => Ok(Decision::NoOp),
        }
    }
}

/// Fan-out over swarm semantics; a distinguished reducer's completion
/// terminates the group.
pub struct MapReduceEngine {
    core: SwarmCore,
}

impl MapReduceEngine {
    pub fn new(services: PatternServices) -> Self {
        Self { core: SwarmCore::new(services) }
    }

    async fn reducer_done(&self, swarm_id: &str) -> Result<bool> {
        let dones = self
            .core
            .services()
            .blackboard
            .read_by_type(swarm_id, &BroadcastType::Done, 100)
            .await?;
        Ok(dones
            .iter()
            .any(|b| b.payload.get("role").and_then(Value::as_str) == Some("reducer")))
    }
}

#[async_trait]
impl PatternEngine for MapReduceEngine {
    fn kind(&self) -> PatternKind {
        PatternKind::MapReduce
    }

    async fn on_event(&self, event: &HookEvent, ctx: &PatternContext) -> Result<Decision> {
        match event.hook_event_name {
            HookEventName::SubagentStart => self.core.on_subagent_start(event, ctx).await,
            HookEventName::PostToolUse => self.core.on_post_tool_use(event, ctx).await,
            HookEventName::PreToolUse => self.core.inject_peer_context(event, ctx).await,
            HookEventName::SubagentStop => {
                self.core.on_subagent_stop(event, ctx, role_payload(ctx)).await
            }
            HookEventName::Stop => {
                if event.stop_hook_active {
                    return Ok(Decision::continue_empty());
                }
                let Some(swarm_id) = ctx.swarm_id.as_deref() else {
                    return Ok(Decision::NoOp);
                };
                if self.reducer_done(swarm_id).await? {
                    return Ok(Decision::continue_with(
                        "Reduce phase complete; the group result is final.",
                    ));
                }
                let (done, total) = self.core.services().blackboard.progress(swarm_id).await?;
                if total == 0 {
                    return Ok(Decision::NoOp);
                }
                if done < total {
                    return Ok(Decision::block(format!(
                        "Waiting for {} agent(s) to complete.",
                        total - done
                    )));
                }
                Ok(Decision::block(
                    "All mappers reported done but the reducer has not completed.",
                ))
            }
            _ => Ok(Decision::NoOp),
        }
    }
}

/// Quorum of independent verdicts.
pub struct JuryEngine {
    core: SwarmCore,
}

impl JuryEngine {
    pub fn new(services: PatternServices) -> Self {
        Self { core: SwarmCore::new(services) }
    }
}

#[async_trait]
impl PatternEngine for JuryEngine {
    fn kind(&self) -> PatternKind {
        PatternKind::Jury
    }

    async fn on_event(&self, event: &HookEvent, ctx: &PatternContext) -> Result<Decision> {
        match event.hook_event_name {
            HookEventName::SubagentStart => self.core.on_subagent_start(event, ctx).await,
            HookEventName::PostToolUse => self.core.on_post_tool_use(event, ctx).await,
            HookEventName::SubagentStop => {
                if let (Some(swarm_id), Some(agent_id)) =
                    (ctx.swarm_id.as_deref(), event.valid_agent_id())
                {
                    let verdict = event
                        .structured_output
                        .as_ref()
                        .and_then(|output| output.get("verdict"))
                        .cloned()
                        .unwrap_or(Value::Null);
                    self.core
                        .services()
                        .blackboard
                        .post(
                            swarm_id,
                            agent_id,
                            BroadcastType::Verdict,
                            json!({ "verdict": verdict }),
                        )
                        .await?;
                }
                self.core.on_subagent_stop(event, ctx, json!({})).await
            }
            HookEventName::Stop => {
                if event.stop_hook_active {
                    return Ok(Decision::continue_empty());
                }
                let Some(swarm_id) = ctx.swarm_id.as_deref() else {
                    return Ok(Decision::NoOp);
                };
                let verdicts = self
                    .core
                    .services()
                    .blackboard
                    .count_distinct_senders(swarm_id, Some(&BroadcastType::Verdict))
                    .await?;
                if verdicts >= ctx.jury_quorum {
                    Ok(Decision::continue_with(format!(
                        "Jury quorum reached: {verdicts} verdict(s) recorded \
                         (quorum {}).",
                        ctx.jury_quorum
                    )))
                } else {
                    Ok(Decision::block(format!(
                        "Jury incomplete: {verdicts} of {} required verdict(s) recorded.",
                        ctx.jury_quorum
                    )))
                }
            }
            _ => Ok(Decision::NoOp),
        }
    }
}

/// Ordered handlers: each produces a terminal result or passes onward.
pub struct ChainEngine {
    core: SwarmCore,
}

impl ChainEngine {
    pub fn new(services: PatternServices) -> Self {
        Self { core: SwarmCore::new(services) }
    }
}

#[async_trait]
impl PatternEngine for ChainEngine {
    fn kind(&self) -> PatternKind {
        PatternKind::ChainOfResponsibility
    }

    async fn on_event(&self, event: &HookEvent, ctx: &PatternContext) -> Result<Decision> {
        match event.hook_event_name {
            HookEventName::SubagentStart => self.core.on_subagent_start(event, ctx).await,
            HookEventName::PreToolUse => self.core.inject_peer_context(event, ctx).await,
            HookEventName::SubagentStop => {
                if let (Some(swarm_id), Some(agent_id)) =
                    (ctx.swarm_id.as_deref(), event.valid_agent_id())
                {
                    let output = event.structured_output.as_ref();
                    let resolved = output
                        .and_then(|o| o.get("resolved"))
                        .and_then(Value::as_bool)
                        .unwrap_or(false)
                        || output.is_some_and(|o| o.get("result").is_some());

                    if resolved {
                        self.core
                            .services()
                            .blackboard
                            .post(
                                swarm_id,
                                agent_id,
                                BroadcastType::Domain("resolved".to_string()),
                                output.cloned().unwrap_or_else(|| json!({})),
                            )
                            .await?;
                    } else {
                        let next = output
                            .and_then(|o| o.get("next"))
                            .cloned()
                            .unwrap_or(Value::Null);
                        self.core
                            .services()
                            .blackboard
                            .post(
                                swarm_id,
                                agent_id,
                                BroadcastType::Pass,
                                json!({ "next": next }),
                            )
                            .await?;
                    }
                }
                self.core.on_subagent_stop(event, ctx, json!({})).await
            }
            HookEventName::Stop => {
                if event.stop_hook_active {
                    return Ok(Decision::continue_empty());
                }
                let Some(swarm_id) = ctx.swarm_id.as_deref() else {
                    return Ok(Decision::NoOp);
                };
                let resolved = self
                    .core
                    .services()
                    .blackboard
                    .count_distinct_senders(swarm_id, Some(&BroadcastType::Domain("resolved".into())))
                    .await?;
                if resolved > 0 {
                    return Ok(Decision::continue_with(
                        "A chain handler produced a terminal result.",
                    ));
                }
                let (_, total) = self.core.services().blackboard.progress(swarm_id).await?;
                if total == 0 {
                    return Ok(Decision::NoOp);
                }
                Ok(Decision::block(
                    "No handler has produced a terminal result; the chain is still advancing.",
                ))
            }
            _ => Ok(Decision::NoOp),
        }
    }
}

/// Red/blue adversarial exchange; swarm completion is the only gate.
pub struct AdversarialEngine {
    core: SwarmCore,
}

impl AdversarialEngine {
    pub fn new(services: PatternServices) -> Self {
        Self { core: SwarmCore::new(services) }
    }
}

#[async_trait]
impl PatternEngine for AdversarialEngine {
    fn kind(&self) -> PatternKind {
        PatternKind::Adversarial
    }

    async fn on_event(&self, event: &HookEvent, ctx: &PatternContext) -> Result<Decision> {
        match event.hook_event_name {
            HookEventName::SubagentStart => self.core.on_subagent_start(event, ctx).await,
            HookEventName::PostToolUse => self.core.on_post_tool_use(event, ctx).await,
            HookEventName::PreToolUse => self.core.inject_peer_context(event, ctx).await,
            HookEventName::SubagentStop => {
                let side = event
                    .agent_type
                    .clone()
                    .map(Value::String)
                    .unwrap_or(Value::Null);
                self.core
                    .on_subagent_stop(event, ctx, json!({ "side": side }))
                    .await
            }
            HookEventName::Stop => self.core.on_stop(event, ctx).await,
            _ => Ok(Decision::NoOp),
        }
    }
}

/// Domain events on the blackboard; no blocking beyond swarm completion.
pub struct EventDrivenEngine {
    core: SwarmCore,
}

impl EventDrivenEngine {
    pub fn new(services: PatternServices) -> Self {
        Self { core: SwarmCore::new(services) }
    }
}

#[async_trait]
impl PatternEngine for EventDrivenEngine {
    fn kind(&self) -> PatternKind {
        PatternKind::EventDriven
    }

    async fn on_event(&self, event: &HookEvent, ctx: &PatternContext) -> Result<Decision> {
        match event.hook_event_name {
            HookEventName::SubagentStart => self.core.on_subagent_start(event, ctx).await,
            HookEventName::PostToolUse => self.core.on_post_tool_use(event, ctx).await,
            HookEventName::PreToolUse => self.core.inject_peer_context(event, ctx).await,
            HookEventName::SubagentStop => {
                self.core.on_subagent_stop(event, ctx, json!({})).await
            }
            HookEventName::Stop => self.core.on_stop(event, ctx).await,
            _ => Ok(Decision::NoOp),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{context, event, services};
    use super::*;
    use serde_json::json;

    fn stop_event() -> HookEvent {
        event(json!({ "hook_event_name": "Stop", "session_id": "s1" }))
    }

    fn subagent_stop(agent: &str, output: Option<Value>) -> HookEvent {
        let mut e = event(json!({
            "hook_event_name": "SubagentStop",
            "session_id": "s1",
            "agent_id": agent,
        }));
        e.structured_output = output;
        e
    }

    #[tokio::test]
    async fn test_generator_blocks_until_critic_reviews() {
        let engine = GeneratorCriticEngine::new(services().await);
        let generator_ctx = context(&[
            ("PATTERN_TYPE", "generator_critic"),
            ("SWARM_ID", "gc1"),
            ("AGENT_ROLE", "generator"),
        ]);
        let critic_ctx = context(&[
            ("PATTERN_TYPE", "generator_critic"),
            ("SWARM_ID", "gc1"),
            ("AGENT_ROLE", "critic"),
        ]);

        engine
            .on_event(&subagent_stop("gen-1", None), &generator_ctx)
            .await
            .unwrap();
        let decision = engine.on_event(&stop_event(), &generator_ctx).await.unwrap();
        assert!(matches!(decision, Decision::Block { .. }));

        engine
            .on_event(&subagent_stop("critic-1", None), &critic_ctx)
            .await
            .unwrap();
        let decision = engine.on_event(&stop_event(), &generator_ctx).await.unwrap();
        assert!(matches!(decision, Decision::Continue { .. }));
    }

    #[tokio::test]
    async fn test_hierarchical_blocks_on_running_descendants() {
        let engine = HierarchicalEngine::new(services().await);
        let ctx = context(&[
            ("PATTERN_TYPE", "hierarchical"),
            ("SWARM_ID", "h1"),
            ("AGENT_ID", "parent-1"),
        ]);

        // Parent spawns a child through Task.
        let spawn = event(json!({
            "hook_event_name": "PostToolUse",
            "session_id": "s1",
            "tool_name": "Task",
            "tool_response": { "agentId": "child-1" },
        }));
        engine.on_event(&spawn, &ctx).await.unwrap();

        let decision = engine.on_event(&stop_event(), &ctx).await.unwrap();
        match decision {
            Decision::Block { message } => assert!(message.contains("child-1")),
            other => panic!("expected block, got {other:?}"),
        }

        // Child completes through the registry; the parent may stop.
        engine
            .core
            .services()
            .registry
            .complete("child-1", crate::domain::models::AgentStatus::Completed, None)
            .await
            .unwrap();
        let decision = engine.on_event(&stop_event(), &ctx).await.unwrap();
        assert_eq!(decision, Decision::NoOp);
    }

    #[tokio::test]
    async fn test_map_reduce_waits_for_reducer() {
        let engine = MapReduceEngine::new(services().await);
        let mapper_ctx = context(&[
            ("PATTERN_TYPE", "map_reduce"),
            ("SWARM_ID", "mr1"),
            ("AGENT_ROLE", "primary"),
        ]);
        let reducer_ctx = context(&[
            ("PATTERN_TYPE", "map_reduce"),
            ("SWARM_ID", "mr1"),
            ("AGENT_ROLE", "reducer"),
        ]);

        engine
            .on_event(&subagent_stop("m1", None), &mapper_ctx)
            .await
            .unwrap();
        let decision = engine.on_event(&stop_event(), &mapper_ctx).await.unwrap();
        assert!(matches!(decision, Decision::Block { .. }));

        engine
            .on_event(&subagent_stop("r1", None), &reducer_ctx)
            .await
            .unwrap();
        let decision = engine.on_event(&stop_event(), &mapper_ctx).await.unwrap();
        match decision {
            Decision::Continue { message: Some(message), .. } => {
                assert!(message.contains("Reduce phase complete"));
            }
            other => panic!("expected reduce completion, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_jury_quorum() {
        let engine = JuryEngine::new(services().await);
        let ctx = context(&[
            ("PATTERN_TYPE", "jury"),
            ("SWARM_ID", "j1"),
            ("JURY_QUORUM", "2"),
        ]);

        engine
            .on_event(
                &subagent_stop("juror-1", Some(json!({ "verdict": "approve" }))),
                &ctx,
            )
            .await
            .unwrap();
        let decision = engine.on_event(&stop_event(), &ctx).await.unwrap();
        match decision {
            Decision::Block { message } => assert!(message.contains("1 of 2")),
            other => panic!("expected block, got {other:?}"),
        }

        engine
            .on_event(
                &subagent_stop("juror-2", Some(json!({ "verdict": "reject" }))),
                &ctx,
            )
            .await
            .unwrap();
        let decision = engine.on_event(&stop_event(), &ctx).await.unwrap();
        assert!(matches!(decision, Decision::Continue { .. }));
    }

    #[tokio::test]
    async fn test_chain_resolution() {
        let engine = ChainEngine::new(services().await);
        let ctx = context(&[
            ("PATTERN_TYPE", "chain_of_responsibility"),
            ("SWARM_ID", "ch1"),
        ]);

        engine
            .on_event(
                &subagent_stop("h1", Some(json!({ "next": "h2" }))),
                &ctx,
            )
            .await
            .unwrap();
        let decision = engine.on_event(&stop_event(), &ctx).await.unwrap();
        assert!(matches!(decision, Decision::Block { .. }));

        engine
            .on_event(
                &subagent_stop("h2", Some(json!({ "resolved": true, "result": "patched" }))),
                &ctx,
            )
            .await
            .unwrap();
        let decision = engine.on_event(&stop_event(), &ctx).await.unwrap();
        assert!(matches!(decision, Decision::Continue { .. }));
    }

    #[tokio::test]
    async fn test_adversarial_completes_like_swarm() {
        let engine = AdversarialEngine::new(services().await);
        let ctx = context(&[("PATTERN_TYPE", "adversarial"), ("SWARM_ID", "adv1")]);

        let spawn = event(json!({
            "hook_event_name": "PostToolUse",
            "session_id": "s1",
            "tool_name": "Task",
            "tool_response": { "agentId": "red-1" },
        }));
        engine.on_event(&spawn, &ctx).await.unwrap();

        let decision = engine.on_event(&stop_event(), &ctx).await.unwrap();
        assert!(matches!(decision, Decision::Block { .. }));

        engine
            .on_event(&subagent_stop("red-1", None), &ctx)
            .await
            .unwrap();
        let decision = engine.on_event(&stop_event(), &ctx).await.unwrap();
        assert!(matches!(decision, Decision::Continue { .. }));
    }
}
