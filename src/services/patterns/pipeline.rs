//! Pipeline pattern: staged agents handing artifacts downstream.

use anyhow::Result;
use async_trait::async_trait;
use tracing::{debug, warn};

use super::{PatternEngine, PatternServices};
use crate::domain::models::{
    Decision, HookEvent, HookEventName, PatternContext, PatternKind, PipelineArtifact,
};

/// Stage coordination over persisted artifacts.
pub struct PipelineEngine {
    services: PatternServices,
}

impl PipelineEngine {
    pub fn new(services: PatternServices) -> Self {
        Self { services }
    }

    /// `SubagentStart`: inject upstream artifacts; under a mandatory
    /// contract, block when upstream stages produced nothing.
    async fn on_subagent_start(
        &self,
        pipeline_id: &str,
        stage_index: i64,
        ctx: &PatternContext,
    ) -> Result<Decision> {
        let artifacts = self
            .services
            .artifacts
            .list_upstream(pipeline_id, stage_index)
            .await?;

        if stage_index > 0 && ctx.pipeline_mandatory {
            let produced = self
                .services
                .artifacts
                .stages_with_output(pipeline_id, stage_index)
                .await?;
            let missing: Vec<String> = (0..stage_index)
                .filter(|stage| !produced.contains(stage))
                .map(|stage| stage.to_string())
                .collect();
            if !missing.is_empty() {
                return Ok(Decision::block(format!(
                    "Pipeline {pipeline_id} stage {stage_index} requires upstream artifacts, \
                     but stage(s) {} produced none.",
                    missing.join(", ")
                )));
            }
        }

        if artifacts.is_empty() {
            if stage_index > 0 {
                return Ok(Decision::continue_with(format!(
                    "No upstream artifacts recorded for pipeline {pipeline_id} \
                     (stages 0-{}).",
                    stage_index - 1
                )));
            }
            return Ok(Decision::NoOp);
        }

        let mut lines = vec![format!(
            "Upstream artifacts for pipeline {pipeline_id}, stage {stage_index}:"
        )];
        lines.extend(artifacts.iter().map(|a| format!("  {}", a.summary())));
        Ok(Decision::inject_context(lines.join("\n")))
    }

    /// `SubagentStop`: persist the stage's declared artifact; under a
    /// mandatory contract, block when the stage produced none.
    async fn on_subagent_stop(
        &self,
        event: &HookEvent,
        pipeline_id: &str,
        stage_index: i64,
        ctx: &PatternContext,
    ) -> Result<Decision> {
        let artifact = event
            .structured_output
            .as_ref()
            .and_then(|output| {
                PipelineArtifact::from_structured_output(pipeline_id, stage_index, output)
            });

        match artifact {
            Some(artifact) => {
                self.services.artifacts.append(&artifact).await?;
                debug!(pipeline_id, stage_index, "stage artifact recorded");
                Ok(Decision::NoOp)
            }
            None if ctx.pipeline_mandatory => Ok(Decision::block(format!(
                "Pipeline {pipeline_id} stage {stage_index} produced no artifact; \
                 downstream stages depend on its output."
            ))),
            None => {
                warn!(pipeline_id, stage_index, "stage finished without an artifact");
                Ok(Decision::NoOp)
            }
        }
    }
}

#[async_trait]
impl PatternEngine for PipelineEngine {
    fn kind(&self) -> PatternKind {
        PatternKind::Pipeline
    }

    async fn on_event(&self, event: &HookEvent, ctx: &PatternContext) -> Result<Decision> {
        let (Some(pipeline_id), Some(stage_index)) =
            (ctx.pipeline_id.as_deref(), ctx.stage_index)
        else {
            return Ok(Decision::NoOp);
        };

        match event.hook_event_name {
            HookEventName::SubagentStart => {
                self.on_subagent_start(pipeline_id, stage_index, ctx).await
            }
            HookEventName::SubagentStop => {
                if event.stop_hook_active {
                    return Ok(Decision::continue_empty());
                }
                self.on_subagent_stop(event, pipeline_id, stage_index, ctx).await
            }
            _ => Ok(Decision::NoOp),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{context, event, services};
    use super::*;
    use serde_json::json;

    async fn engine() -> PipelineEngine {
        PipelineEngine::new(services().await)
    }

    fn start_event() -> HookEvent {
        event(json!({
            "hook_event_name": "SubagentStart",
            "session_id": "s1",
            "agent_id": "stage-agent",
        }))
    }

    fn stop_event(output: serde_json::Value) -> HookEvent {
        let mut e = event(json!({
            "hook_event_name": "SubagentStop",
            "session_id": "s1",
            "agent_id": "stage-agent",
        }));
        e.structured_output = Some(output);
        e
    }

    fn stage_ctx(stage: &str, mandatory: bool) -> PatternContext {
        let mut pairs = vec![
            ("PATTERN_TYPE", "pipeline"),
            ("PIPELINE_ID", "p1"),
            ("STAGE_INDEX", stage),
        ];
        if mandatory {
            pairs.push(("PIPELINE_MANDATORY", "true"));
        }
        context(&pairs)
    }

    #[tokio::test]
    async fn test_stage_zero_start_is_quiet() {
        let engine = engine().await;
        let decision = engine
            .on_event(&start_event(), &stage_ctx("0", false))
            .await
            .unwrap();
        assert_eq!(decision, Decision::NoOp);
    }

    #[tokio::test]
    async fn test_artifact_flows_to_next_stage() {
        let engine = engine().await;

        engine
            .on_event(
                &stop_event(json!({ "artifact_content": "design notes", "artifact_type": "plan" })),
                &stage_ctx("0", false),
            )
            .await
            .unwrap();

        let decision = engine
            .on_event(&start_event(), &stage_ctx("1", false))
            .await
            .unwrap();
        match decision {
            Decision::Continue { additional_context: Some(context), .. } => {
                assert!(context.contains("design notes"));
                assert!(context.contains("stage 0"));
            }
            other => panic!("expected artifact context, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_missing_upstream_advisory_when_optional() {
        let engine = engine().await;
        let decision = engine
            .on_event(&start_event(), &stage_ctx("2", false))
            .await
            .unwrap();
        match decision {
            Decision::Continue { message: Some(message), .. } => {
                assert!(message.contains("stages 0-1"));
            }
            other => panic!("expected advisory, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_missing_upstream_blocks_when_mandatory() {
        let engine = engine().await;
        let decision = engine
            .on_event(&start_event(), &stage_ctx("2", true))
            .await
            .unwrap();
        match decision {
            Decision::Block { message } => {
                assert!(message.contains("stage(s) 0, 1"));
            }
            other => panic!("expected block, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_partially_missing_upstream_names_gaps() {
        let engine = engine().await;
        engine
            .on_event(
                &stop_event(json!({ "artifact_content": "plan" })),
                &stage_ctx("0", true),
            )
            .await
            .unwrap();

        let decision = engine
            .on_event(&start_event(), &stage_ctx("2", true))
            .await
            .unwrap();
        match decision {
            Decision::Block { message } => {
                assert!(message.contains("stage(s) 1"));
                assert!(!message.contains("stage(s) 0,"));
            }
            other => panic!("expected block, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_stop_without_artifact_blocks_when_mandatory() {
        let engine = engine().await;
        let decision = engine
            .on_event(&stop_event(json!({})), &stage_ctx("1", true))
            .await
            .unwrap();
        match decision {
            Decision::Block { message } => {
                assert!(message.contains("produced no artifact"));
            }
            other => panic!("expected block, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_missing_coordinates_is_noop() {
        let engine = engine().await;
        let ctx = context(&[("PATTERN_TYPE", "pipeline")]);
        let decision = engine.on_event(&start_event(), &ctx).await.unwrap();
        assert_eq!(decision, Decision::NoOp);
    }
}
