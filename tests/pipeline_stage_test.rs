//! Pipeline staging over the full dispatcher: artifact flow, the missing
//! upstream scenario, and mandatory-contract blocking.

mod common;

use common::{ctx, dispatcher, event};
use serde_json::json;
use stigmergy::domain::models::{Decision, HookEvent, HookEventName, PatternContext};

fn stage_ctx(stage: &str, mandatory: bool) -> PatternContext {
    let mut pairs = vec![
        ("PATTERN_TYPE", "pipeline"),
        ("PIPELINE_ID", "p1"),
        ("STAGE_INDEX", stage),
    ];
    if mandatory {
        pairs.push(("PIPELINE_MANDATORY", "true"));
    }
    ctx(&pairs)
}

fn stage_start() -> HookEvent {
    event(json!({
        "hook_event_name": "SubagentStart",
        "session_id": "sess-1",
        "agent_id": "stage-agent",
    }))
}

fn stage_stop(output: serde_json::Value) -> HookEvent {
    let mut e = event(json!({
        "hook_event_name": "SubagentStop",
        "session_id": "sess-1",
        "agent_id": "stage-agent",
    }));
    e.structured_output = Some(output);
    e
}

#[tokio::test]
async fn artifacts_flow_downstream_in_order() {
    let dispatcher = dispatcher().await;

    dispatcher
        .dispatch_with_ctx(
            &stage_stop(json!({ "artifact_content": "architecture plan", "artifact_type": "plan" })),
            &stage_ctx("0", false),
        )
        .await;
    dispatcher
        .dispatch_with_ctx(
            &stage_stop(json!({ "artifact_path": "build/impl.rs", "artifact_type": "file" })),
            &stage_ctx("1", false),
        )
        .await;

    let decision = dispatcher
        .dispatch_with_ctx(&stage_start(), &stage_ctx("2", false))
        .await;
    match decision {
        Decision::Continue { additional_context: Some(context), .. } => {
            assert!(context.contains("architecture plan"));
            assert!(context.contains("build/impl.rs"));
            let plan_pos = context.find("architecture plan").unwrap();
            let impl_pos = context.find("build/impl.rs").unwrap();
            assert!(plan_pos < impl_pos, "stage 0 must precede stage 1");
        }
        other => panic!("expected artifact context, got {other:?}"),
    }
}

#[tokio::test]
async fn missing_upstream_blocks_under_mandatory_contract() {
    let dispatcher = dispatcher().await;

    // Stage 2 with zero artifacts for stages 0-1.
    let decision = dispatcher
        .dispatch_with_ctx(&stage_start(), &stage_ctx("2", true))
        .await;
    match &decision {
        Decision::Block { message } => {
            assert!(message.contains("stage(s) 0, 1"));
        }
        other => panic!("expected block, got {other:?}"),
    }

    // SubagentStart does not honor block at the host; it degrades to
    // continue with the same message.
    let body = decision.to_json(HookEventName::SubagentStart);
    assert_eq!(body["result"], json!("continue"));
    assert!(body["message"].as_str().unwrap().contains("stage(s) 0, 1"));
}

#[tokio::test]
async fn missing_upstream_is_advisory_without_contract() {
    let dispatcher = dispatcher().await;
    let decision = dispatcher
        .dispatch_with_ctx(&stage_start(), &stage_ctx("2", false))
        .await;
    match decision {
        Decision::Continue { message: Some(message), .. } => {
            assert!(message.contains("No upstream artifacts"));
        }
        other => panic!("expected advisory continue, got {other:?}"),
    }
}

#[tokio::test]
async fn stage_without_artifact_blocks_when_mandatory() {
    let dispatcher = dispatcher().await;

    let decision = dispatcher
        .dispatch_with_ctx(&stage_stop(json!({ "summary": "did things" })), &stage_ctx("1", true))
        .await;
    match &decision {
        Decision::Block { message } => {
            assert!(message.contains("produced no artifact"));
        }
        other => panic!("expected block, got {other:?}"),
    }

    // SubagentStop is a block-respecting event.
    let body = decision.to_json(HookEventName::SubagentStop);
    assert_eq!(body["result"], json!("block"));
}

#[tokio::test]
async fn fulfilled_mandatory_contract_passes() {
    let dispatcher = dispatcher().await;

    dispatcher
        .dispatch_with_ctx(
            &stage_stop(json!({ "artifact_content": "plan" })),
            &stage_ctx("0", true),
        )
        .await;
    dispatcher
        .dispatch_with_ctx(
            &stage_stop(json!({ "artifact_content": "impl" })),
            &stage_ctx("1", true),
        )
        .await;

    let decision = dispatcher
        .dispatch_with_ctx(&stage_start(), &stage_ctx("2", true))
        .await;
    match decision {
        Decision::Continue { additional_context: Some(_), .. } => {}
        other => panic!("expected artifact context, got {other:?}"),
    }
}
