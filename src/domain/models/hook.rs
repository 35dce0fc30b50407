//! Hook protocol types.
//!
//! The host CLI invokes the runtime once per lifecycle event with a JSON
//! object on stdin and expects exactly one JSON object on stdout: `{}` for a
//! no-op, or `{"result": "continue" | "block", ...}`. Pattern selection and
//! group coordinates arrive through environment variables, not the event
//! body.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::breaker::BreakerTuning;
use super::composition::{CompositionRequest, PatternKind, ScopeOperator, SequenceOperator};
use crate::domain::ident;

/// Maximum bytes of any user-visible message.
pub const MAX_MESSAGE_BYTES: usize = 2048;

/// Lifecycle events emitted by the host CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HookEventName {
    SessionStart,
    UserPromptSubmit,
    PreToolUse,
    PostToolUse,
    SubagentStart,
    SubagentStop,
    Stop,
    PreCompact,
    SessionEnd,
}

impl HookEventName {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SessionStart => "SessionStart",
            Self::UserPromptSubmit => "UserPromptSubmit",
            Self::PreToolUse => "PreToolUse",
            Self::PostToolUse => "PostToolUse",
            Self::SubagentStart => "SubagentStart",
            Self::SubagentStop => "SubagentStop",
            Self::Stop => "Stop",
            Self::PreCompact => "PreCompact",
            Self::SessionEnd => "SessionEnd",
        }
    }

    /// Events where the host honors a `block` result. Elsewhere a block is
    /// advisory and is downgraded to `continue`.
    pub fn respects_block(&self) -> bool {
        matches!(self, Self::Stop | Self::SubagentStop)
    }
}

/// One decoded hook event. Unknown fields are ignored; event-specific fields
/// are optional so a sparse body never fails decoding outright.
#[derive(Debug, Clone, Deserialize)]
pub struct HookEvent {
    pub hook_event_name: HookEventName,
    pub session_id: String,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub tool_name: Option<String>,
    #[serde(default)]
    pub tool_input: Option<Value>,
    #[serde(default)]
    pub tool_response: Option<Value>,
    #[serde(default)]
    pub agent_id: Option<String>,
    #[serde(default)]
    pub agent_type: Option<String>,
    #[serde(default)]
    pub stop_hook_active: bool,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub trigger: Option<String>,
    #[serde(default)]
    pub transcript_path: Option<String>,
    #[serde(default)]
    pub user_prompt: Option<String>,
    /// Structured output reported by a stopping agent
    #[serde(default)]
    pub structured_output: Option<Value>,
}

impl HookEvent {
    /// The event's agent id, when present and well-formed.
    pub fn valid_agent_id(&self) -> Option<&str> {
        self.agent_id.as_deref().and_then(ident::checked)
    }

    /// True when this event reports a `Task` tool invocation.
    pub fn is_task_tool(&self) -> bool {
        self.tool_name.as_deref() == Some("Task")
    }

    /// Extract the spawned agent id from a `Task` tool response. Falls back
    /// to `unknown` when the response carries no id matching the grammar.
    pub fn spawned_agent_id(&self) -> String {
        let candidate = self.tool_response.as_ref().and_then(|response| {
            ["agentId", "agent_id", "subagent_id", "id"]
                .iter()
                .find_map(|key| response.get(key).and_then(Value::as_str))
        });
        candidate
            .and_then(ident::checked)
            .unwrap_or(ident::UNKNOWN_ID)
            .to_string()
    }
}

/// Role the current agent plays within its pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentRole {
    Primary,
    Fallback,
    Generator,
    Critic,
    Reducer,
}

impl AgentRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Fallback => "fallback",
            Self::Generator => "generator",
            Self::Critic => "critic",
            Self::Reducer => "reducer",
        }
    }

    pub fn parse_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "primary" => Some(Self::Primary),
            "fallback" => Some(Self::Fallback),
            "generator" => Some(Self::Generator),
            "critic" => Some(Self::Critic),
            "reducer" => Some(Self::Reducer),
            _ => None,
        }
    }
}

/// Coordination coordinates resolved from the environment for one event.
#[derive(Debug, Clone)]
pub struct PatternContext {
    pub pattern: Option<PatternKind>,
    pub swarm_id: Option<String>,
    pub cb_id: Option<String>,
    pub agent_role: Option<AgentRole>,
    pub agent_id: Option<String>,
    pub pipeline_id: Option<String>,
    pub stage_index: Option<i64>,
    pub state_transfer: bool,
    pub handoff_target: Option<String>,
    pub pipeline_mandatory: bool,
    pub composition: Option<CompositionRequest>,
    pub tuning: BreakerTuning,
    /// Verdicts required for a jury to conclude
    pub jury_quorum: u64,
}

impl PatternContext {
    /// Resolve the context from the process environment, layering `CB_*`
    /// overrides on top of the configured breaker tuning.
    pub fn from_env(base_tuning: BreakerTuning) -> Self {
        Self::from_vars(|name| std::env::var(name).ok(), base_tuning)
    }

    /// Resolve from an arbitrary variable source (testable form).
    pub fn from_vars(
        lookup: impl Fn(&str) -> Option<String>,
        base_tuning: BreakerTuning,
    ) -> Self {
        let checked_id = |name: &str| {
            lookup(name).and_then(|v| ident::checked(&v).map(str::to_string))
        };
        let truthy = |name: &str| {
            lookup(name)
                .map(|v| matches!(v.to_lowercase().as_str(), "true" | "1" | "yes"))
                .unwrap_or(false)
        };

        let pattern = lookup("PATTERN_TYPE").and_then(|v| PatternKind::parse_str(&v));

        let composition = pattern.and_then(|first| {
            let second = lookup("COMPOSE_WITH").and_then(|v| PatternKind::parse_str(&v))?;
            let scope = lookup("COMPOSE_SCOPE")
                .and_then(|v| ScopeOperator::parse_str(&v))
                .unwrap_or(ScopeOperator::Handoff);
            let sequence = lookup("COMPOSE_SEQ")
                .and_then(|v| SequenceOperator::parse_str(&v))
                .unwrap_or(SequenceOperator::Sequential);
            Some(CompositionRequest { first, second, scope, sequence })
        });

        let mut tuning = base_tuning;
        if let Some(v) = lookup("CB_INITIAL_THRESHOLD").and_then(|v| v.parse().ok()) {
            tuning.initial_threshold = v;
        }
        if let Some(v) = lookup("CB_MIN_THRESHOLD").and_then(|v| v.parse().ok()) {
            tuning.min_threshold = v;
        }
        if let Some(v) = lookup("CB_MAX_THRESHOLD").and_then(|v| v.parse().ok()) {
            tuning.max_threshold = v;
        }
        if let Some(v) = lookup("CB_ADAPTATION_RATE").and_then(|v| v.parse().ok()) {
            tuning.adaptation_rate = v;
        }
        if let Some(v) = lookup("CB_WINDOW_SECONDS").and_then(|v| v.parse().ok()) {
            tuning.window_seconds = v;
        }
        if tuning.validate().is_err() {
            tuning = BreakerTuning::default();
        }

        Self {
            pattern,
            swarm_id: checked_id("SWARM_ID"),
            cb_id: checked_id("CB_ID"),
            agent_role: lookup("AGENT_ROLE").and_then(|v| AgentRole::parse_str(&v)),
            agent_id: checked_id("AGENT_ID"),
            pipeline_id: checked_id("PIPELINE_ID"),
            stage_index: lookup("STAGE_INDEX").and_then(|v| v.parse().ok()),
            state_transfer: truthy("SWARM_STATE_TRANSFER"),
            handoff_target: checked_id("SWARM_HANDOFF_TARGET"),
            pipeline_mandatory: truthy("PIPELINE_MANDATORY"),
            composition,
            tuning,
            jury_quorum: lookup("JURY_QUORUM")
                .and_then(|v| v.parse().ok())
                .filter(|&q| q > 0)
                .unwrap_or(3),
        }
    }

    /// Role with the breaker default applied.
    pub fn role_or_primary(&self) -> AgentRole {
        self.agent_role.unwrap_or(AgentRole::Primary)
    }

    /// True when no coordination variable selects a pattern or group.
    pub fn is_vacant(&self) -> bool {
        self.pattern.is_none()
            && self.swarm_id.is_none()
            && self.cb_id.is_none()
            && self.pipeline_id.is_none()
    }
}

/// Typed decision returned to the host.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// `{}` - nothing to say
    NoOp,
    /// Let the host proceed, optionally with a message and injected context
    Continue {
        message: Option<String>,
        additional_context: Option<String>,
        learning: Option<Value>,
    },
    /// Stop the host with a user-visible message. Only honored on `Stop` and
    /// `SubagentStop`; rendered as advisory `continue` elsewhere.
    Block { message: String },
}

impl Decision {
    pub fn continue_empty() -> Self {
        Self::Continue { message: None, additional_context: None, learning: None }
    }

    pub fn continue_with(message: impl Into<String>) -> Self {
        Self::Continue {
            message: Some(message.into()),
            additional_context: None,
            learning: None,
        }
    }

    pub fn inject_context(context: impl Into<String>) -> Self {
        Self::Continue {
            message: None,
            additional_context: Some(context.into()),
            learning: None,
        }
    }

    pub fn block(message: impl Into<String>) -> Self {
        Self::Block { message: message.into() }
    }

    pub fn with_learning(self, learning: Value) -> Self {
        match self {
            Self::Continue { message, additional_context, .. } => Self::Continue {
                message,
                additional_context,
                learning: Some(learning),
            },
            other => other,
        }
    }

    /// Render the wire form for the given event, downgrading `block` on
    /// events where the host treats it as advisory.
    pub fn to_json(&self, event: HookEventName) -> Value {
        match self {
            Self::NoOp => serde_json::json!({}),
            Self::Continue { message, additional_context, learning } => {
                let mut body = serde_json::json!({ "result": "continue" });
                if let Some(message) = message {
                    body["message"] = Value::String(truncate_message(message));
                }
                if let Some(context) = additional_context {
                    body["hookSpecificOutput"] = serde_json::json!({
                        "hookEventName": event.as_str(),
                        "additionalContext": truncate_message(context),
                    });
                }
                if let Some(learning) = learning {
                    body["learning"] = learning.clone();
                }
                body
            }
            Self::Block { message } => {
                let result = if event.respects_block() { "block" } else { "continue" };
                serde_json::json!({
                    "result": result,
                    "message": truncate_message(message),
                })
            }
        }
    }
}

/// Clip a message to the 2 KiB budget on a char boundary.
fn truncate_message(message: &str) -> String {
    if message.len() <= MAX_MESSAGE_BYTES {
        return message.to_string();
    }
    let mut end = MAX_MESSAGE_BYTES;
    while !message.is_char_boundary(end) {
        end -= 1;
    }
    message[..end].to_string()
}
