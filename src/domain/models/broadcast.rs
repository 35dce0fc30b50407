//! Blackboard broadcast model.
//!
//! Broadcasts are the append-only medium for all intra-swarm communication.
//! Delivery is at-least-once: consumers that care must be idempotent on
//! `(sender, type)`, and progress counting always folds through distinct
//! senders.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Well-known broadcast tags plus pattern-defined extensions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BroadcastType {
    /// An agent has been spawned into the swarm
    Started,
    /// An agent finished its work (optionally `{auto: true}`)
    Done,
    /// Serialized working state addressed to a successor
    StateTransfer,
    /// A `Task` spawn was observed
    TaskSpawned,
    /// A research note worth persisting
    Finding,
    /// Chain-of-responsibility advance signal
    Pass,
    /// Jury verdict
    Verdict,
    /// Pattern-defined domain tag
    #[serde(untagged)]
    Domain(String),
}

impl BroadcastType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Started => "started",
            Self::Done => "done",
            Self::StateTransfer => "state_transfer",
            Self::TaskSpawned => "task_spawned",
            Self::Finding => "finding",
            Self::Pass => "pass",
            Self::Verdict => "verdict",
            Self::Domain(tag) => tag,
        }
    }

    pub fn parse_str(s: &str) -> Self {
        match s {
            "started" => Self::Started,
            "done" => Self::Done,
            "state_transfer" => Self::StateTransfer,
            "task_spawned" => Self::TaskSpawned,
            "finding" => Self::Finding,
            "pass" => Self::Pass,
            "verdict" => Self::Verdict,
            other => Self::Domain(other.to_string()),
        }
    }
}

/// One append-only blackboard row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Broadcast {
    /// Row id
    pub id: String,
    /// Swarm/group the message belongs to
    pub swarm_id: String,
    /// Sending agent (or `unknown` when extraction failed validation)
    pub sender_agent: String,
    /// Message tag
    pub broadcast_type: BroadcastType,
    /// Opaque JSON payload
    pub payload: Value,
    /// Append time; ordering key together with id
    pub created_at: DateTime<Utc>,
}

impl Broadcast {
    /// Create a broadcast with a fresh row id.
    pub fn new(
        swarm_id: impl Into<String>,
        sender: impl Into<String>,
        broadcast_type: BroadcastType,
        payload: Value,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            swarm_id: swarm_id.into(),
            sender_agent: sender.into(),
            broadcast_type,
            payload,
            created_at: Utc::now(),
        }
    }

    /// A `done` marker recorded automatically on `SubagentStop`.
    pub fn auto_done(swarm_id: impl Into<String>, sender: impl Into<String>) -> Self {
        Self::new(
            swarm_id,
            sender,
            BroadcastType::Done,
            serde_json::json!({ "auto": true }),
        )
    }

    /// Target agent for `state_transfer` payloads.
    pub fn target_agent(&self) -> Option<&str> {
        self.payload.get("to").and_then(Value::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_round_trip() {
        for tag in ["started", "done", "state_transfer", "task_spawned", "finding"] {
            assert_eq!(BroadcastType::parse_str(tag).as_str(), tag);
        }
    }

    #[test]
    fn test_domain_tag_preserved() {
        let t = BroadcastType::parse_str("attack_vector");
        assert_eq!(t, BroadcastType::Domain("attack_vector".to_string()));
        assert_eq!(t.as_str(), "attack_vector");
    }

    #[test]
    fn test_auto_done_payload() {
        let b = Broadcast::auto_done("s1", "a1");
        assert_eq!(b.broadcast_type, BroadcastType::Done);
        assert_eq!(b.payload["auto"], serde_json::json!(true));
    }

    #[test]
    fn test_target_agent() {
        let b = Broadcast::new(
            "s1",
            "a_old",
            BroadcastType::StateTransfer,
            serde_json::json!({ "to": "a_new" }),
        );
        assert_eq!(b.target_agent(), Some("a_new"));
        assert_eq!(Broadcast::auto_done("s1", "a1").target_agent(), None);
    }
}
