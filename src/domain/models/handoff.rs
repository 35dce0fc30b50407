//! Serialized agent state for handoff between agents.
//!
//! A departing agent's working state (context bag, memory, progress, pending
//! tasks) is serialized with a 32-bit integrity checksum and published as a
//! `state_transfer` broadcast addressed to its successor. The successor
//! verifies the checksum before restoring; a mismatch discards the transfer.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Serialized state larger than this is rejected.
pub const MAX_STATE_BYTES: usize = 1024 * 1024;

/// Handoff failure kinds.
#[derive(Debug, Error)]
pub enum HandoffError {
    #[error("serialized state is {0} bytes, exceeding the {MAX_STATE_BYTES} byte limit")]
    StateTooLarge(usize),

    #[error("state checksum mismatch: expected {expected:#010x}, computed {computed:#010x}")]
    ChecksumMismatch { expected: u32, computed: u32 },

    #[error("state payload is not valid JSON: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("progress {0} outside [0, 100]")]
    InvalidProgress(u8),
}

/// The working state an agent carries across a handoff.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentState {
    /// Free-form context bag
    #[serde(default)]
    pub context: Map<String, Value>,
    /// Accumulated memory notes
    #[serde(default)]
    pub memory: Map<String, Value>,
    /// Completion estimate in percent
    #[serde(default)]
    pub progress: u8,
    /// Work the successor should pick up
    #[serde(default, rename = "pendingTasks")]
    pub pending_tasks: Vec<String>,
}

impl Default for AgentState {
    fn default() -> Self {
        Self {
            context: Map::new(),
            memory: Map::new(),
            progress: 0,
            pending_tasks: Vec::new(),
        }
    }
}

impl AgentState {
    /// Build a state snapshot from an agent's structured output, tolerating
    /// missing fields. Progress is clamped into [0, 100].
    pub fn from_structured_output(output: &Value) -> Self {
        let mut state: Self = serde_json::from_value(output.clone()).unwrap_or_default();
        state.progress = state.progress.min(100);
        state
    }

    /// Serialize to the canonical JSON wire form.
    pub fn encode(&self) -> Result<String, HandoffError> {
        let body = serde_json::to_string(self)?;
        if body.len() > MAX_STATE_BYTES {
            return Err(HandoffError::StateTooLarge(body.len()));
        }
        Ok(body)
    }
}

/// A checksummed, addressed state transfer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateEnvelope {
    /// Departing agent
    pub from: String,
    /// Successor the state is addressed to
    pub to: String,
    /// Canonical JSON of the [`AgentState`]
    pub state: String,
    /// CRC-32 of the state bytes
    pub checksum: u32,
}

impl StateEnvelope {
    /// Seal a state snapshot for transfer.
    pub fn seal(
        from: impl Into<String>,
        to: impl Into<String>,
        state: &AgentState,
    ) -> Result<Self, HandoffError> {
        let body = state.encode()?;
        let checksum = crc32fast::hash(body.as_bytes());
        Ok(Self {
            from: from.into(),
            to: to.into(),
            state: body,
            checksum,
        })
    }

    /// Verify the checksum and decode the carried state.
    pub fn open(&self) -> Result<AgentState, HandoffError> {
        let computed = crc32fast::hash(self.state.as_bytes());
        if computed != self.checksum {
            return Err(HandoffError::ChecksumMismatch {
                expected: self.checksum,
                computed,
            });
        }
        let state: AgentState = serde_json::from_str(&self.state)?;
        if state.progress > 100 {
            return Err(HandoffError::InvalidProgress(state.progress));
        }
        Ok(state)
    }

    /// Broadcast payload form.
    pub fn to_payload(&self) -> Value {
        serde_json::json!({
            "from": self.from,
            "to": self.to,
            "state": self.state,
            "checksum": self.checksum,
        })
    }

    /// Decode a broadcast payload, if it carries a complete envelope.
    pub fn from_payload(payload: &Value) -> Option<Self> {
        serde_json::from_value(payload.clone()).ok()
    }
}
