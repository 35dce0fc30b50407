//! Agent domain model.
//!
//! Agents are child processes launched by the host CLI. The runtime observes
//! them only through hook events, so every row here is reconstructed from
//! `SubagentStart`/`SubagentStop` and `Task` tool responses.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a tracked agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    /// Spawned and not yet observed terminating
    Running,
    /// Terminated normally
    Completed,
    /// Terminated with an error
    Failed,
    /// Terminated by cancellation
    Cancelled,
}

impl Default for AgentStatus {
    fn default() -> Self {
        Self::Running
    }
}

impl AgentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn parse_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    /// Terminal statuses carry a `completed_at` timestamp.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running)
    }
}

/// Where the agent registration originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentSource {
    /// Registered from a hook invocation of the CLI wrapper
    Cli,
    /// Registered by a long-running server component
    Server,
}

impl Default for AgentSource {
    fn default() -> Self {
        Self::Cli
    }
}

impl AgentSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cli => "cli",
            Self::Server => "server",
        }
    }

    pub fn parse_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "cli" => Some(Self::Cli),
            "server" => Some(Self::Server),
            _ => None,
        }
    }
}

/// A tracked agent. At most one row per id; the registry upserts on conflict.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    /// Opaque identifier (validated against the id grammar)
    pub id: String,
    /// Owning session
    pub session_id: String,
    /// Coordination pattern the agent runs under, if any
    pub pattern: Option<String>,
    /// Parent agent for hierarchical patterns
    pub parent_agent_id: Option<String>,
    /// OS process id when known
    pub pid: Option<i64>,
    /// Parent process id when known
    pub ppid: Option<i64>,
    /// When the agent was first observed
    pub spawned_at: DateTime<Utc>,
    /// Set exactly when status leaves `running`
    pub completed_at: Option<DateTime<Utc>>,
    /// Current status
    pub status: AgentStatus,
    /// Failure detail for `failed` agents
    pub error_message: Option<String>,
    /// Registration origin
    pub source: AgentSource,
}

impl Agent {
    /// Create a new running agent.
    pub fn new(id: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            session_id: session_id.into(),
            pattern: None,
            parent_agent_id: None,
            pid: None,
            ppid: None,
            spawned_at: Utc::now(),
            completed_at: None,
            status: AgentStatus::Running,
            error_message: None,
            source: AgentSource::Cli,
        }
    }

    /// Set the coordination pattern.
    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }

    /// Set the parent agent.
    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent_agent_id = Some(parent.into());
        self
    }

    /// Set the process ids.
    pub fn with_pids(mut self, pid: Option<i64>, ppid: Option<i64>) -> Self {
        self.pid = pid;
        self.ppid = ppid;
        self
    }

    /// A running row older than this is presumed leaked and garbage-collected.
    pub fn is_presumed_leaked(&self, now: DateTime<Utc>, max_age: Duration) -> bool {
        self.status == AgentStatus::Running && now - self.spawned_at > max_age
    }
}
