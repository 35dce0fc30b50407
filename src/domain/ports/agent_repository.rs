//! Agent registry port.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::models::{Agent, AgentStatus};

/// Persistence contract for the agent registry.
///
/// Implementations must keep at most one row per agent id and make
/// `register` an upsert so repeated observations of the same spawn are
/// idempotent (last writer wins on non-key fields).
#[async_trait]
pub trait AgentRepository: Send + Sync {
    /// Insert or refresh an agent row.
    async fn register(&self, agent: &Agent) -> Result<()>;

    /// Terminate an agent. Only the first terminal write takes effect;
    /// repeats and unknown ids are no-ops. Returns whether a row changed.
    async fn complete(
        &self,
        id: &str,
        status: AgentStatus,
        error_message: Option<&str>,
    ) -> Result<bool>;

    /// Fetch one agent by id.
    async fn get(&self, id: &str) -> Result<Option<Agent>>;

    /// Number of `running` rows; the admission signal for fan-out patterns.
    async fn count_running(&self) -> Result<u64>;

    /// Running agents, optionally scoped to one session.
    async fn list_running(&self, session_id: Option<&str>) -> Result<Vec<Agent>>;

    /// Mark running rows spawned before `cutoff` as cancelled (presumed
    /// leaked). Returns how many rows were collected.
    async fn sweep_stale(&self, cutoff: DateTime<Utc>) -> Result<u64>;
}
