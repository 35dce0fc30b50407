//! Blackboard port.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::models::Broadcast;

/// Persistence contract for the append-only broadcast log.
///
/// Ordering is `(created_at, id)`; consumers may assume monotonic-per-sender
/// delivery but nothing across senders. Progress metrics always count
/// distinct senders, never rows, so duplicate appends stay harmless.
#[async_trait]
pub trait BroadcastRepository: Send + Sync {
    /// Append one broadcast. Returns the row id.
    async fn append(&self, broadcast: &Broadcast) -> Result<String>;

    /// Recent broadcasts for a swarm, newest first.
    async fn list(
        &self,
        swarm_id: &str,
        since: Option<DateTime<Utc>>,
        exclude_sender: Option<&str>,
        limit: u32,
    ) -> Result<Vec<Broadcast>>;

    /// Recent broadcasts of one type, newest first.
    async fn list_by_type(
        &self,
        swarm_id: &str,
        broadcast_type: &str,
        limit: u32,
    ) -> Result<Vec<Broadcast>>;

    /// Distinct senders that posted the given type (or any type when `None`).
    async fn count_distinct_senders(
        &self,
        swarm_id: &str,
        broadcast_type: Option<&str>,
    ) -> Result<u64>;
}
