//! Blackboard service: the broadcast channel all patterns coordinate over.
//!
//! Persistence is the source of truth (at-least-once); the in-process
//! notification channel is an optional fast path for same-process
//! subscribers and is allowed to drop.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::debug;

use crate::domain::ident;
use crate::domain::models::{Broadcast, BroadcastType};
use crate::domain::ports::BroadcastRepository;

/// Budget for subscribing to the notification channel.
pub const SUBSCRIBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Default read window.
pub const DEFAULT_READ_LIMIT: u32 = 10;

/// Coordinates posting and reading of swarm broadcasts.
#[derive(Clone)]
pub struct BlackboardService {
    repo: Arc<dyn BroadcastRepository>,
    notifier: broadcast::Sender<Broadcast>,
}

impl BlackboardService {
    pub fn new(repo: Arc<dyn BroadcastRepository>) -> Self {
        let (notifier, _) = broadcast::channel(64);
        Self { repo, notifier }
    }

    /// Append a broadcast. The sender id is validated; out-of-grammar
    /// senders are recorded as `unknown`.
    pub async fn post(
        &self,
        swarm_id: &str,
        sender: &str,
        broadcast_type: BroadcastType,
        payload: Value,
    ) -> Result<String> {
        let broadcast = Broadcast::new(
            swarm_id,
            ident::or_unknown(sender),
            broadcast_type,
            payload,
        );
        let id = self.repo.append(&broadcast).await?;

        // Best-effort in-process notification; receivers may lag or be absent.
        let _ = self.notifier.send(broadcast);
        debug!(swarm_id, id, "broadcast posted");
        Ok(id)
    }

    /// Recent broadcasts, newest first.
    pub async fn read(
        &self,
        swarm_id: &str,
        since: Option<DateTime<Utc>>,
        exclude_sender: Option<&str>,
    ) -> Result<Vec<Broadcast>> {
        self.repo
            .list(swarm_id, since, exclude_sender, DEFAULT_READ_LIMIT)
            .await
    }

    /// Recent broadcasts of one type, newest first.
    pub async fn read_by_type(
        &self,
        swarm_id: &str,
        broadcast_type: &BroadcastType,
        limit: u32,
    ) -> Result<Vec<Broadcast>> {
        self.repo
            .list_by_type(swarm_id, broadcast_type.as_str(), limit)
            .await
    }

    /// Distinct senders that posted `broadcast_type` (any type when `None`).
    pub async fn count_distinct_senders(
        &self,
        swarm_id: &str,
        broadcast_type: Option<&BroadcastType>,
    ) -> Result<u64> {
        self.repo
            .count_distinct_senders(swarm_id, broadcast_type.map(BroadcastType::as_str))
            .await
    }

    /// Swarm progress: `(done_senders, total_senders)`. Duplicate `done`
    /// rows never double-count because both sides fold through DISTINCT.
    pub async fn progress(&self, swarm_id: &str) -> Result<(u64, u64)> {
        let done = self
            .count_distinct_senders(swarm_id, Some(&BroadcastType::Done))
            .await?;
        let total = self.count_distinct_senders(swarm_id, None).await?;
        Ok((done, total))
    }

    /// Latest `state_transfer` broadcast addressed to `target`.
    pub async fn latest_transfer_for(
        &self,
        swarm_id: &str,
        target: &str,
    ) -> Result<Option<Broadcast>> {
        let transfers = self
            .read_by_type(swarm_id, &BroadcastType::StateTransfer, 50)
            .await?;
        Ok(transfers
            .into_iter()
            .find(|b| b.target_agent() == Some(target)))
    }

    /// Subscribe to in-process notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<Broadcast> {
        self.notifier.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::{open_in_memory, migrations, SqliteBroadcastRepository};
    use serde_json::json;

    async fn service() -> BlackboardService {
        let pool = open_in_memory().await.unwrap();
        migrations::apply_all(&pool).await.unwrap();
        BlackboardService::new(Arc::new(SqliteBroadcastRepository::new(pool)))
    }

    #[tokio::test]
    async fn test_progress_counts_distinct_senders() {
        let bb = service().await;
        for agent in ["a1", "a2", "a3"] {
            bb.post("sw1", agent, BroadcastType::Started, json!({}))
                .await
                .unwrap();
        }
        bb.post("sw1", "a1", BroadcastType::Done, json!({ "auto": true }))
            .await
            .unwrap();
        bb.post("sw1", "a1", BroadcastType::Done, json!({ "auto": true }))
            .await
            .unwrap();

        let (done, total) = bb.progress("sw1").await.unwrap();
        assert_eq!(done, 1);
        assert_eq!(total, 3);
    }

    #[tokio::test]
    async fn test_invalid_sender_is_logged_as_unknown() {
        let bb = service().await;
        bb.post("sw1", "not a valid sender!", BroadcastType::Started, json!({}))
            .await
            .unwrap();

        let all = bb.read("sw1", None, None).await.unwrap();
        assert_eq!(all[0].sender_agent, "unknown");
    }

    #[tokio::test]
    async fn test_latest_transfer_for_target() {
        let bb = service().await;
        bb.post(
            "sw1",
            "a_old",
            BroadcastType::StateTransfer,
            json!({ "to": "someone_else", "state": "{}", "checksum": 0, "from": "a_old" }),
        )
        .await
        .unwrap();
        bb.post(
            "sw1",
            "a_old",
            BroadcastType::StateTransfer,
            json!({ "to": "a_new", "state": "{}", "checksum": 0, "from": "a_old" }),
        )
        .await
        .unwrap();

        let hit = bb.latest_transfer_for("sw1", "a_new").await.unwrap();
        assert!(hit.is_some());
        assert!(bb
            .latest_transfer_for("sw1", "nobody")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_in_process_notification() {
        let bb = service().await;
        let mut rx = bb.subscribe();
        bb.post("sw1", "a1", BroadcastType::Started, json!({}))
            .await
            .unwrap();

        let received = tokio::time::timeout(SUBSCRIBE_TIMEOUT, rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(received.sender_agent, "a1");
    }
}
