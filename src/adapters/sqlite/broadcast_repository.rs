//! SQLite implementation of the blackboard port.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use super::util::parse_datetime;
use super::StoreError;
use crate::domain::models::{Broadcast, BroadcastType};
use crate::domain::ports::BroadcastRepository;

/// SQLite-backed append-only broadcast log.
#[derive(Clone)]
pub struct SqliteBroadcastRepository {
    pool: SqlitePool,
}

impl SqliteBroadcastRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct BroadcastRow {
    id: String,
    swarm_id: String,
    sender_agent: String,
    broadcast_type: String,
    payload: String,
    created_at: String,
}

impl BroadcastRow {
    fn into_broadcast(self) -> Result<Broadcast, StoreError> {
        Ok(Broadcast {
            id: self.id,
            swarm_id: self.swarm_id,
            sender_agent: self.sender_agent,
            broadcast_type: BroadcastType::parse_str(&self.broadcast_type),
            payload: serde_json::from_str(&self.payload)?,
            created_at: parse_datetime(&self.created_at)?,
        })
    }
}

#[async_trait]
impl BroadcastRepository for SqliteBroadcastRepository {
    async fn append(&self, broadcast: &Broadcast) -> Result<String> {
        let payload = serde_json::to_string(&broadcast.payload).map_err(StoreError::from)?;

        sqlx::query(
            r#"
            INSERT INTO broadcasts (id, swarm_id, sender_agent, broadcast_type, payload, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&broadcast.id)
        .bind(&broadcast.swarm_id)
        .bind(&broadcast.sender_agent)
        .bind(broadcast.broadcast_type.as_str())
        .bind(&payload)
        .bind(broadcast.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(StoreError::from)?;

        Ok(broadcast.id.clone())
    }

    async fn list(
        &self,
        swarm_id: &str,
        since: Option<DateTime<Utc>>,
        exclude_sender: Option<&str>,
        limit: u32,
    ) -> Result<Vec<Broadcast>> {
        let mut sql = String::from(
            "SELECT id, swarm_id, sender_agent, broadcast_type, payload, created_at \
             FROM broadcasts WHERE swarm_id = ?",
        );
        if since.is_some() {
            sql.push_str(" AND created_at >= ?");
        }
        if exclude_sender.is_some() {
            sql.push_str(" AND sender_agent != ?");
        }
        sql.push_str(" ORDER BY created_at DESC, id DESC LIMIT ?");

        let mut query = sqlx::query_as::<_, BroadcastRow>(&sql).bind(swarm_id);
        if let Some(since) = since {
            query = query.bind(since.to_rfc3339());
        }
        if let Some(sender) = exclude_sender {
            query = query.bind(sender);
        }
        let rows = query
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(StoreError::from)?;

        rows.into_iter()
            .map(|r| r.into_broadcast().map_err(Into::into))
            .collect()
    }

    async fn list_by_type(
        &self,
        swarm_id: &str,
        broadcast_type: &str,
        limit: u32,
    ) -> Result<Vec<Broadcast>> {
        let rows: Vec<BroadcastRow> = sqlx::query_as(
            r#"
            SELECT id, swarm_id, sender_agent, broadcast_type, payload, created_at
            FROM broadcasts
            WHERE swarm_id = ? AND broadcast_type = ?
            ORDER BY created_at DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(swarm_id)
        .bind(broadcast_type)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::from)?;

        rows.into_iter()
            .map(|r| r.into_broadcast().map_err(Into::into))
            .collect()
    }

    async fn count_distinct_senders(
        &self,
        swarm_id: &str,
        broadcast_type: Option<&str>,
    ) -> Result<u64> {
        let count: (i64,) = if let Some(broadcast_type) = broadcast_type {
            sqlx::query_as(
                "SELECT COUNT(DISTINCT sender_agent) FROM broadcasts \
                 WHERE swarm_id = ? AND broadcast_type = ?",
            )
            .bind(swarm_id)
            .bind(broadcast_type)
            .fetch_one(&self.pool)
            .await
        } else {
            sqlx::query_as(
                "SELECT COUNT(DISTINCT sender_agent) FROM broadcasts WHERE swarm_id = ?",
            )
            .bind(swarm_id)
            .fetch_one(&self.pool)
            .await
        }
        .map_err(StoreError::from)?;

        Ok(count.0 as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::{open_in_memory, migrations};
    use serde_json::json;

    async fn repo() -> SqliteBroadcastRepository {
        let pool = open_in_memory().await.unwrap();
        migrations::apply_all(&pool).await.unwrap();
        SqliteBroadcastRepository::new(pool)
    }

    #[tokio::test]
    async fn test_append_and_list_newest_first() {
        let repo = repo().await;
        for i in 0..3 {
            let mut b = Broadcast::new("sw1", format!("a{i}"), BroadcastType::Started, json!({}));
            b.created_at = Utc::now() + chrono::Duration::milliseconds(i);
            repo.append(&b).await.unwrap();
        }

        let all = repo.list("sw1", None, None, 10).await.unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].sender_agent, "a2");
    }

    #[tokio::test]
    async fn test_list_excludes_sender() {
        let repo = repo().await;
        repo.append(&Broadcast::new("sw1", "me", BroadcastType::Started, json!({})))
            .await
            .unwrap();
        repo.append(&Broadcast::new("sw1", "peer", BroadcastType::Started, json!({})))
            .await
            .unwrap();

        let others = repo.list("sw1", None, Some("me"), 10).await.unwrap();
        assert_eq!(others.len(), 1);
        assert_eq!(others[0].sender_agent, "peer");
    }

    #[tokio::test]
    async fn test_duplicate_done_counts_once() {
        let repo = repo().await;
        repo.append(&Broadcast::auto_done("sw1", "a1")).await.unwrap();
        repo.append(&Broadcast::auto_done("sw1", "a1")).await.unwrap();
        repo.append(&Broadcast::auto_done("sw1", "a2")).await.unwrap();

        // Two rows for a1 survive (append-only), but progress counts senders.
        let rows = repo.list_by_type("sw1", "done", 10).await.unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(
            repo.count_distinct_senders("sw1", Some("done")).await.unwrap(),
            2
        );
    }

    #[tokio::test]
    async fn test_count_any_type() {
        let repo = repo().await;
        repo.append(&Broadcast::new("sw1", "a1", BroadcastType::Started, json!({})))
            .await
            .unwrap();
        repo.append(&Broadcast::auto_done("sw1", "a1")).await.unwrap();
        repo.append(&Broadcast::new("sw1", "a2", BroadcastType::Started, json!({})))
            .await
            .unwrap();

        assert_eq!(repo.count_distinct_senders("sw1", None).await.unwrap(), 2);
        assert_eq!(repo.count_distinct_senders("other", None).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_swarms_are_isolated() {
        let repo = repo().await;
        repo.append(&Broadcast::auto_done("sw1", "a1")).await.unwrap();
        repo.append(&Broadcast::auto_done("sw2", "b1")).await.unwrap();

        assert_eq!(repo.list("sw1", None, None, 10).await.unwrap().len(), 1);
        assert_eq!(
            repo.count_distinct_senders("sw2", Some("done")).await.unwrap(),
            1
        );
    }
}
