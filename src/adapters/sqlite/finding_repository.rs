//! SQLite implementation of the findings port.

use anyhow::Result;
use async_trait::async_trait;
use sqlx::SqlitePool;

use super::util::parse_datetime;
use super::StoreError;
use crate::domain::models::Finding;
use crate::domain::ports::FindingRepository;

/// SQLite-backed findings store.
#[derive(Clone)]
pub struct SqliteFindingRepository {
    pool: SqlitePool,
}

impl SqliteFindingRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct FindingRow {
    id: String,
    session_id: String,
    topic: String,
    finding: String,
    relevant_to: String,
    created_at: String,
}

#[async_trait]
impl FindingRepository for SqliteFindingRepository {
    async fn insert(&self, finding: &Finding) -> Result<()> {
        let relevant_to = serde_json::to_string(&finding.relevant_to).map_err(StoreError::from)?;

        sqlx::query(
            r#"
            INSERT INTO findings (id, session_id, topic, finding, relevant_to, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&finding.id)
        .bind(&finding.session_id)
        .bind(&finding.topic)
        .bind(&finding.finding)
        .bind(&relevant_to)
        .bind(finding.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(StoreError::from)?;

        Ok(())
    }

    async fn recent(&self, limit: u32) -> Result<Vec<Finding>> {
        let rows: Vec<FindingRow> = sqlx::query_as(
            "SELECT id, session_id, topic, finding, relevant_to, created_at \
             FROM findings ORDER BY created_at DESC LIMIT ?",
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::from)?;

        rows.into_iter()
            .map(|r| {
                Ok(Finding {
                    id: r.id,
                    session_id: r.session_id,
                    topic: r.topic,
                    finding: r.finding,
                    relevant_to: serde_json::from_str(&r.relevant_to).map_err(StoreError::from)?,
                    created_at: parse_datetime(&r.created_at).map_err(StoreError::from)?,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::{open_in_memory, migrations};

    #[tokio::test]
    async fn test_insert_and_recall() {
        let pool = open_in_memory().await.unwrap();
        migrations::apply_all(&pool).await.unwrap();
        let repo = SqliteFindingRepository::new(pool);

        let finding = Finding::new("s1", "flaky-tests", "integration suite races on port 8080")
            .with_relevant_to(vec!["tests/integration.rs".into()]);
        repo.insert(&finding).await.unwrap();

        let recent = repo.recent(10).await.unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].topic, "flaky-tests");
        assert_eq!(recent[0].relevant_to.len(), 1);
    }
}
