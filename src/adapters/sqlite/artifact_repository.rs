//! SQLite implementation of the pipeline artifact port.

use anyhow::Result;
use async_trait::async_trait;
use sqlx::SqlitePool;

use super::util::parse_datetime;
use super::StoreError;
use crate::domain::models::PipelineArtifact;
use crate::domain::ports::ArtifactRepository;

/// SQLite-backed artifact store.
#[derive(Clone)]
pub struct SqliteArtifactRepository {
    pool: SqlitePool,
}

impl SqliteArtifactRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ArtifactRow {
    pipeline_id: String,
    stage_index: i64,
    artifact_type: String,
    artifact_path: Option<String>,
    artifact_content: Option<String>,
    created_at: String,
}

impl ArtifactRow {
    fn into_artifact(self) -> Result<PipelineArtifact, StoreError> {
        Ok(PipelineArtifact {
            pipeline_id: self.pipeline_id,
            stage_index: self.stage_index,
            artifact_type: self.artifact_type,
            artifact_path: self.artifact_path,
            artifact_content: self.artifact_content,
            created_at: parse_datetime(&self.created_at)?,
        })
    }
}

#[async_trait]
impl ArtifactRepository for SqliteArtifactRepository {
    async fn append(&self, artifact: &PipelineArtifact) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO pipeline_artifacts
                (pipeline_id, stage_index, artifact_type, artifact_path, artifact_content, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&artifact.pipeline_id)
        .bind(artifact.stage_index)
        .bind(&artifact.artifact_type)
        .bind(&artifact.artifact_path)
        .bind(&artifact.artifact_content)
        .bind(artifact.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(StoreError::from)?;

        Ok(())
    }

    async fn list_upstream(
        &self,
        pipeline_id: &str,
        stage_index: i64,
    ) -> Result<Vec<PipelineArtifact>> {
        let rows: Vec<ArtifactRow> = sqlx::query_as(
            r#"
            SELECT pipeline_id, stage_index, artifact_type, artifact_path, artifact_content, created_at
            FROM pipeline_artifacts
            WHERE pipeline_id = ? AND stage_index < ?
            ORDER BY stage_index ASC, created_at DESC
            "#,
        )
        .bind(pipeline_id)
        .bind(stage_index)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::from)?;

        rows.into_iter()
            .map(|r| r.into_artifact().map_err(Into::into))
            .collect()
    }

    async fn stages_with_output(&self, pipeline_id: &str, stage_index: i64) -> Result<Vec<i64>> {
        let rows: Vec<(i64,)> = sqlx::query_as(
            "SELECT DISTINCT stage_index FROM pipeline_artifacts \
             WHERE pipeline_id = ? AND stage_index < ? ORDER BY stage_index",
        )
        .bind(pipeline_id)
        .bind(stage_index)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::from)?;

        Ok(rows.into_iter().map(|(i,)| i).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::{open_in_memory, migrations};
    use chrono::Utc;
    use serde_json::json;

    async fn repo() -> SqliteArtifactRepository {
        let pool = open_in_memory().await.unwrap();
        migrations::apply_all(&pool).await.unwrap();
        SqliteArtifactRepository::new(pool)
    }

    fn artifact(stage: i64, content: &str) -> PipelineArtifact {
        PipelineArtifact::from_structured_output(
            "p1",
            stage,
            &json!({ "artifact_content": content }),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_upstream_ordering() {
        let repo = repo().await;
        let mut late = artifact(0, "plan v2");
        late.created_at = Utc::now() + chrono::Duration::seconds(5);
        repo.append(&artifact(1, "impl")).await.unwrap();
        repo.append(&artifact(0, "plan v1")).await.unwrap();
        repo.append(&late).await.unwrap();

        let upstream = repo.list_upstream("p1", 2).await.unwrap();
        assert_eq!(upstream.len(), 3);
        // Stage ascending, newest first within a stage.
        assert_eq!(upstream[0].stage_index, 0);
        assert_eq!(upstream[0].artifact_content.as_deref(), Some("plan v2"));
        assert_eq!(upstream[1].artifact_content.as_deref(), Some("plan v1"));
        assert_eq!(upstream[2].stage_index, 1);
    }

    #[tokio::test]
    async fn test_upstream_excludes_current_and_later_stages() {
        let repo = repo().await;
        repo.append(&artifact(0, "plan")).await.unwrap();
        repo.append(&artifact(2, "report")).await.unwrap();

        let upstream = repo.list_upstream("p1", 2).await.unwrap();
        assert_eq!(upstream.len(), 1);
        assert_eq!(upstream[0].stage_index, 0);
    }

    #[tokio::test]
    async fn test_stages_with_output() {
        let repo = repo().await;
        repo.append(&artifact(0, "a")).await.unwrap();
        repo.append(&artifact(0, "b")).await.unwrap();
        repo.append(&artifact(3, "d")).await.unwrap();

        assert_eq!(repo.stages_with_output("p1", 4).await.unwrap(), vec![0, 3]);
        assert!(repo.stages_with_output("p1", 0).await.unwrap().is_empty());
        assert!(repo.stages_with_output("other", 4).await.unwrap().is_empty());
    }
}
