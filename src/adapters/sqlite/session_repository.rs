//! SQLite implementation of the session supervisor port.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use super::util::parse_datetime;
use super::StoreError;
use crate::domain::models::{Checkpoint, FeatureWorkspace, Session};
use crate::domain::ports::SessionRepository;

/// SQLite-backed session store.
#[derive(Clone)]
pub struct SqliteSessionRepository {
    pool: SqlitePool,
}

impl SqliteSessionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SessionRow {
    id: String,
    project: String,
    working_on: Option<String>,
    started_at: String,
    last_heartbeat: String,
    current_phase: Option<String>,
    active_files: String,
    blocked_by: String,
    next_action: Option<String>,
}

impl SessionRow {
    fn into_session(self) -> Result<Session, StoreError> {
        Ok(Session {
            id: self.id,
            project: self.project,
            working_on: self.working_on,
            started_at: parse_datetime(&self.started_at)?,
            last_heartbeat: parse_datetime(&self.last_heartbeat)?,
            current_phase: self.current_phase,
            active_files: serde_json::from_str(&self.active_files)?,
            blocked_by: serde_json::from_str(&self.blocked_by)?,
            next_action: self.next_action,
        })
    }
}

#[async_trait]
impl SessionRepository for SqliteSessionRepository {
    async fn heartbeat(&self, session_id: &str, project: &str) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            r#"
            INSERT INTO sessions (id, project, started_at, last_heartbeat)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                last_heartbeat = excluded.last_heartbeat,
                project = CASE WHEN excluded.project != ''
                          THEN excluded.project ELSE sessions.project END
            "#,
        )
        .bind(session_id)
        .bind(project)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(StoreError::from)?;

        Ok(())
    }

    async fn get(&self, session_id: &str) -> Result<Option<Session>> {
        let row: Option<SessionRow> = sqlx::query_as(
            "SELECT id, project, working_on, started_at, last_heartbeat, current_phase, \
                    active_files, blocked_by, next_action \
             FROM sessions WHERE id = ?",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::from)?;

        row.map(SessionRow::into_session)
            .transpose()
            .map_err(Into::into)
    }

    async fn list_active(
        &self,
        project: Option<&str>,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Session>> {
        let mut sql = String::from(
            "SELECT id, project, working_on, started_at, last_heartbeat, current_phase, \
                    active_files, blocked_by, next_action \
             FROM sessions WHERE last_heartbeat >= ?",
        );
        if project.is_some() {
            sql.push_str(" AND project = ?");
        }
        sql.push_str(" ORDER BY last_heartbeat DESC");

        let mut query = sqlx::query_as::<_, SessionRow>(&sql).bind(cutoff.to_rfc3339());
        if let Some(project) = project {
            query = query.bind(project);
        }
        let rows = query.fetch_all(&self.pool).await.map_err(StoreError::from)?;

        rows.into_iter()
            .map(|r| r.into_session().map_err(Into::into))
            .collect()
    }

    async fn update_status(&self, session: &Session) -> Result<()> {
        let active_files = serde_json::to_string(&session.active_files).map_err(StoreError::from)?;
        let blocked_by = serde_json::to_string(&session.blocked_by).map_err(StoreError::from)?;

        sqlx::query(
            r#"
            UPDATE sessions
            SET working_on = ?, current_phase = ?, active_files = ?, blocked_by = ?, next_action = ?
            WHERE id = ?
            "#,
        )
        .bind(&session.working_on)
        .bind(&session.current_phase)
        .bind(&active_files)
        .bind(&blocked_by)
        .bind(&session.next_action)
        .bind(&session.id)
        .execute(&self.pool)
        .await
        .map_err(StoreError::from)?;

        Ok(())
    }

    async fn sweep_checkpoints(&self, now: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query(
            "DELETE FROM checkpoints WHERE expires_at IS NOT NULL AND expires_at < ?",
        )
        .bind(now.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(StoreError::from)?;

        Ok(result.rows_affected())
    }

    async fn save_checkpoint(&self, checkpoint: &Checkpoint) -> Result<()> {
        let state = serde_json::to_string(&checkpoint.state).map_err(StoreError::from)?;

        sqlx::query(
            r#"
            INSERT INTO checkpoints (id, session_id, label, state, created_at, expires_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                label = excluded.label,
                state = excluded.state,
                expires_at = excluded.expires_at
            "#,
        )
        .bind(&checkpoint.id)
        .bind(&checkpoint.session_id)
        .bind(&checkpoint.label)
        .bind(&state)
        .bind(checkpoint.created_at.to_rfc3339())
        .bind(checkpoint.expires_at.map(|t| t.to_rfc3339()))
        .execute(&self.pool)
        .await
        .map_err(StoreError::from)?;

        Ok(())
    }

    async fn upsert_workspace(&self, workspace: &FeatureWorkspace) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO feature_workspaces
                (id, project, feature, session_id, branch, status, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(project, feature) DO UPDATE SET
                session_id = excluded.session_id,
                branch = COALESCE(excluded.branch, feature_workspaces.branch),
                status = excluded.status,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&workspace.id)
        .bind(&workspace.project)
        .bind(&workspace.feature)
        .bind(&workspace.session_id)
        .bind(&workspace.branch)
        .bind(&workspace.status)
        .bind(workspace.created_at.to_rfc3339())
        .bind(workspace.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(StoreError::from)?;

        Ok(())
    }

    async fn list_workspaces(&self, project: &str) -> Result<Vec<FeatureWorkspace>> {
        #[derive(sqlx::FromRow)]
        struct WorkspaceRow {
            id: String,
            project: String,
            feature: String,
            session_id: String,
            branch: Option<String>,
            status: String,
            created_at: String,
            updated_at: String,
        }

        let rows: Vec<WorkspaceRow> = sqlx::query_as(
            "SELECT id, project, feature, session_id, branch, status, created_at, updated_at \
             FROM feature_workspaces WHERE project = ? AND status = 'active' \
             ORDER BY updated_at DESC",
        )
        .bind(project)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::from)?;

        rows.into_iter()
            .map(|r| {
                Ok(FeatureWorkspace {
                    id: r.id,
                    project: r.project,
                    feature: r.feature,
                    session_id: r.session_id,
                    branch: r.branch,
                    status: r.status,
                    created_at: parse_datetime(&r.created_at).map_err(StoreError::from)?,
                    updated_at: parse_datetime(&r.updated_at).map_err(StoreError::from)?,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::{open_in_memory, migrations};
    use chrono::Duration;

    async fn repo() -> SqliteSessionRepository {
        let pool = open_in_memory().await.unwrap();
        migrations::apply_all(&pool).await.unwrap();
        SqliteSessionRepository::new(pool)
    }

    #[tokio::test]
    async fn test_heartbeat_creates_then_refreshes() {
        let repo = repo().await;
        repo.heartbeat("s1", "proj").await.unwrap();

        let created = repo.get("s1").await.unwrap().unwrap();
        assert_eq!(created.project, "proj");

        repo.heartbeat("s1", "").await.unwrap();
        let refreshed = repo.get("s1").await.unwrap().unwrap();
        // Empty project on a later heartbeat does not erase the known one.
        assert_eq!(refreshed.project, "proj");
        assert!(refreshed.last_heartbeat >= created.last_heartbeat);
    }

    #[tokio::test]
    async fn test_list_active_filters_stale() {
        let repo = repo().await;
        repo.heartbeat("fresh", "proj").await.unwrap();

        sqlx::query("INSERT INTO sessions (id, project, started_at, last_heartbeat) VALUES (?, ?, ?, ?)")
            .bind("stale")
            .bind("proj")
            .bind((Utc::now() - Duration::minutes(30)).to_rfc3339())
            .bind((Utc::now() - Duration::minutes(10)).to_rfc3339())
            .execute(&repo.pool)
            .await
            .unwrap();

        let active = repo
            .list_active(Some("proj"), Utc::now() - Duration::minutes(5))
            .await
            .unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, "fresh");
    }

    #[tokio::test]
    async fn test_update_status_round_trip() {
        let repo = repo().await;
        repo.heartbeat("s1", "proj").await.unwrap();

        let mut session = repo.get("s1").await.unwrap().unwrap();
        session.working_on = Some("auth refactor".into());
        session.active_files = vec!["src/auth.rs".into()];
        repo.update_status(&session).await.unwrap();

        let stored = repo.get("s1").await.unwrap().unwrap();
        assert_eq!(stored.working_on.as_deref(), Some("auth refactor"));
        assert_eq!(stored.active_files, vec!["src/auth.rs".to_string()]);
    }

    #[tokio::test]
    async fn test_checkpoint_sweep() {
        let repo = repo().await;
        let expired = Checkpoint {
            id: "c1".into(),
            session_id: "s1".into(),
            label: "old".into(),
            state: serde_json::json!({}),
            created_at: Utc::now() - Duration::hours(2),
            expires_at: Some(Utc::now() - Duration::hours(1)),
        };
        let durable = Checkpoint {
            id: "c2".into(),
            session_id: "s1".into(),
            label: "keep".into(),
            state: serde_json::json!({}),
            created_at: Utc::now(),
            expires_at: None,
        };
        repo.save_checkpoint(&expired).await.unwrap();
        repo.save_checkpoint(&durable).await.unwrap();

        assert_eq!(repo.sweep_checkpoints(Utc::now()).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_workspace_redeclaration_moves_ownership() {
        let repo = repo().await;

        repo.upsert_workspace(&FeatureWorkspace::declare("proj", "auth", "s1"))
            .await
            .unwrap();
        repo.upsert_workspace(&FeatureWorkspace::declare("proj", "search", "s1"))
            .await
            .unwrap();
        // A second session takes over the same feature.
        repo.upsert_workspace(&FeatureWorkspace::declare("proj", "auth", "s2"))
            .await
            .unwrap();

        let workspaces = repo.list_workspaces("proj").await.unwrap();
        assert_eq!(workspaces.len(), 2);
        let auth = workspaces.iter().find(|w| w.feature == "auth").unwrap();
        assert_eq!(auth.session_id, "s2");
        assert!(repo.list_workspaces("other").await.unwrap().is_empty());
    }
}
