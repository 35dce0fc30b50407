//! Session supervisor: heartbeats, the active-session view, and expiry
//! sweeps for cross-session awareness.

use anyhow::Result;
use chrono::{Duration, Utc};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use crate::domain::models::session::ACTIVE_WINDOW_SECS;
use crate::domain::models::{Checkpoint, FeatureWorkspace, Session};
use crate::domain::ports::SessionRepository;
use crate::services::ClaimService;

/// Checkpoints expire after a week unless swept earlier.
const CHECKPOINT_TTL_DAYS: i64 = 7;

/// Keeps the live-session view current and reports concurrent work.
#[derive(Clone)]
pub struct SessionSupervisor {
    repo: Arc<dyn SessionRepository>,
    claims: ClaimService,
}

impl SessionSupervisor {
    pub fn new(repo: Arc<dyn SessionRepository>, claims: ClaimService) -> Self {
        Self { repo, claims }
    }

    /// Record a heartbeat; creates the session on first sight.
    pub async fn heartbeat(&self, session_id: &str, project: &str) -> Result<()> {
        self.repo.heartbeat(session_id, project).await
    }

    /// Sessions heartbeated within the 5 minute window.
    pub async fn list_active(&self, project: Option<&str>) -> Result<Vec<Session>> {
        let cutoff = Utc::now() - Duration::seconds(ACTIVE_WINDOW_SECS);
        self.repo.list_active(project, cutoff).await
    }

    /// Record a restore point for a session, typically just before the host
    /// compacts its context away.
    pub async fn record_checkpoint(
        &self,
        session_id: &str,
        label: &str,
        state: Value,
    ) -> Result<()> {
        let checkpoint = Checkpoint::new(
            session_id,
            label,
            state,
            Duration::days(CHECKPOINT_TTL_DAYS),
        );
        self.repo.save_checkpoint(&checkpoint).await?;
        debug!(session_id, label, "checkpoint recorded");
        Ok(())
    }

    /// Record what a session is working on: claims the `(project, feature)`
    /// workspace and mirrors the declaration into the session row so peers
    /// see it in the awareness context.
    pub async fn declare_feature(
        &self,
        session_id: &str,
        project: &str,
        feature: &str,
    ) -> Result<()> {
        self.repo
            .upsert_workspace(&FeatureWorkspace::declare(project, feature, session_id))
            .await?;

        if let Some(mut session) = self.repo.get(session_id).await? {
            session.working_on = Some(feature.to_string());
            self.repo.update_status(&session).await?;
        }
        debug!(session_id, feature, "feature declared");
        Ok(())
    }

    /// Active feature workspaces in a project.
    pub async fn workspaces(&self, project: &str) -> Result<Vec<FeatureWorkspace>> {
        self.repo.list_workspaces(project).await
    }

    /// Awareness context injected into a new session: concurrent sessions,
    /// their declared work, and imminent file-claim contention. `None` when
    /// there is nothing to report.
    pub async fn awareness_context(
        &self,
        session_id: &str,
        project: &str,
    ) -> Result<Option<String>> {
        let peers: Vec<Session> = self
            .list_active(Some(project))
            .await?
            .into_iter()
            .filter(|s| s.id != session_id)
            .collect();
        let foreign_claims = self.claims.foreign_claims(project, session_id).await?;

        if peers.is_empty() && foreign_claims.is_empty() {
            return Ok(None);
        }
        let workspaces = self.repo.list_workspaces(project).await?;

        let mut lines = Vec::new();
        if !peers.is_empty() {
            lines.push(format!("{} other active session(s) on this project:", peers.len()));
            for peer in peers.iter().take(5) {
                let work = peer.working_on.as_deref().unwrap_or("(undeclared work)");
                lines.push(format!("  - {}: {}", peer.id, work));
            }
        }
        for workspace in workspaces.iter().take(5) {
            lines.push(format!(
                "  - feature '{}' in progress by {}",
                workspace.feature, workspace.session_id
            ));
        }
        if !foreign_claims.is_empty() {
            lines.push(format!(
                "{} file(s) currently claimed by other sessions; claim before editing:",
                foreign_claims.len()
            ));
            for claim in foreign_claims.iter().take(10) {
                lines.push(format!("  - {} (held by {})", claim.file_path, claim.session_id));
            }
        }

        Ok(Some(lines.join("\n")))
    }

    /// Expiry sweeps: stale checkpoints and dead claims. Invoked
    /// opportunistically from `SessionStart`.
    pub async fn sweep(&self) -> Result<()> {
        let checkpoints = self.repo.sweep_checkpoints(Utc::now()).await?;
        let claims = self.claims.sweep().await?;
        if checkpoints + claims > 0 {
            debug!(checkpoints, claims, "supervisor sweep");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::{
        open_in_memory, migrations, SqliteClaimRepository, SqliteSessionRepository,
    };

    async fn supervisor_with_pool() -> (SessionSupervisor, sqlx::SqlitePool) {
        let pool = open_in_memory().await.unwrap();
        migrations::apply_all(&pool).await.unwrap();
        let supervisor = SessionSupervisor::new(
            Arc::new(SqliteSessionRepository::new(pool.clone())),
            ClaimService::new(Arc::new(SqliteClaimRepository::new(pool.clone()))),
        );
        (supervisor, pool)
    }

    async fn supervisor() -> SessionSupervisor {
        supervisor_with_pool().await.0
    }

    #[tokio::test]
    async fn test_heartbeat_makes_session_visible() {
        let supervisor = supervisor().await;
        supervisor.heartbeat("s1", "proj").await.unwrap();

        let active = supervisor.list_active(Some("proj")).await.unwrap();
        assert_eq!(active.len(), 1);
        assert!(supervisor.list_active(Some("other")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_awareness_empty_when_alone() {
        let supervisor = supervisor().await;
        supervisor.heartbeat("s1", "proj").await.unwrap();

        let context = supervisor.awareness_context("s1", "proj").await.unwrap();
        assert!(context.is_none());
    }

    #[tokio::test]
    async fn test_awareness_reports_peers_and_claims() {
        let supervisor = supervisor().await;
        supervisor.heartbeat("s1", "proj").await.unwrap();
        supervisor.heartbeat("s2", "proj").await.unwrap();
        supervisor
            .claims
            .claim("src/lib.rs", "proj", "s2", None)
            .await
            .unwrap();

        let context = supervisor
            .awareness_context("s1", "proj")
            .await
            .unwrap()
            .expect("awareness context expected");
        assert!(context.contains("s2"));
        assert!(context.contains("src/lib.rs"));
    }

    #[tokio::test]
    async fn test_declared_feature_surfaces_to_peers() {
        let supervisor = supervisor().await;
        supervisor.heartbeat("s1", "proj").await.unwrap();
        supervisor.heartbeat("s2", "proj").await.unwrap();
        supervisor
            .declare_feature("s2", "proj", "auth-refactor")
            .await
            .unwrap();

        let workspaces = supervisor.workspaces("proj").await.unwrap();
        assert_eq!(workspaces.len(), 1);
        assert_eq!(workspaces[0].session_id, "s2");

        let context = supervisor
            .awareness_context("s1", "proj")
            .await
            .unwrap()
            .expect("awareness context expected");
        assert!(context.contains("auth-refactor"));

        // The declaration also lands on the session row itself.
        let session = supervisor
            .list_active(Some("proj"))
            .await
            .unwrap()
            .into_iter()
            .find(|s| s.id == "s2")
            .unwrap();
        assert_eq!(session.working_on.as_deref(), Some("auth-refactor"));
    }

    #[tokio::test]
    async fn test_checkpoints_recorded_and_swept() {
        let (supervisor, pool) = supervisor_with_pool().await;
        supervisor.heartbeat("s1", "proj").await.unwrap();
        supervisor
            .record_checkpoint("s1", "pre-compact", serde_json::json!({ "trigger": "auto" }))
            .await
            .unwrap();

        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM checkpoints")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count.0, 1);

        // Fresh checkpoints survive the sweep; only elapsed TTLs go.
        supervisor.sweep().await.unwrap();
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM checkpoints")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count.0, 1);

        sqlx::query("UPDATE checkpoints SET expires_at = ?")
            .bind((Utc::now() - Duration::hours(1)).to_rfc3339())
            .execute(&pool)
            .await
            .unwrap();
        supervisor.sweep().await.unwrap();
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM checkpoints")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count.0, 0);
    }
}
