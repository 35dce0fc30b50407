//! Session supervisor port.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::models::{Checkpoint, FeatureWorkspace, Session};

/// Persistence contract for sessions and supervisor bookkeeping.
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Create the session on first sight or refresh its heartbeat.
    async fn heartbeat(&self, session_id: &str, project: &str) -> Result<()>;

    /// Fetch one session.
    async fn get(&self, session_id: &str) -> Result<Option<Session>>;

    /// Sessions with a heartbeat at or after `cutoff`, optionally scoped to
    /// one project.
    async fn list_active(
        &self,
        project: Option<&str>,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Session>>;

    /// Update the free-form awareness fields of a session.
    async fn update_status(&self, session: &Session) -> Result<()>;

    /// Delete checkpoints whose `expires_at` elapsed. Returns how many.
    async fn sweep_checkpoints(&self, now: DateTime<Utc>) -> Result<u64>;

    /// Persist a checkpoint.
    async fn save_checkpoint(&self, checkpoint: &Checkpoint) -> Result<()>;

    /// Insert a workspace declaration, or move the existing
    /// `(project, feature)` row to the declaring session.
    async fn upsert_workspace(&self, workspace: &FeatureWorkspace) -> Result<()>;

    /// Feature workspaces in a project with `active` status.
    async fn list_workspaces(&self, project: &str) -> Result<Vec<FeatureWorkspace>>;
}
