//! File claim arbiter: project-scoped exclusive locks with TTL take-over.

use anyhow::Result;
use chrono::Utc;
use std::sync::Arc;
use tracing::debug;

use crate::domain::models::claim::DEFAULT_TTL_SECS;
use crate::domain::models::{ClaimStatus, FileClaim};
use crate::domain::ports::ClaimRepository;

/// Arbitrates exclusive file claims across concurrent sessions.
#[derive(Clone)]
pub struct ClaimService {
    repo: Arc<dyn ClaimRepository>,
}

impl ClaimService {
    pub fn new(repo: Arc<dyn ClaimRepository>) -> Self {
        Self { repo }
    }

    /// Try to claim a file. The result reports the session that actually
    /// owns the row after the atomic take-over: the requester, or the
    /// current holder when the claim was live and foreign.
    pub async fn claim(
        &self,
        file_path: &str,
        project: &str,
        session_id: &str,
        ttl_seconds: Option<i64>,
    ) -> Result<ClaimStatus> {
        let requested = FileClaim::new(
            file_path,
            project,
            session_id,
            ttl_seconds.unwrap_or(DEFAULT_TTL_SECS),
        );
        let stored = self.repo.claim(&requested).await?;

        if stored.session_id == session_id {
            debug!(file_path, project, session_id, "claim granted");
            Ok(ClaimStatus::Free)
        } else {
            debug!(file_path, project, owner = %stored.session_id, "claim denied");
            Ok(ClaimStatus::Held { by: stored.session_id })
        }
    }

    /// Check whether a live claim by a different session exists.
    pub async fn check(&self, file_path: &str, project: &str, me: &str) -> Result<ClaimStatus> {
        let claim = self.repo.get(file_path, project).await?;
        Ok(match claim {
            Some(claim) if claim.is_live(Utc::now()) && claim.session_id != me => {
                ClaimStatus::Held { by: claim.session_id }
            }
            _ => ClaimStatus::Free,
        })
    }

    /// Release a claim; only the owner's release removes the row.
    pub async fn release(&self, file_path: &str, project: &str, session_id: &str) -> Result<bool> {
        self.repo.release(file_path, project, session_id).await
    }

    /// Live claims held by sessions other than `me` (contention preview).
    pub async fn foreign_claims(&self, project: &str, me: &str) -> Result<Vec<FileClaim>> {
        let now = Utc::now();
        Ok(self
            .repo
            .list_project(project)
            .await?
            .into_iter()
            .filter(|c| c.session_id != me && c.is_live(now))
            .collect())
    }

    /// Drop expired rows.
    pub async fn sweep(&self) -> Result<u64> {
        self.repo.sweep_expired(Utc::now()).await
    }
}
