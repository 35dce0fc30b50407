//! File claim arbiter port.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::models::FileClaim;

/// Persistence contract for exclusive file claims.
#[async_trait]
pub trait ClaimRepository: Send + Sync {
    /// Atomic take-over upsert: insert the claim, or replace an existing row
    /// only when it is expired or already owned by the requester. Returns
    /// the stored row, whose `session_id` tells the caller who won.
    async fn claim(&self, claim: &FileClaim) -> Result<FileClaim>;

    /// Fetch the current claim row, live or expired.
    async fn get(&self, file_path: &str, project: &str) -> Result<Option<FileClaim>>;

    /// Delete the claim only when owned by `session_id`. Returns whether a
    /// row was removed.
    async fn release(&self, file_path: &str, project: &str, session_id: &str) -> Result<bool>;

    /// All claims in a project (contention overview for new sessions).
    async fn list_project(&self, project: &str) -> Result<Vec<FileClaim>>;

    /// Drop rows whose TTL elapsed before `now`. Returns how many.
    async fn sweep_expired(&self, now: DateTime<Utc>) -> Result<u64>;
}
