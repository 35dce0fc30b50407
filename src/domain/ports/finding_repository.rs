//! Findings port.

use anyhow::Result;
use async_trait::async_trait;

use crate::domain::models::Finding;

/// Persistence contract for cross-session research notes.
#[async_trait]
pub trait FindingRepository: Send + Sync {
    async fn insert(&self, finding: &Finding) -> Result<()>;

    /// Most recent findings, newest first.
    async fn recent(&self, limit: u32) -> Result<Vec<Finding>>;
}
