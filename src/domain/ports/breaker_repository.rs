//! Circuit breaker state port.

use anyhow::Result;
use async_trait::async_trait;

use crate::domain::models::{BreakerOutcome, BreakerTuning, CircuitRecord};

/// Persistence contract for breaker records.
#[async_trait]
pub trait BreakerRepository: Send + Sync {
    /// Fetch the record for a breaker id.
    async fn get(&self, cb_id: &str) -> Result<Option<CircuitRecord>>;

    /// Apply one classified outcome inside a single transactional
    /// read-modify-write, creating the record on first use. Returns the
    /// updated record.
    async fn apply(
        &self,
        cb_id: &str,
        outcome: BreakerOutcome,
        tuning: &BreakerTuning,
    ) -> Result<CircuitRecord>;
}
