//! Exclusive file claims.
//!
//! A claim grants one session exclusive intent over a file path within a
//! project. Claims expire by TTL rather than by crash-prone release paths, so
//! take-over of an expired claim is routine and must be atomic.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Default claim lifetime.
pub const DEFAULT_TTL_SECS: i64 = 3600;

/// One `(file_path, project)` exclusive claim row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileClaim {
    pub file_path: String,
    pub project: String,
    /// Owning session
    pub session_id: String,
    pub claimed_at: DateTime<Utc>,
    pub ttl_seconds: i64,
}

impl FileClaim {
    pub fn new(
        file_path: impl Into<String>,
        project: impl Into<String>,
        session_id: impl Into<String>,
        ttl_seconds: i64,
    ) -> Self {
        Self {
            file_path: file_path.into(),
            project: project.into(),
            session_id: session_id.into(),
            claimed_at: Utc::now(),
            ttl_seconds,
        }
    }

    /// Live iff the TTL has not elapsed.
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        now - self.claimed_at <= Duration::seconds(self.ttl_seconds)
    }
}

/// Outcome of a claim check from one session's point of view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimStatus {
    /// No live claim held by another session
    Free,
    /// A live claim is held by `by`
    Held { by: String },
}

impl ClaimStatus {
    pub fn is_held(&self) -> bool {
        matches!(self, Self::Held { .. })
    }

    /// Wire form: `{"claimed": false}` or `{"claimed": true, "by": "..."}`.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Free => serde_json::json!({ "claimed": false }),
            Self::Held { by } => serde_json::json!({ "claimed": true, "by": by }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claim_liveness() {
        let mut claim = FileClaim::new("src/x.py", "p", "s1", 60);
        assert!(claim.is_live(Utc::now()));

        claim.claimed_at = Utc::now() - Duration::seconds(61);
        assert!(!claim.is_live(Utc::now()));
    }

    #[test]
    fn test_status_held() {
        assert!(!ClaimStatus::Free.is_held());
        assert!(ClaimStatus::Held { by: "s2".into() }.is_held());
    }
}
