//! Session domain model.
//!
//! A session is a top-level user interaction lifetime: parent of agents and
//! owner of file claims. Rows are created lazily by the first hook event that
//! carries a new id and kept alive by heartbeats.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Heartbeat window after which a session is considered stale.
pub const ACTIVE_WINDOW_SECS: i64 = 300;

/// A live or stale coordination session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Opaque identifier
    pub id: String,
    /// Project the session operates on
    pub project: String,
    /// Free-form description of the current work
    pub working_on: Option<String>,
    /// When the session was first observed
    pub started_at: DateTime<Utc>,
    /// Last heartbeat time
    pub last_heartbeat: DateTime<Utc>,
    /// Optional phase label for team awareness
    pub current_phase: Option<String>,
    /// Files the session reports touching
    pub active_files: Vec<String>,
    /// Sessions or resources this one is blocked by
    pub blocked_by: Vec<String>,
    /// Declared next action
    pub next_action: Option<String>,
}

impl Session {
    /// Create a session observed now.
    pub fn new(id: impl Into<String>, project: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            project: project.into(),
            working_on: None,
            started_at: now,
            last_heartbeat: now,
            current_phase: None,
            active_files: Vec::new(),
            blocked_by: Vec::new(),
            next_action: None,
        }
    }

    /// Active iff the last heartbeat is within the 5 minute window.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        now - self.last_heartbeat <= Duration::seconds(ACTIVE_WINDOW_SECS)
    }

    /// Record a heartbeat.
    pub fn touch(&mut self) {
        self.last_heartbeat = Utc::now();
    }
}
