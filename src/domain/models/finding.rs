//! Cross-session research notes and supervisor bookkeeping rows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A research note persisted for later sessions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub id: String,
    pub session_id: String,
    /// Short topic key for recall
    pub topic: String,
    /// The note itself
    pub finding: String,
    /// Components or files the note is relevant to
    pub relevant_to: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl Finding {
    pub fn new(
        session_id: impl Into<String>,
        topic: impl Into<String>,
        finding: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            session_id: session_id.into(),
            topic: topic.into(),
            finding: finding.into(),
            relevant_to: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn with_relevant_to(mut self, targets: Vec<String>) -> Self {
        self.relevant_to = targets;
        self
    }
}

/// A named restore point, expiring by TTL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub id: String,
    pub session_id: String,
    pub label: String,
    pub state: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl Checkpoint {
    /// Create a checkpoint that expires after `ttl`.
    pub fn new(
        session_id: impl Into<String>,
        label: impl Into<String>,
        state: serde_json::Value,
        ttl: chrono::Duration,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            session_id: session_id.into(),
            label: label.into(),
            state,
            created_at: now,
            expires_at: Some(now + ttl),
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|t| t < now)
    }
}

/// A feature another session has declared it is working in. One row per
/// `(project, feature)`; re-declaration moves it to the declaring session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureWorkspace {
    pub id: String,
    pub project: String,
    pub feature: String,
    pub session_id: String,
    pub branch: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FeatureWorkspace {
    /// Declare a feature as actively worked on by `session_id`.
    pub fn declare(
        project: impl Into<String>,
        feature: impl Into<String>,
        session_id: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            project: project.into(),
            feature: feature.into(),
            session_id: session_id.into(),
            branch: None,
            status: "active".to_string(),
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_finding_builder() {
        let finding = Finding::new("s1", "auth", "token refresh races the retry loop")
            .with_relevant_to(vec!["src/auth.rs".into()]);
        assert_eq!(finding.topic, "auth");
        assert_eq!(finding.relevant_to.len(), 1);
    }

    #[test]
    fn test_checkpoint_ttl() {
        let checkpoint = Checkpoint::new(
            "s1",
            "pre-compact",
            serde_json::json!({ "trigger": "auto" }),
            Duration::days(7),
        );
        assert!(!checkpoint.is_expired(Utc::now()));
        assert!(checkpoint.is_expired(Utc::now() + Duration::days(8)));
    }

    #[test]
    fn test_workspace_declaration() {
        let workspace = FeatureWorkspace::declare("proj", "auth-refactor", "s1");
        assert_eq!(workspace.status, "active");
        assert_eq!(workspace.feature, "auth-refactor");
        assert!(workspace.branch.is_none());
    }

    #[test]
    fn test_checkpoint_expiry() {
        let checkpoint = Checkpoint {
            id: "c1".into(),
            session_id: "s1".into(),
            label: "before-refactor".into(),
            state: serde_json::json!({}),
            created_at: Utc::now(),
            expires_at: Some(Utc::now() - Duration::minutes(1)),
        };
        assert!(checkpoint.is_expired(Utc::now()));
    }
}
