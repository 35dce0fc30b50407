//! External learning service contracts.
//!
//! Both sinks are best-effort: a failure degrades to `None` and is never
//! allowed to block or fail a hook.

use async_trait::async_trait;

/// What kind of learning is being recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LearningKind {
    WorkingSolution,
    FailedApproach,
    ArchitecturalDecision,
    CodebasePattern,
    ErrorFix,
}

impl LearningKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WorkingSolution => "WORKING_SOLUTION",
            Self::FailedApproach => "FAILED_APPROACH",
            Self::ArchitecturalDecision => "ARCHITECTURAL_DECISION",
            Self::CodebasePattern => "CODEBASE_PATTERN",
            Self::ErrorFix => "ERROR_FIX",
        }
    }
}

/// Caller confidence in the recorded learning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl Confidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

/// Sink for learnings persisted across sessions by an external service.
#[async_trait]
pub trait LearningSink: Send + Sync {
    /// Store a learning. Returns the stored id, or `None` on any failure.
    async fn store(
        &self,
        session_id: &str,
        kind: LearningKind,
        content: &str,
        context: &str,
        confidence: Confidence,
    ) -> Option<String>;
}

/// Ingest endpoint for codebase scan results.
#[async_trait]
pub trait ScanIngest: Send + Sync {
    /// Ingest a scan. Returns the stored id, or `None` on any failure.
    async fn ingest(
        &self,
        session_id: &str,
        project: &str,
        scan_type: &str,
        content: &str,
        metadata: &serde_json::Value,
    ) -> Option<String>;
}
