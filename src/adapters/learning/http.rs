//! Best-effort HTTP adapter for the learning service.
//!
//! Failures of any kind (network, status, timeout) degrade to `None` with a
//! stderr warning. Nothing here may block a hook beyond the request timeout.

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

use crate::domain::ports::{Confidence, LearningKind, LearningSink, ScanIngest};

/// HTTP client for the learning service.
pub struct HttpLearningClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpLearningClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    async fn post(&self, path: &str, body: &Value) -> Option<String> {
        let url = format!("{}/{}", self.base_url.trim_end_matches('/'), path);
        let response = match self.client.post(&url).json(body).send().await {
            Ok(response) => response,
            Err(err) => {
                warn!(%url, error = %err, "learning sink unreachable; dropping record");
                return None;
            }
        };

        if !response.status().is_success() {
            warn!(%url, status = %response.status(), "learning sink rejected record");
            return None;
        }

        let body: Value = response.json().await.ok()?;
        let id = body.get("id").and_then(Value::as_str).map(str::to_string);
        debug!(%url, ?id, "learning record stored");
        id
    }
}

#[async_trait]
impl LearningSink for HttpLearningClient {
    async fn store(
        &self,
        session_id: &str,
        kind: LearningKind,
        content: &str,
        context: &str,
        confidence: Confidence,
    ) -> Option<String> {
        self.post(
            "learnings",
            &serde_json::json!({
                "session_id": session_id,
                "kind": kind.as_str(),
                "content": content,
                "context": context,
                "confidence": confidence.as_str(),
            }),
        )
        .await
    }
}

#[async_trait]
impl ScanIngest for HttpLearningClient {
    async fn ingest(
        &self,
        session_id: &str,
        project: &str,
        scan_type: &str,
        content: &str,
        metadata: &Value,
    ) -> Option<String> {
        self.post(
            "scans",
            &serde_json::json!({
                "session_id": session_id,
                "project": project,
                "scan_type": scan_type,
                "content": content,
                "metadata": metadata,
            }),
        )
        .await
    }
}

/// Sink used when no endpoint is configured.
pub struct NullLearningSink;

#[async_trait]
impl LearningSink for NullLearningSink {
    async fn store(
        &self,
        _session_id: &str,
        _kind: LearningKind,
        _content: &str,
        _context: &str,
        _confidence: Confidence,
    ) -> Option<String> {
        None
    }
}

#[async_trait]
impl ScanIngest for NullLearningSink {
    async fn ingest(
        &self,
        _session_id: &str,
        _project: &str,
        _scan_type: &str,
        _content: &str,
        _metadata: &Value,
    ) -> Option<String> {
        None
    }
}
