//! Pipeline stage artifacts.
//!
//! Each pipeline stage may emit an artifact (a path or literal content) that
//! later stages consume as upstream context.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A typed output of one pipeline stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineArtifact {
    /// Pipeline run the artifact belongs to
    pub pipeline_id: String,
    /// Producing stage
    pub stage_index: i64,
    /// Free-form type label (`text`, `file`, `report`, ...)
    pub artifact_type: String,
    /// Path reference, when the artifact lives on disk
    pub artifact_path: Option<String>,
    /// Literal content, when the artifact is inlined
    pub artifact_content: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl PipelineArtifact {
    /// Extract an artifact from a stage's structured output, if one was
    /// declared. Recognizes `artifact_path` and `artifact_content`, with an
    /// optional `artifact_type` label.
    pub fn from_structured_output(
        pipeline_id: &str,
        stage_index: i64,
        output: &Value,
    ) -> Option<Self> {
        let path = output
            .get("artifact_path")
            .and_then(Value::as_str)
            .map(str::to_string);
        let content = output
            .get("artifact_content")
            .and_then(Value::as_str)
            .map(str::to_string);

        if path.is_none() && content.is_none() {
            return None;
        }

        let artifact_type = output
            .get("artifact_type")
            .and_then(Value::as_str)
            .unwrap_or(if path.is_some() { "file" } else { "text" })
            .to_string();

        Some(Self {
            pipeline_id: pipeline_id.to_string(),
            stage_index,
            artifact_type,
            artifact_path: path,
            artifact_content: content,
            created_at: Utc::now(),
        })
    }

    /// One-line rendering for injected context.
    pub fn summary(&self) -> String {
        match (&self.artifact_path, &self.artifact_content) {
            (Some(path), _) => format!(
                "stage {} [{}]: {}",
                self.stage_index, self.artifact_type, path
            ),
            (None, Some(content)) => {
                let mut snippet: String = content.chars().take(200).collect();
                if content.chars().count() > 200 {
                    snippet.push('…');
                }
                format!("stage {} [{}]: {}", self.stage_index, self.artifact_type, snippet)
            }
            (None, None) => format!("stage {} [{}]: (empty)", self.stage_index, self.artifact_type),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_path_artifact() {
        let out = json!({ "artifact_path": "build/report.md", "artifact_type": "report" });
        let artifact = PipelineArtifact::from_structured_output("p1", 0, &out).unwrap();
        assert_eq!(artifact.artifact_path.as_deref(), Some("build/report.md"));
        assert_eq!(artifact.artifact_type, "report");
    }

    #[test]
    fn test_extract_content_artifact_defaults_type() {
        let out = json!({ "artifact_content": "fn main() {}" });
        let artifact = PipelineArtifact::from_structured_output("p1", 1, &out).unwrap();
        assert_eq!(artifact.artifact_type, "text");
        assert_eq!(artifact.artifact_content.as_deref(), Some("fn main() {}"));
    }

    #[test]
    fn test_extract_absent() {
        assert!(PipelineArtifact::from_structured_output("p1", 0, &json!({})).is_none());
        assert!(PipelineArtifact::from_structured_output("p1", 0, &json!(null)).is_none());
    }

    #[test]
    fn test_summary_truncates_content() {
        let long = "x".repeat(500);
        let out = json!({ "artifact_content": long });
        let artifact = PipelineArtifact::from_structured_output("p1", 2, &out).unwrap();
        assert!(artifact.summary().len() < 300);
    }
}
