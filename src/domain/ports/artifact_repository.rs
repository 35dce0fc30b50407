//! Pipeline artifact port.

use anyhow::Result;
use async_trait::async_trait;

use crate::domain::models::PipelineArtifact;

/// Persistence contract for stage artifacts.
#[async_trait]
pub trait ArtifactRepository: Send + Sync {
    /// Persist one stage output.
    async fn append(&self, artifact: &PipelineArtifact) -> Result<()>;

    /// Artifacts from stages strictly before `stage_index`, ordered by
    /// `(stage_index asc, created_at desc)` for context injection.
    async fn list_upstream(
        &self,
        pipeline_id: &str,
        stage_index: i64,
    ) -> Result<Vec<PipelineArtifact>>;

    /// Stage indices below `stage_index` that produced at least one artifact.
    async fn stages_with_output(&self, pipeline_id: &str, stage_index: i64) -> Result<Vec<i64>>;
}
