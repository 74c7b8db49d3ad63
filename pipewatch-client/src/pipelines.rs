//! Pipeline command and status endpoints

use crate::PipelineClient;
use crate::error::{ClientError, Result};
use pipewatch_core::dto::{CommandResponse, PipelineSnapshot};

impl PipelineClient {
    // =============================================================================
    // Pipeline Commands
    // =============================================================================

    /// Start a pipeline run
    ///
    /// The backend rejects the request with `success: false` when the
    /// pipeline is already running.
    pub async fn start_pipeline(&self, pipeline_id: &str) -> Result<CommandResponse> {
        self.post_command(pipeline_id, "start").await
    }

    /// Request cancellation of the active run
    pub async fn cancel_pipeline(&self, pipeline_id: &str) -> Result<CommandResponse> {
        self.post_command(pipeline_id, "cancel").await
    }

    /// Force every step back to pending and clear error state server-side
    pub async fn reset_pipeline(&self, pipeline_id: &str) -> Result<CommandResponse> {
        self.post_command(pipeline_id, "reset").await
    }

    async fn post_command(&self, pipeline_id: &str, action: &str) -> Result<CommandResponse> {
        validate_pipeline_id(pipeline_id)?;

        let url = format!("{}/api/pipelines/{}/{}", self.base_url, pipeline_id, action);
        let response = self.client.post(&url).send().await?;

        self.handle_response(response).await
    }

    // =============================================================================
    // Status Snapshot
    // =============================================================================

    /// Fetch the authoritative status of every pipeline
    pub async fn list_statuses(&self) -> Result<Vec<PipelineSnapshot>> {
        let url = format!("{}/api/pipelines/status", self.base_url);
        let response = self.client.get(&url).send().await?;

        self.handle_response(response).await
    }
}

/// Pipeline ids are interpolated into URL paths
fn validate_pipeline_id(pipeline_id: &str) -> Result<()> {
    if pipeline_id.is_empty() {
        return Err(ClientError::InvalidPipelineId(
            "id cannot be empty".to_string(),
        ));
    }

    if pipeline_id
        .chars()
        .any(|c| c == '/' || c == '?' || c == '#' || c.is_whitespace())
    {
        return Err(ClientError::InvalidPipelineId(format!(
            "'{}' contains characters not allowed in a URL path",
            pipeline_id
        )));
    }

    Ok(())
}
