//! Backend seams
//!
//! The monitor talks to the backend through these traits so the state
//! machine can be driven by scripted backends in tests.

use async_trait::async_trait;
use pipewatch_core::dto::{CommandResponse, PipelineSnapshot};

use crate::PipelineClient;
use crate::error::Result;
use crate::events::EventStream;

/// Command and snapshot operations of the pipeline backend
#[async_trait]
pub trait PipelineBackend: Send + Sync {
    /// Begins execution of a pipeline
    async fn start(&self, pipeline_id: &str) -> Result<CommandResponse>;

    /// Requests cancellation of the active run
    async fn cancel(&self, pipeline_id: &str) -> Result<CommandResponse>;

    /// Forces all steps to pending server-side
    async fn reset(&self, pipeline_id: &str) -> Result<CommandResponse>;

    /// Authoritative status of every pipeline
    async fn snapshot(&self) -> Result<Vec<PipelineSnapshot>>;
}

/// Source of realtime pipeline events
#[async_trait]
pub trait EventSource: Send + Sync {
    /// Opens a new event stream. Each call is a fresh connection.
    async fn subscribe(&self) -> Result<EventStream>;
}

#[async_trait]
impl PipelineBackend for PipelineClient {
    async fn start(&self, pipeline_id: &str) -> Result<CommandResponse> {
        self.start_pipeline(pipeline_id).await
    }

    async fn cancel(&self, pipeline_id: &str) -> Result<CommandResponse> {
        self.cancel_pipeline(pipeline_id).await
    }

    async fn reset(&self, pipeline_id: &str) -> Result<CommandResponse> {
        self.reset_pipeline(pipeline_id).await
    }

    async fn snapshot(&self) -> Result<Vec<PipelineSnapshot>> {
        self.list_statuses().await
    }
}

#[async_trait]
impl EventSource for PipelineClient {
    async fn subscribe(&self) -> Result<EventStream> {
        self.subscribe_events().await
    }
}
