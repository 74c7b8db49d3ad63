//! Realtime event DTOs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::step::StepState;

/// Event pushed by the backend on the realtime stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RealtimeEvent {
    /// A step changed state
    StatusUpdate(StatusUpdate),
    /// Another client reset the pipeline
    PipelineReset(PipelineReset),
}

impl RealtimeEvent {
    /// Pipeline the event belongs to
    pub fn pipeline_id(&self) -> &str {
        match self {
            RealtimeEvent::StatusUpdate(update) => &update.pipeline_id,
            RealtimeEvent::PipelineReset(reset) => &reset.pipeline_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdate {
    pub pipeline_id: String,
    pub step_id: String,
    pub status: StepState,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineReset {
    pub pipeline_id: String,
    #[serde(default)]
    pub message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_status_update() {
        let event: RealtimeEvent = serde_json::from_str(
            r#"{"type":"status_update","pipelineId":"p1","stepId":"load","status":"completed","timestamp":"2026-03-01T10:00:00Z"}"#,
        )
        .unwrap();

        match event {
            RealtimeEvent::StatusUpdate(update) => {
                assert_eq!(update.pipeline_id, "p1");
                assert_eq!(update.step_id, "load");
                assert_eq!(update.status, StepState::Complete);
                assert!(update.error_message.is_none());
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_decode_pipeline_reset() {
        let event: RealtimeEvent = serde_json::from_str(
            r#"{"type":"pipeline_reset","pipelineId":"p1","message":"reset by admin"}"#,
        )
        .unwrap();

        assert_eq!(event.pipeline_id(), "p1");
        assert!(matches!(
            event,
            RealtimeEvent::PipelineReset(PipelineReset { message: Some(ref m), .. }) if m == "reset by admin"
        ));
    }

    #[test]
    fn test_rejects_unknown_event_type() {
        let result = serde_json::from_str::<RealtimeEvent>(r#"{"type":"heartbeat"}"#);
        assert!(result.is_err());
    }
}
