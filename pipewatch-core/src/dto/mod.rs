//! Data Transfer Objects for backend communication
//!
//! Wire types for the pipeline backend: command responses, the
//! authoritative status snapshot and realtime events. Field names follow the
//! backend's camelCase JSON.

pub mod command;
pub mod event;
pub mod snapshot;

pub use command::CommandResponse;
pub use event::{PipelineReset, RealtimeEvent, StatusUpdate};
pub use snapshot::{PipelineSnapshot, SnapshotStep};
