//! Pipewatch Core
//!
//! Core types and the run-status state machine for Pipewatch.
//!
//! This crate contains:
//! - Domain types: pipeline runs, step states and the static step catalog
//! - DTOs: wire types exchanged with the pipeline backend
//! - Model: the pure run-status transition function
//! - State: the persisted record schema and the key/value store contract

pub mod domain;
pub mod dto;
pub mod error;
pub mod model;
pub mod policy;
pub mod state;
pub mod store;

pub use error::ModelError;
pub use model::{IgnoreReason, ModelEvent, PipelineStatusModel, Progress, Transition};
pub use policy::RecoveryPolicy;
