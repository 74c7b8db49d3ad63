//! Core domain types
//!
//! Runs, steps and the catalog of steps a pipeline declares. These types are
//! shared between the monitor (which mutates them) and the CLI (which renders
//! them).

pub mod catalog;
pub mod run;
pub mod step;

pub use catalog::{StepCatalog, StepDefinition};
pub use run::{PipelineRun, RunStatus};
pub use step::{StepState, StepStatus};
