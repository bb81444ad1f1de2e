//! Clipchain Pipeline
//!
//! The orchestrator that turns a [`clipchain_job_model::PipelineJob`] into a
//! final video: per-clip transcoding, concatenation, and text overlay burn-in,
//! run as an explicit state machine with a stage-tagged failure.

pub mod orchestrator;
pub mod state;

pub use orchestrator::*;
pub use state::*;
