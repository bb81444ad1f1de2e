//! Clipchain Job Model
//!
//! Defines the data contracts a pipeline job is built from:
//! - **Cues:** Text overlays bound to a time window of a clip
//! - **Clips:** Source media plus the overlay it carries
//! - **Jobs:** The ordered clip list, directories, final artifact and overlay strategy
//! - **Artifacts:** Deterministically named stage outputs
//!
//! All times are seconds relative to the timeline the cue belongs to.

pub mod artifact;
pub mod clip;
pub mod cue;
pub mod discovery;
pub mod job;

pub use artifact::*;
pub use clip::*;
pub use cue::*;
pub use discovery::*;
pub use job::*;
