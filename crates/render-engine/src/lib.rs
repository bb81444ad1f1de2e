//! Clipchain Render Engine
//!
//! Everything between the orchestrator and the external media engine:
//! overlay timelines, ffmpeg argument lists, subprocess execution with
//! progress/diagnostic side-channels, and the transient concat list.
//!
//! # Stage Commands
//!
//! ```text
//! clip_1.mp4 ── transcode ──► work/1.mp4 ──┐
//! clip_2.mp4 ── transcode ──► work/2.mp4 ──┼── filelist.txt ── concat ──► work/concat.mp4
//! clip_N.mp4 ── transcode ──► work/N.mp4 ──┘                                    │
//!                                                                   drawtext overlay
//!                                                                               │
//!                                                                               ▼
//!                                                                      output/final.mp4
//! ```

pub mod command;
pub mod concat_list;
pub mod engine;
pub mod executor;
pub mod overlay;
pub mod progress;

pub use command::*;
pub use concat_list::*;
pub use engine::*;
pub use executor::*;
pub use overlay::*;
