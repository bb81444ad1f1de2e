//! Clipchain Common Utilities
//!
//! Shared infrastructure for all clipchain crates:
//! - Error taxonomy and result alias
//! - Tracing/logging initialization
//! - Configuration loading (directories, encoding profile, overlay style)

pub mod config;
pub mod error;
pub mod logging;

pub use config::*;
pub use error::*;
