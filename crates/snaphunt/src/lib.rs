//! SnapHunt domain crate: configuration, telemetry, and the photo
//! submission & validation workflow.

pub mod config;
pub mod error;
pub mod telemetry;
pub mod workflows;
