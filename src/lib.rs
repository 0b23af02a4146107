//! Speaking Coach Core Library
//!
//! Assessment orchestration for spoken-English practice: pronunciation and
//! content assessment of each answer, merged into one result and summarised
//! per practice session.

pub mod assessment;
pub mod config;
pub mod orchestrator;
pub mod providers;
pub mod session;
pub mod telemetry;
