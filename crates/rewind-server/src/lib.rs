// Library exports for the binary, integration tests and benchmarks

// ===== Replay engine =====
pub mod capture;
pub mod replay;

// ===== Serving surfaces =====
pub mod admin_api;
pub mod listener;

// ===== Collaborators =====
pub mod ca;
pub mod config;
pub mod metrics;

pub use capture::{CaptureError, CaptureIndex};
pub use replay::ReplayState;
