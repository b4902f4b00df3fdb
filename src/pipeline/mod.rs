// src/pipeline/mod.rs

pub mod metrics;
pub mod orchestrator;
pub mod progress;

pub use orchestrator::SessionOrchestrator;
pub use progress::LogProgress;
