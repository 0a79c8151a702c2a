//! Application layer - product classification and harvest orchestration
//!
//! Coordinates infrastructure engines and domain values for a harvest run.

pub mod classifier;
pub mod context;
pub mod orchestrator;
pub mod sink;

// Re-export commonly used items
pub use classifier::ProductClassifier;
pub use context::RunContext;
pub use orchestrator::{HarvestOrchestrator, HarvestReport, SiteJob, SiteReport};
pub use sink::{JsonLinesSink, MemorySink, ProductSink};
